//! Pointer-capture behaviors.
//!
//! At most one of these runs at a time: the angry cursor chase, the cursor
//! march toward the foreground window's close button, the cursor drag lock,
//! the tight orbit around the cursor, and the cursor-pong minigame. They
//! share one tagged state so mutual exclusion holds by construction.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{Event, EventSender, PrankKind};
use crate::host::Host;
use crate::world::{Boundary, WorldState};
use rand::Rng;

/// Angry chase duration, seconds.
const ANGRY_CHASE_S: f64 = 6.0;

/// Chase acceleration toward the cursor and the speed bonus while angry.
const CHASE_FORCE: f64 = 0.9;
const ANGRY_SPEED_BONUS: f64 = 3.6;

/// Velocity kick applied when the chase starts.
const ANGRY_KICK_X_MIN: f64 = 2.6;
const ANGRY_KICK_X_MAX: f64 = 4.4;
const ANGRY_KICK_Y: f64 = 2.8;

/// Cursor nudge applied on a catch, pixels.
const CATCH_NUDGE: i32 = 30;

/// Cooldown after a catch before the next chase, seconds.
pub const CATCH_COOLDOWN_S: f64 = 0.6;

/// Cooldown applied after a drag release, seconds.
pub const DRAG_COOLDOWN_S: f64 = 2.5;

/// Window-kill march deadline, seconds.
const KILL_DEADLINE_S: f64 = 3.5;

/// Window-kill per-tick cursor step and arrival threshold.
const KILL_STEP_CAP: f64 = 45.0;
const KILL_STEP_FACTOR: f64 = 0.55;
const KILL_ARRIVAL: f64 = 15.0;

/// Close-button offset from the window's top-right corner.
const KILL_OFFSET_X: i32 = 25;
const KILL_OFFSET_Y: i32 = 15;

/// Angry face duration after a successful close click, seconds.
const KILL_ANGRY_S: f64 = 1.5;

/// Mouse-lock duration range, seconds.
const LOCK_MIN_S: f64 = 0.9;
const LOCK_MAX_S: f64 = 1.7;

/// Mouse-lock cursor step and jitter.
const LOCK_STEP_CAP: f64 = 26.0;
const LOCK_STEP_FACTOR: f64 = 0.45;
const LOCK_JITTER: i32 = 10;
const LOCK_JITTER_CHANCE: f64 = 0.30;

/// Close-attack duration, orbit speed and radius.
const ORBIT_S: f64 = 1.35;
const ORBIT_PHASE_STEP: f64 = 0.55;
const ORBIT_BASE_RADIUS: f64 = 90.0;
const ORBIT_RADIUS_SPREAD: f64 = 32.0;
const ORBIT_JITTER: f64 = 18.0;

/// Cursor-pong session length, seconds.
const PONG_SESSION_S: f64 = 20.0;

/// Paddle geometry and speed. The agent is the left paddle, the clone the
/// right one; both are block-sized.
const PADDLE_MARGIN: f64 = 10.0;
const PADDLE_MAX_STEP: f64 = 14.0;

/// Serve speed and angle spread.
const PONG_SPEED_MIN: f64 = 10.0;
const PONG_SPEED_MAX: f64 = 15.0;
const PONG_ANGLE_SPREAD: f64 = 0.6;

/// Restitution applied on each paddle hit.
const PONG_RESTITUTION: f64 = 1.05;

/// Vertical english per unit of off-center hit position.
const PONG_ENGLISH: f64 = 3.0;

/// Ball reset margin past the paddles, pixels.
const PONG_OUT_MARGIN: f64 = 50.0;

/// State of the cursor-pong minigame.
///
/// The agent plays the left paddle and the clone the right one; the ball
/// is its own little entity reported through [`Event::BallMoved`].
#[derive(Debug, Clone)]
pub struct PingPong {
    /// Session end, engine time.
    pub until: f64,
    ball_x: f64,
    ball_y: f64,
    ball_vx: f64,
    ball_vy: f64,
    right_y: f64,
}

/// The one-at-a-time pointer behavior slot.
#[derive(Debug, Clone)]
pub enum ActiveBehavior {
    /// No pointer behavior running.
    Idle,
    /// Chase the cursor until it is caught or the timer runs out.
    AngryCatch {
        /// Chase end, engine time.
        until: f64,
    },
    /// Walk the cursor to the foreground window's close button and click.
    WindowKill {
        /// Close-button position aimed at.
        target: (f64, f64),
        /// Give-up time.
        deadline: f64,
    },
    /// Drag the cursor toward the agent.
    MouseLock {
        /// Lock end, engine time.
        until: f64,
    },
    /// Orbit tightly around the cursor.
    CloseAttack {
        /// Orbit end, engine time.
        until: f64,
        /// Current orbit angle.
        phase: f64,
    },
    /// The agent plays ball between two invisible paddles.
    PingPong(PingPong),
}

impl ActiveBehavior {
    /// Whether any pointer behavior is running.
    pub fn is_active(&self) -> bool {
        !matches!(self, ActiveBehavior::Idle)
    }

    /// The prank kind of the running behavior, if any.
    pub fn kind(&self) -> Option<PrankKind> {
        match self {
            ActiveBehavior::Idle => None,
            ActiveBehavior::AngryCatch { .. } => Some(PrankKind::AngryCatch),
            ActiveBehavior::WindowKill { .. } => Some(PrankKind::WindowKill),
            ActiveBehavior::MouseLock { .. } => Some(PrankKind::MouseLock),
            ActiveBehavior::CloseAttack { .. } => Some(PrankKind::CloseAttack),
            ActiveBehavior::PingPong(_) => Some(PrankKind::PingPong),
        }
    }

    fn require_idle(&self) -> Result<()> {
        if self.is_active() {
            return Err(Error::PrankRefused);
        }
        Ok(())
    }

    /// Start the angry cursor chase.
    pub fn start_angry_catch(
        &mut self,
        world: &mut WorldState,
        events: &EventSender,
        now: f64,
    ) -> Result<()> {
        self.require_idle()?;
        if now < world.angry_catch_cooldown_until {
            return Err(Error::PrankRefused);
        }
        let kx = world.rng.gen_range(ANGRY_KICK_X_MIN..=ANGRY_KICK_X_MAX);
        let kx = if world.rng.gen_bool(0.5) { kx } else { -kx };
        let ky = world.rng.gen_range(-ANGRY_KICK_Y..=ANGRY_KICK_Y);
        world.kick(kx, ky);
        *self = ActiveBehavior::AngryCatch {
            until: now + ANGRY_CHASE_S,
        };
        let _ = events.send(Event::prank_started(PrankKind::AngryCatch));
        Ok(())
    }

    /// Start the window-kill march against the current foreground window.
    pub fn start_window_kill(
        &mut self,
        host: &mut dyn Host,
        config: &Config,
        events: &EventSender,
        now: f64,
    ) -> Result<()> {
        self.require_idle()?;
        let info = host
            .foreground_window()?
            .ok_or_else(|| Error::capability("foreground window"))?;
        let target = (
            f64::from(info.rect.right() - KILL_OFFSET_X).clamp(0.0, f64::from(config.screen_w)),
            f64::from(info.rect.y + KILL_OFFSET_Y).clamp(0.0, f64::from(config.screen_h)),
        );
        *self = ActiveBehavior::WindowKill {
            target,
            deadline: now + KILL_DEADLINE_S,
        };
        let _ = events.send(Event::prank_started(PrankKind::WindowKill));
        Ok(())
    }

    /// Start dragging the cursor toward the agent.
    pub fn start_mouse_lock(
        &mut self,
        world: &mut WorldState,
        events: &EventSender,
        now: f64,
    ) -> Result<()> {
        self.require_idle()?;
        let duration = world.rng.gen_range(LOCK_MIN_S..=LOCK_MAX_S);
        *self = ActiveBehavior::MouseLock {
            until: now + duration,
        };
        let _ = events.send(Event::prank_started(PrankKind::MouseLock));
        Ok(())
    }

    /// Start the tight cursor orbit.
    pub fn start_close_attack(&mut self, events: &EventSender, now: f64) -> Result<()> {
        self.require_idle()?;
        *self = ActiveBehavior::CloseAttack {
            until: now + ORBIT_S,
            phase: 0.0,
        };
        let _ = events.send(Event::prank_started(PrankKind::CloseAttack));
        Ok(())
    }

    /// Start a cursor-pong session. The caller parks the clone on the
    /// right paddle.
    pub fn start_ping_pong(
        &mut self,
        world: &mut WorldState,
        config: &Config,
        events: &EventSender,
        now: f64,
    ) -> Result<()> {
        self.require_idle()?;
        let mid_y = f64::from(config.screen_h - config.block_size) / 2.0;
        world.x = PADDLE_MARGIN;
        world.y = mid_y;
        world.vx = 0.0;
        world.vy = 0.0;
        let mut pong = PingPong {
            until: now + PONG_SESSION_S,
            ball_x: 0.0,
            ball_y: 0.0,
            ball_vx: 0.0,
            ball_vy: 0.0,
            right_y: mid_y,
        };
        pong.serve(world, config);
        *self = ActiveBehavior::PingPong(pong);
        let _ = events.send(Event::prank_started(PrankKind::PingPong));
        Ok(())
    }

    /// Advance the running behavior by one motion tick.
    ///
    /// When the behavior ends, the slot returns to `Idle` and a
    /// `PrankEnded` event is sent.
    pub fn tick(
        &mut self,
        world: &mut WorldState,
        host: &mut dyn Host,
        config: &Config,
        events: &EventSender,
        now: f64,
    ) -> Result<()> {
        let done = match self {
            ActiveBehavior::Idle => false,

            ActiveBehavior::AngryCatch { until } => {
                let until = *until;
                match host.cursor_pos() {
                    Ok((cx, cy)) => {
                        let (ax, ay) = world.center(config);
                        let dx = f64::from(cx) - ax;
                        let dy = f64::from(cy) - ay;
                        let dist = (dx * dx + dy * dy).sqrt();
                        if dist <= config.angry_catch_radius {
                            let nx = cx + world.rng.gen_range(-CATCH_NUDGE..=CATCH_NUDGE);
                            let ny = cy + world.rng.gen_range(-CATCH_NUDGE..=CATCH_NUDGE);
                            let _ = host.set_cursor_pos(nx, ny);
                            world.angry_catch_cooldown_until = now + CATCH_COOLDOWN_S;
                            if config.sounds_enabled {
                                let _ = events.send(Event::Alert);
                            }
                            true
                        } else {
                            world.steer_to(
                                f64::from(cx) - f64::from(config.block_size) / 2.0,
                                f64::from(cy) - f64::from(config.block_size) / 2.0,
                                CHASE_FORCE,
                            );
                            world.clamp_velocity(config.max_speed + ANGRY_SPEED_BONUS);
                            world.advance(config, Boundary::Reflect);
                            now >= until
                        }
                    }
                    // Cursor gone means nothing to chase.
                    Err(_) => true,
                }
            }

            ActiveBehavior::WindowKill { target, deadline } => {
                let (tx, ty) = *target;
                let deadline = *deadline;
                match host.cursor_pos() {
                    Ok((cx, cy)) => {
                        let dx = tx - f64::from(cx);
                        let dy = ty - f64::from(cy);
                        let dist = (dx * dx + dy * dy).sqrt();
                        if dist < KILL_ARRIVAL {
                            let _ = host.synthesize_click(tx.round() as i32, ty.round() as i32);
                            world.angry_until = now + KILL_ANGRY_S;
                            true
                        } else if now >= deadline {
                            world.confused_until = now + 1.0;
                            true
                        } else {
                            let step = (dist * KILL_STEP_FACTOR).min(KILL_STEP_CAP);
                            let nx = f64::from(cx) + dx / dist * step;
                            let ny = f64::from(cy) + dy / dist * step;
                            let _ = host.set_cursor_pos(nx.round() as i32, ny.round() as i32);
                            false
                        }
                    }
                    // No cursor, no march.
                    Err(_) => true,
                }
            }

            ActiveBehavior::MouseLock { until } => {
                let until = *until;
                match host.cursor_pos() {
                    Ok((cx, cy)) => {
                        let (ax, ay) = world.center(config);
                        let dx = ax - f64::from(cx);
                        let dy = ay - f64::from(cy);
                        let dist = (dx * dx + dy * dy).sqrt().max(1.0);
                        let step = (dist * LOCK_STEP_FACTOR).min(LOCK_STEP_CAP);
                        let mut nx = f64::from(cx) + dx / dist * step;
                        let mut ny = f64::from(cy) + dy / dist * step;
                        if world.rng.gen_bool(LOCK_JITTER_CHANCE) {
                            nx += f64::from(world.rng.gen_range(-LOCK_JITTER..=LOCK_JITTER));
                            ny += f64::from(world.rng.gen_range(-LOCK_JITTER..=LOCK_JITTER));
                        }
                        let _ = host.set_cursor_pos(nx.round() as i32, ny.round() as i32);
                        now >= until
                    }
                    Err(_) => true,
                }
            }

            ActiveBehavior::CloseAttack { until, phase } => {
                let until = *until;
                match host.cursor_pos() {
                    Ok((cx, cy)) => {
                        *phase += ORBIT_PHASE_STEP;
                        let radius = ORBIT_BASE_RADIUS
                            + ORBIT_RADIUS_SPREAD * (0.5 + world.rng.gen_range(0.0..1.0));
                        let half = f64::from(config.block_size) / 2.0;
                        let jx = world.rng.gen_range(-ORBIT_JITTER..=ORBIT_JITTER);
                        let jy = world.rng.gen_range(-ORBIT_JITTER..=ORBIT_JITTER);
                        world.x = f64::from(cx) + phase.cos() * radius - half + jx;
                        world.y = f64::from(cy) + phase.sin() * radius - half + jy;
                        world.vx = 0.0;
                        world.vy = 0.0;
                        now >= until
                    }
                    Err(_) => true,
                }
            }

            ActiveBehavior::PingPong(pong) => {
                let finished = pong.tick(world, config, events, now);
                if finished {
                    // Send the agent tumbling out of the court.
                    let kx = world.rng.gen_range(-1.2..=1.2);
                    let ky = world.rng.gen_range(-1.2..=1.2);
                    world.kick(kx, ky);
                }
                finished
            }
        };

        if done {
            if let Some(kind) = self.kind() {
                let _ = events.send(Event::prank_ended(kind));
            }
            *self = ActiveBehavior::Idle;
        }
        Ok(())
    }

    /// Cancel the running behavior without its natural ending.
    pub fn cancel(&mut self, events: &EventSender) {
        if let Some(kind) = self.kind() {
            let _ = events.send(Event::prank_ended(kind));
        }
        *self = ActiveBehavior::Idle;
    }
}

impl PingPong {
    /// Put the ball at center court with a fresh random serve.
    fn serve(&mut self, world: &mut WorldState, config: &Config) {
        self.ball_x = f64::from(config.screen_w) / 2.0;
        self.ball_y = f64::from(config.screen_h) / 2.0;
        let speed = world.rng.gen_range(PONG_SPEED_MIN..=PONG_SPEED_MAX);
        let angle = world.rng.gen_range(-PONG_ANGLE_SPREAD..=PONG_ANGLE_SPREAD);
        let dir = if world.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        self.ball_vx = dir * speed * angle.cos();
        self.ball_vy = speed * angle.sin();
    }

    /// Top-left of the right (clone) paddle.
    pub fn right_paddle(&self, config: &Config) -> (f64, f64) {
        (
            f64::from(config.screen_w) - f64::from(config.block_size) - PADDLE_MARGIN,
            self.right_y,
        )
    }

    /// One pong step. Returns true when the session is over.
    fn tick(
        &mut self,
        world: &mut WorldState,
        config: &Config,
        events: &EventSender,
        now: f64,
    ) -> bool {
        let block = f64::from(config.block_size);
        let max_paddle_y = f64::from(config.screen_h) - block;

        // Both paddles track the ball with limited speed. The agent is the
        // left paddle.
        world.x = PADDLE_MARGIN;
        world.vx = 0.0;
        world.vy = 0.0;
        for paddle_y in [&mut world.y, &mut self.right_y] {
            let target = self.ball_y - block / 2.0;
            let delta = (target - *paddle_y).clamp(-PADDLE_MAX_STEP, PADDLE_MAX_STEP);
            *paddle_y = (*paddle_y + delta).clamp(0.0, max_paddle_y);
        }

        self.ball_x += self.ball_vx;
        self.ball_y += self.ball_vy;

        // Top and bottom walls.
        if self.ball_y <= 0.0 {
            self.ball_y = 0.0;
            self.ball_vy = self.ball_vy.abs();
        } else if self.ball_y >= f64::from(config.screen_h) {
            self.ball_y = f64::from(config.screen_h);
            self.ball_vy = -self.ball_vy.abs();
        }

        let left_face = PADDLE_MARGIN + block;
        let right_face = f64::from(config.screen_w) - block - PADDLE_MARGIN;

        if self.ball_vx < 0.0 && self.ball_x <= left_face {
            if Self::paddle_covers(world.y, block, self.ball_y) {
                self.ball_x = left_face;
                self.bounce(world.y, block, 1.0);
            }
        } else if self.ball_vx > 0.0 && self.ball_x >= right_face {
            if Self::paddle_covers(self.right_y, block, self.ball_y) {
                self.ball_x = right_face;
                self.bounce(self.right_y, block, -1.0);
            }
        }

        // A miss resets the rally.
        if self.ball_x < -PONG_OUT_MARGIN
            || self.ball_x > f64::from(config.screen_w) + PONG_OUT_MARGIN
        {
            self.serve(world, config);
        }

        let _ = events.send(Event::BallMoved {
            x: self.ball_x.round() as i32,
            y: self.ball_y.round() as i32,
        });

        now >= self.until
    }

    fn paddle_covers(paddle_y: f64, block: f64, ball_y: f64) -> bool {
        ball_y >= paddle_y && ball_y <= paddle_y + block
    }

    fn bounce(&mut self, paddle_y: f64, block: f64, dir: f64) {
        let hit_pos = (self.ball_y - (paddle_y + block / 2.0)) / (block / 2.0);
        self.ball_vx = dir * self.ball_vx.abs() * PONG_RESTITUTION;
        self.ball_vy += PONG_ENGLISH * hit_pos;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event;
    use crate::host::{NullHost, Rect, WindowInfo};

    struct CursorHost {
        cursor: (i32, i32),
        cursor_ok: bool,
        clicks: Vec<(i32, i32)>,
        window: Option<WindowInfo>,
    }

    impl CursorHost {
        fn new(cursor: (i32, i32)) -> Self {
            Self {
                cursor,
                cursor_ok: true,
                clicks: Vec::new(),
                window: None,
            }
        }
    }

    impl Host for CursorHost {
        fn idle_seconds(&mut self) -> Result<f64> {
            Ok(99.0)
        }
        fn cursor_pos(&mut self) -> Result<(i32, i32)> {
            if !self.cursor_ok {
                return Err(Error::capability("cursor"));
            }
            Ok(self.cursor)
        }
        fn set_cursor_pos(&mut self, x: i32, y: i32) -> Result<()> {
            self.cursor = (x, y);
            Ok(())
        }
        fn synthesize_click(&mut self, x: i32, y: i32) -> Result<()> {
            self.clicks.push((x, y));
            Ok(())
        }
        fn foreground_window(&mut self) -> Result<Option<WindowInfo>> {
            Ok(self.window.clone())
        }
        fn probe_image(&mut self, _path: &std::path::Path) -> Result<crate::host::PayloadSize> {
            Ok(crate::host::PayloadSize { w: 320, h: 240 })
        }
        fn create_payload(&mut self, _kind: &crate::host::PayloadKind) -> Result<crate::host::PayloadSize> {
            Ok(crate::host::PayloadSize { w: 320, h: 240 })
        }
        fn destroy_payload(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn setup() -> (Config, WorldState) {
        let config = Config::new().screen(800, 600).seed(11);
        let world = WorldState::new(&config);
        (config, world)
    }

    #[test]
    fn test_only_one_behavior_at_a_time() {
        let (config, mut world) = setup();
        let (tx, _rx) = event::channel();
        let mut slot = ActiveBehavior::Idle;
        slot.start_close_attack(&tx, 0.0).unwrap();
        assert!(slot.is_active());

        let err = slot.start_mouse_lock(&mut world, &tx, 0.0);
        assert!(matches!(err, Err(Error::PrankRefused)));
        let err = slot.start_ping_pong(&mut world, &config, &tx, 0.0);
        assert!(matches!(err, Err(Error::PrankRefused)));
    }

    #[test]
    fn test_angry_catch_respects_cooldown() {
        let (_config, mut world) = setup();
        let (tx, _rx) = event::channel();
        world.angry_catch_cooldown_until = 5.0;
        let mut slot = ActiveBehavior::Idle;
        assert!(matches!(
            slot.start_angry_catch(&mut world, &tx, 1.0),
            Err(Error::PrankRefused)
        ));
        slot.start_angry_catch(&mut world, &tx, 6.0).unwrap();
        assert!(slot.is_active());
    }

    #[test]
    fn test_angry_catch_kicks_off_with_speed() {
        let (_config, mut world) = setup();
        let (tx, _rx) = event::channel();
        let mut slot = ActiveBehavior::Idle;
        slot.start_angry_catch(&mut world, &tx, 0.0).unwrap();
        let speed = (world.vx * world.vx + world.vy * world.vy).sqrt();
        assert!(speed >= 2.6, "no launch kick, speed {speed}");
    }

    #[test]
    fn test_angry_catch_ends_on_catch() {
        let (config, mut world) = setup();
        let (tx, _rx) = event::channel();
        let (cx, cy) = world.center(&config);
        let mut host = CursorHost::new((cx as i32, cy as i32));
        let mut slot = ActiveBehavior::Idle;
        slot.start_angry_catch(&mut world, &tx, 0.0).unwrap();
        slot.tick(&mut world, &mut host, &config, &tx, 0.0).unwrap();
        assert!(!slot.is_active());
        assert!(world.angry_catch_cooldown_until > 0.0);
    }

    #[test]
    fn test_window_kill_walks_cursor_to_close_button() {
        let (config, mut world) = setup();
        let (tx, _rx) = event::channel();
        let mut host = CursorHost::new((0, 0));
        host.window = Some(WindowInfo {
            title: "Documents".into(),
            process: Some("explorer.exe".into()),
            rect: Rect::new(100, 100, 400, 300),
        });

        let mut slot = ActiveBehavior::Idle;
        slot.start_window_kill(&mut host, &config, &tx, 0.0).unwrap();

        let (agent_x, agent_y) = (world.x, world.y);
        let mut now = 0.0;
        for _ in 0..200 {
            if !slot.is_active() {
                break;
            }
            slot.tick(&mut world, &mut host, &config, &tx, now).unwrap();
            now += 0.016;
        }
        assert!(!slot.is_active());
        assert_eq!(host.clicks, vec![(475, 115)]);
        // The cursor marched to the close button; the agent never moved.
        let (cx, cy) = host.cursor;
        let dist = (f64::from(cx - 475).powi(2) + f64::from(cy - 115).powi(2)).sqrt();
        assert!(dist < 15.0, "cursor stopped {dist} px short");
        assert!((world.x - agent_x).abs() < f64::EPSILON);
        assert!((world.y - agent_y).abs() < f64::EPSILON);
        assert!(world.angry_until > 0.0);
    }

    #[test]
    fn test_window_kill_ends_when_cursor_goes_away() {
        let (config, mut world) = setup();
        let (tx, _rx) = event::channel();
        let mut host = CursorHost::new((0, 0));
        host.window = Some(WindowInfo {
            title: "Documents".into(),
            process: Some("explorer.exe".into()),
            rect: Rect::new(100, 100, 400, 300),
        });
        host.cursor_ok = false;

        let mut slot = ActiveBehavior::Idle;
        slot.start_window_kill(&mut host, &config, &tx, 0.0).unwrap();
        slot.tick(&mut world, &mut host, &config, &tx, 0.0).unwrap();
        assert!(!slot.is_active());
        assert!(host.clicks.is_empty());
    }

    #[test]
    fn test_window_kill_needs_foreground_window() {
        let (config, _world) = setup();
        let (tx, _rx) = event::channel();
        let mut host = CursorHost::new((0, 0));
        let mut slot = ActiveBehavior::Idle;
        assert!(slot.start_window_kill(&mut host, &config, &tx, 0.0).is_err());
        assert!(!slot.is_active());
    }

    #[test]
    fn test_mouse_lock_drags_cursor_toward_agent() {
        let (config, mut world) = setup();
        let (tx, _rx) = event::channel();
        let mut host = CursorHost::new((50, 50));
        let start = host.cursor;
        let (ax, ay) = world.center(&config);

        let mut slot = ActiveBehavior::Idle;
        slot.start_mouse_lock(&mut world, &tx, 0.0).unwrap();
        slot.tick(&mut world, &mut host, &config, &tx, 0.0).unwrap();

        let before = ((f64::from(start.0) - ax).powi(2) + (f64::from(start.1) - ay).powi(2)).sqrt();
        let after = ((f64::from(host.cursor.0) - ax).powi(2)
            + (f64::from(host.cursor.1) - ay).powi(2))
        .sqrt();
        assert!(after < before);
    }

    #[test]
    fn test_pointer_behavior_ends_without_cursor() {
        let (config, mut world) = setup();
        let (tx, _rx) = event::channel();
        let mut host = NullHost;
        let mut slot = ActiveBehavior::Idle;
        slot.start_mouse_lock(&mut world, &tx, 0.0).unwrap();
        slot.tick(&mut world, &mut host, &config, &tx, 0.0).unwrap();
        assert!(!slot.is_active());
    }

    #[test]
    fn test_pong_ball_reflects_off_top_edge() {
        let (config, mut world) = setup();
        let (tx, _rx) = event::channel();
        let mut pong = PingPong {
            until: 100.0,
            ball_x: 400.0,
            ball_y: 1.0,
            ball_vx: 5.0,
            ball_vy: -8.0,
            right_y: 200.0,
        };
        pong.tick(&mut world, &config, &tx, 0.0);
        assert!(pong.ball_vy > 0.0);
        assert!(pong.ball_y >= 0.0);
    }

    #[test]
    fn test_pong_session_ends_with_kick() {
        let (config, mut world) = setup();
        let (tx, mut rx) = event::channel();
        let mut host = NullHost;
        let mut slot = ActiveBehavior::Idle;
        slot.start_ping_pong(&mut world, &config, &tx, 0.0).unwrap();

        slot.tick(&mut world, &mut host, &config, &tx, 30.0).unwrap();
        assert!(!slot.is_active());

        let mut ended = false;
        while let Ok(ev) = rx.try_recv() {
            if matches!(
                ev,
                Event::PrankEnded {
                    kind: PrankKind::PingPong
                }
            ) {
                ended = true;
            }
        }
        assert!(ended);
    }

    #[test]
    fn test_pong_miss_resets_to_center() {
        let (config, mut world) = setup();
        let (tx, _rx) = event::channel();
        let mut pong = PingPong {
            until: 100.0,
            ball_x: -45.0,
            ball_y: 10.0,
            ball_vx: -12.0,
            ball_vy: 0.0,
            right_y: 500.0,
        };
        pong.tick(&mut world, &config, &tx, 0.0);
        assert!((pong.ball_x - 400.0).abs() < f64::EPSILON);
        assert!((pong.ball_y - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pong_paddle_bounce_speeds_ball_up() {
        let (config, mut world) = setup();
        let (tx, _rx) = event::channel();
        world.y = 60.0;
        let mut pong = PingPong {
            until: 100.0,
            ball_x: 110.0,
            ball_y: 100.0,
            ball_vx: -10.0,
            ball_vy: 0.0,
            right_y: 100.0,
        };
        pong.tick(&mut world, &config, &tx, 0.0);
        assert!(pong.ball_vx > 10.0, "no restitution: {}", pong.ball_vx);
    }

    #[test]
    fn test_pong_parks_agent_on_left_paddle() {
        let (config, mut world) = setup();
        let (tx, _rx) = event::channel();
        let mut slot = ActiveBehavior::Idle;
        slot.start_ping_pong(&mut world, &config, &tx, 0.0).unwrap();
        assert!((world.x - 10.0).abs() < f64::EPSILON);
        if let ActiveBehavior::PingPong(pong) = &slot {
            let (rx_x, _) = pong.right_paddle(&config);
            assert!((rx_x - (800.0 - 94.0 - 10.0)).abs() < f64::EPSILON);
        } else {
            panic!("not in pong");
        }
    }
}
