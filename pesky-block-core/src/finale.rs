//! The final sequence.
//!
//! When the user confirms closing the app, the agent does not simply exit.
//! Three clickable dots appear; waiting them out plays a farewell, while a
//! quick secret click pattern drops into a small horror chase game. Either
//! way the agent comes back afterwards, in scare mode.

use crate::config::Config;
use crate::error::Result;
use crate::event::{Event, EventSender, FinalStageEvent, PrankKind};
use crate::host::Host;
use crate::scheduler::{TaskHandle, TaskKind, TimerQueue};
use crate::world::WorldState;
use rand::Rng;

/// Distance between neighboring dot centers, pixels.
const DOT_GAP: f64 = 90.0;

/// Base dot radius and click hit radius, pixels.
const DOT_RADIUS: i32 = 25;
const DOT_HIT_RADIUS: f64 = 32.0;

/// Window for completing the secret click pattern, seconds.
const SECRET_WINDOW_S: f64 = 1.6;

/// Give-up timeout for the dots stage, seconds.
const DOTS_TIMEOUT_S: f64 = 10.0;

/// Dot pulse interval range, seconds.
const PULSE_MIN_S: f64 = 0.07;
const PULSE_MAX_S: f64 = 0.14;

/// Pulse radius swing around the base radius.
const PULSE_SWING: i32 = 7;

/// The farewell message and its typing cadence.
const FAREWELL: &str = "warum?";
const TYPE_DELAY_S: f64 = 0.6;
const TYPE_START_S: f64 = 2.0;

/// Delay from the finished farewell to the comeback, seconds.
const RESURRECT_AFTER_MESSAGE_S: f64 = 10.0;

/// Comeback delays after the mini-game, seconds.
const RESURRECT_AFTER_LOSS_S: f64 = 0.7;
const RESURRECT_AFTER_WIN_S: f64 = 1.2;

/// Mini-game tuning.
const GAME_GOAL: u32 = 3;
const GAME_TIMEOUT_S: f64 = 22.0;
const ENEMY_BASE_MIN: f64 = 3.8;
const ENEMY_BASE_MAX: f64 = 4.9;
const ENEMY_PER_SCORE: f64 = 0.85;
const ENEMY_RAMP_PER_S: f64 = 0.06;
const ENEMY_RAMP_CAP: f64 = 2.4;
const ENEMY_JITTER: f64 = 0.25;
const ENEMY_KILL_RADIUS: f64 = 28.0;
const PICKUP_RADIUS: f64 = 26.0;
const GAME_TICK_S: f64 = 0.03;

/// Stage of the final sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalStage {
    /// The two clickable dots are up.
    Dots,
    /// The farewell message is playing.
    Ending,
    /// The horror mini-game is running.
    Game,
    /// Waiting for the comeback timer.
    Done,
}

/// How the mini-game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    /// All collectibles gathered.
    Win,
    /// Caught by the enemy or out of time.
    Loss,
    /// Abandoned by the user.
    Aborted,
}

/// The horror chase mini-game. The player is the cursor.
#[derive(Debug)]
pub struct HorrorGame {
    started_at: f64,
    /// Items collected. Never decreases.
    pub score: u32,
    enemy: (f64, f64),
    collectible: (f64, f64),
    base_speed: f64,
    /// Set once; a second end request is ignored.
    pub ended: bool,
}

impl HorrorGame {
    fn new(world: &mut WorldState, config: &Config, now: f64) -> Self {
        let enemy = (10.0, 10.0);
        let collectible = Self::random_spot(world, config);
        Self {
            started_at: now,
            score: 0,
            enemy,
            collectible,
            base_speed: world.rng.gen_range(ENEMY_BASE_MIN..=ENEMY_BASE_MAX),
            ended: false,
        }
    }

    fn random_spot(world: &mut WorldState, config: &Config) -> (f64, f64) {
        let x = world.rng.gen_range(40.0..f64::from(config.screen_w) - 40.0);
        let y = world.rng.gen_range(40.0..f64::from(config.screen_h) - 40.0);
        (x, y)
    }

    /// One game step. Returns the outcome once the game is over.
    fn tick(
        &mut self,
        world: &mut WorldState,
        host: &mut dyn Host,
        config: &Config,
        events: &EventSender,
        now: f64,
    ) -> Option<GameOutcome> {
        let (px, py) = match host.cursor_pos() {
            Ok((x, y)) => (f64::from(x), f64::from(y)),
            // No cursor means no player.
            Err(_) => return Some(GameOutcome::Aborted),
        };

        let elapsed = now - self.started_at;
        if elapsed >= GAME_TIMEOUT_S {
            return Some(GameOutcome::Loss);
        }

        // Pickup check before the enemy moves.
        let dcx = px - self.collectible.0;
        let dcy = py - self.collectible.1;
        if (dcx * dcx + dcy * dcy).sqrt() <= PICKUP_RADIUS {
            self.score += 1;
            let _ = events.send(Event::HorrorHud {
                score: self.score,
                goal: GAME_GOAL,
            });
            if self.score >= GAME_GOAL {
                return Some(GameOutcome::Win);
            }
            self.collectible = Self::random_spot(world, config);
            let _ = events.send(Event::CollectibleMoved {
                x: self.collectible.0.round() as i32,
                y: self.collectible.1.round() as i32,
            });
        }

        let speed = self.base_speed
            + f64::from(self.score) * ENEMY_PER_SCORE
            + (elapsed * ENEMY_RAMP_PER_S).min(ENEMY_RAMP_CAP)
            + world.rng.gen_range(-ENEMY_JITTER..=ENEMY_JITTER);
        let dx = px - self.enemy.0;
        let dy = py - self.enemy.1;
        let dist = (dx * dx + dy * dy).sqrt().max(1.0);
        self.enemy.0 += dx / dist * speed;
        self.enemy.1 += dy / dist * speed;
        let _ = events.send(Event::EnemyMoved {
            x: self.enemy.0.round() as i32,
            y: self.enemy.1.round() as i32,
        });

        let ex = px - self.enemy.0;
        let ey = py - self.enemy.1;
        if (ex * ex + ey * ey).sqrt() <= ENEMY_KILL_RADIUS {
            return Some(GameOutcome::Loss);
        }

        None
    }
}

/// The full final sequence state machine.
#[derive(Debug)]
pub struct FinalSequence {
    /// Current stage.
    pub stage: FinalStage,
    left: (f64, f64),
    middle: (f64, f64),
    right: (f64, f64),
    secret_progress: u8,
    secret_started: f64,
    pulse_radius: i32,
    pulse_growing: bool,
    typed: usize,
    game: Option<HorrorGame>,
    handles: Vec<TaskHandle>,
}

impl FinalSequence {
    /// Start the sequence: show the dots and arm the timeout.
    pub fn begin(
        world: &mut WorldState,
        config: &Config,
        events: &EventSender,
        timers: &mut TimerQueue,
        now: f64,
    ) -> Self {
        let cx = f64::from(config.screen_w) / 2.0;
        let cy = f64::from(config.screen_h) / 2.0;
        let mut seq = Self {
            stage: FinalStage::Dots,
            left: (cx - DOT_GAP, cy),
            middle: (cx, cy),
            right: (cx + DOT_GAP, cy),
            secret_progress: 0,
            secret_started: 0.0,
            pulse_radius: DOT_RADIUS,
            pulse_growing: true,
            typed: 0,
            game: None,
            handles: Vec::new(),
        };
        let _ = events.send(Event::prank_started(PrankKind::FinalSequence));
        let _ = events.send(Event::FinalStageChanged {
            stage: FinalStageEvent::Dots,
        });
        let pulse = now + world.rng.gen_range(PULSE_MIN_S..=PULSE_MAX_S);
        seq.handles.push(timers.schedule(pulse, TaskKind::DotsFx));
        seq.handles
            .push(timers.schedule(now + DOTS_TIMEOUT_S, TaskKind::FinalTimeout));
        seq
    }

    /// Handle a click during the dots stage.
    ///
    /// The secret pattern is left, middle, right, completed within the
    /// rolling window. A click on the left dot always restarts the
    /// pattern; any other stray click resets it.
    pub fn on_click(
        &mut self,
        world: &mut WorldState,
        config: &Config,
        events: &EventSender,
        timers: &mut TimerQueue,
        now: f64,
        x: i32,
        y: i32,
    ) {
        if self.stage != FinalStage::Dots {
            return;
        }
        let hit = |dot: (f64, f64)| {
            let dx = f64::from(x) - dot.0;
            let dy = f64::from(y) - dot.1;
            (dx * dx + dy * dy).sqrt() <= DOT_HIT_RADIUS
        };
        let on_left = hit(self.left);
        let on_middle = hit(self.middle);
        let on_right = hit(self.right);
        let in_window = now - self.secret_started <= SECRET_WINDOW_S;

        match (self.secret_progress, on_left, on_middle, on_right) {
            (0, true, _, _) => {
                self.secret_progress = 1;
                self.secret_started = now;
            }
            (1, _, true, _) if in_window => {
                self.secret_progress = 2;
            }
            (2, _, _, true) if in_window => {
                if config.horror_game_enabled {
                    self.start_game(world, config, events, timers, now);
                } else {
                    self.show_ending(events, timers, now);
                }
            }
            (_, true, _, _) => {
                // Left restarts the pattern.
                self.secret_progress = 1;
                self.secret_started = now;
            }
            _ => {
                self.secret_progress = 0;
            }
        }
    }

    /// Pulse the dots and reschedule the next pulse.
    pub fn dots_fx(
        &mut self,
        world: &mut WorldState,
        events: &EventSender,
        timers: &mut TimerQueue,
        now: f64,
    ) {
        if self.stage != FinalStage::Dots {
            return;
        }
        if self.pulse_growing {
            self.pulse_radius += 1;
            if self.pulse_radius >= DOT_RADIUS + PULSE_SWING {
                self.pulse_growing = false;
            }
        } else {
            self.pulse_radius -= 1;
            if self.pulse_radius <= DOT_RADIUS - PULSE_SWING {
                self.pulse_growing = true;
            }
        }
        let _ = events.send(Event::DotsPulse {
            radius: self.pulse_radius,
        });
        let next = now + world.rng.gen_range(PULSE_MIN_S..=PULSE_MAX_S);
        self.handles.push(timers.schedule(next, TaskKind::DotsFx));
    }

    /// Dots timed out or the normal path was chosen: play the farewell.
    pub fn show_ending(&mut self, events: &EventSender, timers: &mut TimerQueue, now: f64) {
        if self.stage != FinalStage::Dots {
            return;
        }
        self.cancel_all(timers);
        self.stage = FinalStage::Ending;
        let _ = events.send(Event::FinalStageChanged {
            stage: FinalStageEvent::Ending,
        });
        let _ = events.send(Event::FaceRevealed);
        self.handles
            .push(timers.schedule(now + TYPE_START_S, TaskKind::TypeMessage));
    }

    /// Type the next farewell character.
    pub fn type_tick(&mut self, events: &EventSender, timers: &mut TimerQueue, now: f64) {
        if self.stage != FinalStage::Ending {
            return;
        }
        self.typed = (self.typed + 1).min(FAREWELL.chars().count());
        let text: String = FAREWELL.chars().take(self.typed).collect();
        let _ = events.send(Event::MessageTyped { text });

        if self.typed >= FAREWELL.chars().count() {
            self.stage = FinalStage::Done;
            self.handles.push(
                timers.schedule(now + RESURRECT_AFTER_MESSAGE_S, TaskKind::Resurrect),
            );
        } else {
            self.handles
                .push(timers.schedule(now + TYPE_DELAY_S, TaskKind::TypeMessage));
        }
    }

    /// Enter the horror mini-game.
    fn start_game(
        &mut self,
        world: &mut WorldState,
        config: &Config,
        events: &EventSender,
        timers: &mut TimerQueue,
        now: f64,
    ) {
        self.cancel_all(timers);
        self.stage = FinalStage::Game;
        let game = HorrorGame::new(world, config, now);
        let _ = events.send(Event::FinalStageChanged {
            stage: FinalStageEvent::Game,
        });
        let _ = events.send(Event::HorrorHud {
            score: 0,
            goal: GAME_GOAL,
        });
        let _ = events.send(Event::CollectibleMoved {
            x: game.collectible.0.round() as i32,
            y: game.collectible.1.round() as i32,
        });
        self.game = Some(game);
        self.handles
            .push(timers.schedule(now + GAME_TICK_S, TaskKind::HorrorTick));
    }

    /// Step the mini-game and reschedule or finish it.
    pub fn game_tick(
        &mut self,
        world: &mut WorldState,
        host: &mut dyn Host,
        config: &Config,
        events: &EventSender,
        timers: &mut TimerQueue,
        now: f64,
    ) -> Result<()> {
        if self.stage != FinalStage::Game {
            return Ok(());
        }
        let outcome = match self.game.as_mut() {
            Some(game) if !game.ended => game.tick(world, host, config, events, now),
            _ => None,
        };
        match outcome {
            Some(outcome) => self.end_game(outcome, events, timers, now),
            None => {
                self.handles
                    .push(timers.schedule(now + GAME_TICK_S, TaskKind::HorrorTick));
            }
        }
        Ok(())
    }

    /// Finish the mini-game. Idempotent; the first outcome wins.
    pub fn end_game(
        &mut self,
        outcome: GameOutcome,
        events: &EventSender,
        timers: &mut TimerQueue,
        now: f64,
    ) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        if game.ended {
            return;
        }
        game.ended = true;
        self.cancel_all(timers);
        self.stage = FinalStage::Done;

        let delay = match outcome {
            GameOutcome::Loss => {
                let _ = events.send(Event::JumpScare);
                RESURRECT_AFTER_LOSS_S
            }
            GameOutcome::Win | GameOutcome::Aborted => RESURRECT_AFTER_WIN_S,
        };
        self.handles
            .push(timers.schedule(now + delay, TaskKind::Resurrect));
    }

    /// The user bailed out (escape during the game).
    pub fn abort(&mut self, events: &EventSender, timers: &mut TimerQueue, now: f64) {
        if self.stage == FinalStage::Game {
            self.end_game(GameOutcome::Aborted, events, timers, now);
        }
    }

    /// Cancel every timer the sequence scheduled.
    pub fn cancel_all(&mut self, timers: &mut TimerQueue) {
        for handle in self.handles.drain(..) {
            timers.cancel(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event;
    use crate::host::NullHost;
    use crate::scheduler::TimerQueue;

    struct GameHost {
        cursor: (i32, i32),
    }

    impl Host for GameHost {
        fn idle_seconds(&mut self) -> Result<f64> {
            Ok(99.0)
        }
        fn cursor_pos(&mut self) -> Result<(i32, i32)> {
            Ok(self.cursor)
        }
        fn set_cursor_pos(&mut self, x: i32, y: i32) -> Result<()> {
            self.cursor = (x, y);
            Ok(())
        }
        fn synthesize_click(&mut self, _x: i32, _y: i32) -> Result<()> {
            Ok(())
        }
        fn foreground_window(&mut self) -> Result<Option<crate::host::WindowInfo>> {
            Ok(None)
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

    fn setup() -> (Config, WorldState, TimerQueue) {
        let config = Config::new().screen(800, 600).seed(9);
        let world = WorldState::new(&config);
        (config, world, TimerQueue::new())
    }

    fn click_secret(
        seq: &mut FinalSequence,
        world: &mut WorldState,
        config: &Config,
        events: &EventSender,
        timers: &mut TimerQueue,
        now: f64,
    ) {
        // Dots sit at 310, 400 and 490 on an 800-wide screen.
        seq.on_click(world, config, events, timers, now, 310, 300);
        seq.on_click(world, config, events, timers, now + 0.2, 400, 300);
        seq.on_click(world, config, events, timers, now + 0.4, 490, 300);
    }

    #[test]
    fn test_begin_shows_dots_and_arms_timeout() {
        let (config, mut world, mut timers) = setup();
        let (tx, mut rx) = event::channel();
        let seq = FinalSequence::begin(&mut world, &config, &tx, &mut timers, 0.0);
        assert_eq!(seq.stage, FinalStage::Dots);
        assert!(timers.len() >= 2);

        let mut saw_dots = false;
        while let Ok(ev) = rx.try_recv() {
            if matches!(
                ev,
                Event::FinalStageChanged {
                    stage: FinalStageEvent::Dots
                }
            ) {
                saw_dots = true;
            }
        }
        assert!(saw_dots);
    }

    #[test]
    fn test_secret_pattern_starts_game() {
        let (config, mut world, mut timers) = setup();
        let (tx, _rx) = event::channel();
        let mut seq = FinalSequence::begin(&mut world, &config, &tx, &mut timers, 0.0);
        click_secret(&mut seq, &mut world, &config, &tx, &mut timers, 1.0);
        assert_eq!(seq.stage, FinalStage::Game);
    }

    #[test]
    fn test_secret_pattern_expires_outside_window() {
        let (config, mut world, mut timers) = setup();
        let (tx, _rx) = event::channel();
        let mut seq = FinalSequence::begin(&mut world, &config, &tx, &mut timers, 0.0);
        seq.on_click(&mut world, &config, &tx, &mut timers, 1.0, 310, 300);
        // Too slow.
        seq.on_click(&mut world, &config, &tx, &mut timers, 3.5, 400, 300);
        seq.on_click(&mut world, &config, &tx, &mut timers, 3.6, 490, 300);
        assert_eq!(seq.stage, FinalStage::Dots);
    }

    #[test]
    fn test_left_dot_restarts_the_pattern() {
        let (config, mut world, mut timers) = setup();
        let (tx, _rx) = event::channel();
        let mut seq = FinalSequence::begin(&mut world, &config, &tx, &mut timers, 0.0);
        seq.on_click(&mut world, &config, &tx, &mut timers, 1.0, 310, 300);
        seq.on_click(&mut world, &config, &tx, &mut timers, 1.1, 400, 300);
        // Wrong dot; back to square one via the left dot.
        seq.on_click(&mut world, &config, &tx, &mut timers, 1.2, 310, 300);
        seq.on_click(&mut world, &config, &tx, &mut timers, 1.3, 400, 300);
        seq.on_click(&mut world, &config, &tx, &mut timers, 1.4, 490, 300);
        assert_eq!(seq.stage, FinalStage::Game);
    }

    #[test]
    fn test_secret_without_horror_game_goes_to_ending() {
        let (config, mut world, mut timers) = setup();
        let config = config.horror_game(false);
        let (tx, _rx) = event::channel();
        let mut seq = FinalSequence::begin(&mut world, &config, &tx, &mut timers, 0.0);
        click_secret(&mut seq, &mut world, &config, &tx, &mut timers, 1.0);
        assert_eq!(seq.stage, FinalStage::Ending);
    }

    #[test]
    fn test_timeout_path_types_farewell() {
        let (config, mut world, mut timers) = setup();
        let (tx, mut rx) = event::channel();
        let mut seq = FinalSequence::begin(&mut world, &config, &tx, &mut timers, 0.0);
        seq.show_ending(&tx, &mut timers, 10.0);
        assert_eq!(seq.stage, FinalStage::Ending);

        let mut now = 12.0;
        for _ in 0..10 {
            seq.type_tick(&tx, &mut timers, now);
            now += 0.6;
        }
        assert_eq!(seq.stage, FinalStage::Done);

        let mut last = String::new();
        while let Ok(ev) = rx.try_recv() {
            if let Event::MessageTyped { text } = ev {
                last = text;
            }
        }
        assert_eq!(last, "warum?");
    }

    #[test]
    fn test_game_score_never_decreases_and_end_is_idempotent() {
        let (config, mut world, mut timers) = setup();
        let (tx, _rx) = event::channel();
        let mut seq = FinalSequence::begin(&mut world, &config, &tx, &mut timers, 0.0);
        click_secret(&mut seq, &mut world, &config, &tx, &mut timers, 1.0);

        // Park the cursor away from the enemy start.
        let mut host = GameHost { cursor: (700, 500) };
        let mut last_score = 0;
        let mut now = 2.0;
        for _ in 0..50 {
            seq.game_tick(&mut world, &mut host, &config, &tx, &mut timers, now)
                .unwrap();
            if let Some(game) = seq.game.as_ref() {
                assert!(game.score >= last_score);
                last_score = game.score;
            }
            if seq.stage != FinalStage::Game {
                break;
            }
            now += 0.03;
        }

        seq.end_game(GameOutcome::Loss, &tx, &mut timers, now);
        let pending = timers.len();
        seq.end_game(GameOutcome::Win, &tx, &mut timers, now);
        assert_eq!(timers.len(), pending);
    }

    #[test]
    fn test_game_loss_when_enemy_reaches_cursor() {
        let (config, mut world, mut timers) = setup();
        let (tx, mut rx) = event::channel();
        let mut seq = FinalSequence::begin(&mut world, &config, &tx, &mut timers, 0.0);
        click_secret(&mut seq, &mut world, &config, &tx, &mut timers, 1.0);

        // Cursor sits on the enemy spawn corner.
        let mut host = GameHost { cursor: (12, 12) };
        seq.game_tick(&mut world, &mut host, &config, &tx, &mut timers, 2.0)
            .unwrap();
        assert_eq!(seq.stage, FinalStage::Done);

        let mut scared = false;
        while let Ok(ev) = rx.try_recv() {
            if matches!(ev, Event::JumpScare) {
                scared = true;
            }
        }
        assert!(scared);
    }

    #[test]
    fn test_abort_only_applies_to_game() {
        let (config, mut world, mut timers) = setup();
        let (tx, _rx) = event::channel();
        let mut seq = FinalSequence::begin(&mut world, &config, &tx, &mut timers, 0.0);
        seq.abort(&tx, &mut timers, 1.0);
        assert_eq!(seq.stage, FinalStage::Dots);

        click_secret(&mut seq, &mut world, &config, &tx, &mut timers, 2.0);
        seq.abort(&tx, &mut timers, 3.0);
        assert_eq!(seq.stage, FinalStage::Done);
    }

    #[test]
    fn test_game_without_cursor_aborts() {
        let (config, mut world, mut timers) = setup();
        let (tx, _rx) = event::channel();
        let mut seq = FinalSequence::begin(&mut world, &config, &tx, &mut timers, 0.0);
        click_secret(&mut seq, &mut world, &config, &tx, &mut timers, 1.0);

        let mut host = NullHost;
        seq.game_tick(&mut world, &mut host, &config, &tx, &mut timers, 2.0)
            .unwrap();
        assert_eq!(seq.stage, FinalStage::Done);
    }
}
