//! The engine.
//!
//! Owns every state machine and the timer queue, and runs them from a
//! single task. Timers fire synchronously through [`Engine::dispatch`];
//! the async [`Engine::run`] loop just sleeps until the next deadline and
//! feeds in commands from the embedder. Tests drive the same dispatch
//! path with manual time through [`Engine::run_until`].

use crate::arbiter::may_start_major_prank;
use crate::clone::CloneState;
use crate::config::{Config, DEFAULT_INTRO_S};
use crate::error::Result;
use crate::event::{self, Event, EventReceiver, EventSender, PrankKind};
use crate::finale::FinalSequence;
use crate::heist::{HeistKind, HeistSession};
use crate::host::{AssetScanner, Host, IDLE_SENTINEL_S};
use crate::pointer::{ActiveBehavior, DRAG_COOLDOWN_S};
use crate::profile::PetProfile;
use crate::scheduler::{TaskHandle, TaskKind, TimerQueue};
use crate::world::{Boundary, Emotion, WorldState, BOUNCE_SOUND_CHANCE};
use rand::Rng;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Motion tick period, seconds. Cursor-pong runs a faster clock.
const MOTION_TICK_S: f64 = 0.016;
const PONG_TICK_S: f64 = 0.008;

/// Annoyance roll interval range, seconds.
const ANNOY_MIN_S: f64 = 0.38;
const ANNOY_MAX_S: f64 = 1.10;

/// Foreground poll interval range, seconds.
const POLL_MIN_S: f64 = 0.70;
const POLL_MAX_S: f64 = 0.80;

/// Hunger drain period, seconds.
const HUNGER_TICK_S: f64 = 1.2;

/// Scare-mode roll interval range, seconds.
const SCARY_MIN_S: f64 = 0.15;
const SCARY_MAX_S: f64 = 1.20;

/// Image heist retry window after a failed attempt, seconds.
const IMAGE_RETRY_MIN_S: f64 = 4.0;
const IMAGE_RETRY_MAX_S: f64 = 9.0;

/// Editor heist windows, seconds.
const EDITOR_MIN_S: f64 = 22.0;
const EDITOR_MAX_S: f64 = 54.0;
const EDITOR_RETRY_MIN_S: f64 = 10.0;
const EDITOR_RETRY_MAX_S: f64 = 20.0;

/// How far a successful editor heist pushes the next image heist out.
const IMAGE_PUSH_MIN_S: f64 = 7.0;
const IMAGE_PUSH_MAX_S: f64 = 16.0;

/// Release kick spread when a heist ends, pixels per tick.
const HEIST_KICK_IMAGE: f64 = 2.4;
const HEIST_KICK_EDITOR: f64 = 1.7;

/// Window-kill schedule and trigger chance.
const KILL_MIN_S: f64 = 15.0;
const KILL_MAX_S: f64 = 45.0;
const KILL_CHANCE: f64 = 0.15;

/// Mouse-lock schedule windows and trigger chance.
const LOCK_OK_MIN_S: f64 = 12.0;
const LOCK_OK_MAX_S: f64 = 28.0;
const LOCK_RETRY_MIN_S: f64 = 6.0;
const LOCK_RETRY_MAX_S: f64 = 12.0;
const LOCK_CHANCE: f64 = 0.30;

/// Close-attack chance per annoyance roll.
const ORBIT_CHANCE: f64 = 0.10;

/// Clone schedule window and spawn chance.
const CLONE_MIN_S: f64 = 30.0;
const CLONE_MAX_S: f64 = 75.0;
const CLONE_CHANCE: f64 = 0.50;
const CLONE_BOUNCE_SOUND_CHANCE: f64 = 0.18;

/// A cursor-pong session keeps the clone alive this long.
const PONG_CLONE_EXTENSION_S: f64 = 25.0;

/// Drag release stun, seconds.
const DRAG_STUN_S: f64 = 0.35;

/// Two drags at least this long within the window start cursor-pong.
const STRONG_DRAG_PX: f64 = 120.0;
const STRONG_DRAG_WINDOW_S: f64 = 6.0;

/// Chance that a drag release makes the agent chase the cursor.
const SHOO_ANGER_CHANCE: f64 = 0.5;

/// The agent flees the cursor inside this radius while wandering.
const FLEE_RADIUS: f64 = 120.0;
const FLEE_FORCE: f64 = 0.9;

/// Anger duration after the user closes the payload by hand.
const PAYLOAD_CLOSED_ANGER_S: f64 = 5.0;

/// Steering and speed boosts while in scare mode.
const SCARY_FORCE: f64 = 0.9;
const SCARY_SPEED_FACTOR: f64 = 1.5;

/// Cap on scare-mode editor spawns per run.
const SCARY_EDITOR_CAP: u32 = 25;

/// Scare-mode effect chances per roll.
const SCARY_TELEPORT_CHANCE: f64 = 0.12;
const SCARY_TEXT_CHANCE: f64 = 0.08;
const SCARY_EDITOR_CHANCE: f64 = 0.08;
const SCARY_JUMPSCARE_CHANCE: f64 = 0.03;
const SCARY_CURSOR_CHANCE: f64 = 0.06;

const SCARY_TEXTS: &[&str] = &[
    "ich bin noch da",
    "du hast mich geklickt",
    "warum?",
    "hinter dir",
    "es ist zu spaet",
];

/// Browser processes that count for the video-site watch rule.
const BROWSER_PROCESSES: &[&str] = &[
    "chrome.exe",
    "msedge.exe",
    "firefox.exe",
    "opera.exe",
    "brave.exe",
    "vivaldi.exe",
];

/// Chat clients that count for the chat watch rule.
const CHAT_PROCESSES: &[&str] = &["discord.exe", "discordcanary.exe", "discordptb.exe"];

/// Commands sent to the engine by the embedder.
#[derive(Debug)]
pub enum Command {
    /// The user grabbed the agent.
    DragStart,
    /// The user moved the agent to a new position.
    DragMove {
        /// New x coordinate.
        x: i32,
        /// New y coordinate.
        y: i32,
    },
    /// The user released the agent.
    DragEnd,
    /// The user asked to close the app; a confirm prompt opened.
    CloseRequested,
    /// The user cancelled the close prompt.
    CancelClose,
    /// The user confirmed closing; the final sequence starts.
    ConfirmClose,
    /// A click landed during the final dots stage.
    FinalClick {
        /// Click x.
        x: i32,
        /// Click y.
        y: i32,
    },
    /// The user closed the heist payload window by hand.
    PayloadClosedByUser,
    /// The user closed one of the scare-mode editor windows.
    ScaryEditorClosed,
    /// A file was dropped on the agent as food.
    Feed {
        /// Raw file contents.
        bytes: Vec<u8>,
    },
    /// Escape was pressed.
    EscapePressed,
    /// Stop the engine.
    Shutdown,
}

/// Handle for stopping a running engine from outside.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    cancelled: Arc<AtomicBool>,
}

impl EngineHandle {
    /// Request the engine to stop at the next loop iteration.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Per-rule watch session flags, so each rule notifies once per sighting.
#[derive(Debug, Default)]
struct WatchState {
    video_active: bool,
    chat_active: bool,
}

/// The behavior engine.
pub struct Engine<H: Host> {
    config: Config,
    host: H,
    world: WorldState,
    events: EventSender,
    timers: TimerQueue,

    heist: Option<HeistSession>,
    pointer: ActiveBehavior,
    finale: Option<FinalSequence>,
    clone: Option<CloneState>,

    image_pool: Vec<PathBuf>,
    scan_rx: Option<oneshot::Receiver<Vec<PathBuf>>>,
    next_image_task: Option<TaskHandle>,

    drag_origin: Option<(f64, f64)>,
    strong_drags: VecDeque<f64>,

    last_emotion: Emotion,
    scary_editors_spawned: u32,
    watch: WatchState,
    clock: f64,
    cancelled: Arc<AtomicBool>,
}

impl<H: Host> Engine<H> {
    /// Create an engine and arm its recurring timers.
    pub fn new(config: Config, host: H) -> (Self, EventReceiver, EngineHandle) {
        let (events, receiver) = event::channel();
        let mut world = WorldState::new(&config);
        world.intro_until = DEFAULT_INTRO_S;

        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = EngineHandle {
            cancelled: Arc::clone(&cancelled),
        };

        let mut engine = Self {
            config,
            host,
            world,
            events,
            timers: TimerQueue::new(),
            heist: None,
            pointer: ActiveBehavior::Idle,
            finale: None,
            clone: None,
            image_pool: Vec::new(),
            scan_rx: None,
            next_image_task: None,
            drag_origin: None,
            strong_drags: VecDeque::new(),
            last_emotion: Emotion::Neutral,
            scary_editors_spawned: 0,
            watch: WatchState::default(),
            clock: 0.0,
            cancelled,
        };
        engine.arm_initial_timers();
        (engine, receiver, handle)
    }

    fn arm_initial_timers(&mut self) {
        self.timers.schedule(0.0, TaskKind::Motion);
        let annoy = self.world.rng.gen_range(ANNOY_MIN_S..=ANNOY_MAX_S);
        self.timers.schedule(annoy, TaskKind::Annoy);
        let poll = self.world.rng.gen_range(POLL_MIN_S..=POLL_MAX_S);
        self.timers.schedule(poll, TaskKind::ForegroundPoll);
        if self.config.hunger_enabled {
            self.timers.schedule(HUNGER_TICK_S, TaskKind::HungerTick);
        }

        let image_at = DEFAULT_INTRO_S
            + self
                .world
                .rng
                .gen_range(self.config.image_min_s..=self.config.image_max_s);
        self.next_image_task = Some(self.timers.schedule(image_at, TaskKind::ImageHeist));

        if self.config.editor_mischief_enabled {
            let at = DEFAULT_INTRO_S + self.world.rng.gen_range(EDITOR_MIN_S..=EDITOR_MAX_S);
            self.timers.schedule(at, TaskKind::EditorHeist);
        }

        let kill_at = DEFAULT_INTRO_S + self.world.rng.gen_range(KILL_MIN_S..=KILL_MAX_S);
        self.timers.schedule(kill_at, TaskKind::WindowKill);
        let lock_at = DEFAULT_INTRO_S + self.world.rng.gen_range(LOCK_OK_MIN_S..=LOCK_OK_MAX_S);
        self.timers.schedule(lock_at, TaskKind::MouseLock);
        let clone_at = DEFAULT_INTRO_S + self.world.rng.gen_range(CLONE_MIN_S..=CLONE_MAX_S);
        self.timers.schedule(clone_at, TaskKind::CloneSpawn);
    }

    /// Kick off the background image scan.
    ///
    /// The scan runs on the blocking pool and its result is absorbed into
    /// the candidate pool the next time a timer fires.
    pub fn start_asset_scan(&mut self, scanner: Arc<dyn AssetScanner>) {
        let (tx, rx) = oneshot::channel();
        let limit = self.config.scan_limit;
        self.scan_rx = Some(rx);
        tokio::task::spawn_blocking(move || {
            let paths = scanner.scan(limit);
            let _ = tx.send(paths);
        });
    }

    /// Seed the candidate image pool directly. Mostly for tests and
    /// embedders that scan on their own.
    pub fn set_image_pool(&mut self, pool: Vec<PathBuf>) {
        self.image_pool = pool;
    }

    fn absorb_scan(&mut self) {
        if let Some(rx) = self.scan_rx.as_mut() {
            if let Ok(paths) = rx.try_recv() {
                info!(count = paths.len(), "image scan finished");
                self.image_pool = paths;
                self.scan_rx = None;
            }
        }
    }

    fn idle_seconds(&mut self) -> f64 {
        self.host.idle_seconds().unwrap_or(IDLE_SENTINEL_S)
    }

    fn major_prank_active(&self) -> bool {
        self.heist.is_some() || self.pointer.is_active() || self.finale.is_some()
    }

    fn prank_allowed(&mut self, now: f64) -> bool {
        let idle = self.idle_seconds();
        may_start_major_prank(
            &self.world,
            self.major_prank_active(),
            now,
            idle,
            &self.config,
        )
    }

    /// Run one fired timer.
    pub fn dispatch(&mut self, kind: TaskKind, now: f64) {
        self.clock = now;
        self.absorb_scan();
        if self.world.intro_active && now >= self.world.intro_until {
            self.world.intro_active = false;
        }

        match kind {
            TaskKind::Motion => self.tick_motion(now),
            TaskKind::Annoy => self.tick_annoy(now),
            TaskKind::ForegroundPoll => self.tick_foreground(now),
            TaskKind::HungerTick => self.tick_hunger(now),
            TaskKind::ScaryTick => self.tick_scary(now),
            TaskKind::ImageHeist => self.try_image_heist(now),
            TaskKind::EditorHeist => self.try_editor_heist(now),
            TaskKind::WindowKill => self.try_window_kill(now),
            TaskKind::MouseLock => self.try_mouse_lock(now),
            TaskKind::CloneSpawn => self.try_clone_spawn(now),
            TaskKind::DotsFx => {
                if let Some(finale) = self.finale.as_mut() {
                    finale.dots_fx(&mut self.world, &self.events, &mut self.timers, now);
                }
            }
            TaskKind::FinalTimeout => {
                if let Some(finale) = self.finale.as_mut() {
                    finale.show_ending(&self.events, &mut self.timers, now);
                }
            }
            TaskKind::TypeMessage => {
                if let Some(finale) = self.finale.as_mut() {
                    finale.type_tick(&self.events, &mut self.timers, now);
                }
            }
            TaskKind::HorrorTick => {
                if let Some(finale) = self.finale.as_mut() {
                    if let Err(err) = finale.game_tick(
                        &mut self.world,
                        &mut self.host,
                        &self.config,
                        &self.events,
                        &mut self.timers,
                        now,
                    ) {
                        warn!(%err, "horror tick failed");
                    }
                }
            }
            TaskKind::Resurrect => self.resurrect(now),
        }
    }

    fn in_pong(&self) -> bool {
        matches!(self.pointer, ActiveBehavior::PingPong(_))
    }

    fn tick_motion(&mut self, now: f64) {
        if self.finale.is_none() {
            self.step_agent(now);
        }
        self.step_clone(now);
        self.emit_emotion(now);

        let period = if self.in_pong() {
            PONG_TICK_S
        } else {
            MOTION_TICK_S
        };
        self.timers.schedule(now + period, TaskKind::Motion);
    }

    fn step_agent(&mut self, now: f64) {
        if self.world.dragging {
            return;
        }

        if let Some(heist) = self.heist.as_mut() {
            match heist.tick(
                &mut self.world,
                &mut self.host,
                &self.config,
                &self.events,
                now,
            ) {
                Ok(true) => {
                    let kind = heist.kind;
                    self.finish_heist(kind.prank_kind(), now);
                }
                Ok(false) => {
                    let _ = self.events.send(Event::agent_moved(
                        self.world.x.round() as i32,
                        self.world.y.round() as i32,
                    ));
                    if let Some(heist) = self.heist.as_ref() {
                        if heist.payload_visible() {
                            let (px, py) = heist.payload_position(&self.world, &self.config);
                            let _ = self.events.send(Event::PayloadMoved { x: px, y: py });
                            // Only the stolen image hangs from a rope.
                            if heist.kind == HeistKind::Image {
                                let _ = self.events.send(Event::RopeUpdated {
                                    points: heist.rope_points(&self.world, &self.config, now),
                                });
                            }
                        }
                    }
                }
                Err(err) => {
                    debug!(%err, "heist aborted");
                    let kind = heist.kind;
                    let _ = heist.stop(&mut self.host, &self.events);
                    self.finish_heist(kind.prank_kind(), now);
                }
            }
            return;
        }

        if self.pointer.is_active() {
            let was_pong = self.in_pong();
            if let Err(err) = self.pointer.tick(
                &mut self.world,
                &mut self.host,
                &self.config,
                &self.events,
                now,
            ) {
                debug!(%err, "pointer behavior aborted");
                self.pointer.cancel(&self.events);
            }
            if was_pong && !self.in_pong() {
                // End of the rally sends the clone tumbling too.
                if let Some(clone) = self.clone.as_mut() {
                    let kx = self.world.rng.gen_range(-2.0..=2.0);
                    let ky = self.world.rng.gen_range(-2.0..=2.0);
                    clone.kick(kx, ky);
                }
            }
            let _ = self.events.send(Event::agent_moved(
                self.world.x.round() as i32,
                self.world.y.round() as i32,
            ));
            return;
        }

        // Plain wandering.
        let mut limit = self.config.max_speed;
        if now < self.world.stunned_until {
            self.world.stun_decay();
        } else {
            let mut fleeing = false;
            if let Ok((cx, cy)) = self.host.cursor_pos() {
                let (ax, ay) = self.world.center(&self.config);
                let dx = ax - f64::from(cx);
                let dy = ay - f64::from(cy);
                if (dx * dx + dy * dy).sqrt() < FLEE_RADIUS {
                    self.world
                        .steer_to(self.world.x + dx, self.world.y + dy, FLEE_FORCE);
                    limit += self.config.escape_boost;
                    fleeing = true;
                }
            }
            if !fleeing {
                let (wx, wy) = (self.world.wander_x, self.world.wander_y);
                if self.world.scary_mode {
                    self.world.steer_to(wx, wy, SCARY_FORCE);
                    limit = self.config.max_speed * SCARY_SPEED_FACTOR;
                } else {
                    self.world.steer_to(wx, wy, 0.35);
                }
            }
            self.world.jitter();
            self.world.tick_wander(&self.config);
        }
        self.world.clamp_velocity(limit);
        let bounced = self.world.advance(&self.config, Boundary::Reflect);
        if bounced && self.config.sounds_enabled && self.world.rng.gen_bool(BOUNCE_SOUND_CHANCE) {
            let _ = self.events.send(Event::Bounce { volume: 0.8 });
        }
        let _ = self.events.send(Event::agent_moved(
            self.world.x.round() as i32,
            self.world.y.round() as i32,
        ));
    }

    fn finish_heist(&mut self, kind: PrankKind, now: f64) {
        self.heist = None;
        let _ = self.events.send(Event::prank_ended(kind));

        // The agent shoves off from wherever it parked the loot.
        let spread = match kind {
            PrankKind::ImageHeist => HEIST_KICK_IMAGE,
            _ => HEIST_KICK_EDITOR,
        };
        let kx = self.world.rng.gen_range(-spread..=spread);
        let ky = self.world.rng.gen_range(-spread..=spread);
        self.world.kick(kx, ky);
        self.world.choose_wander_target(&self.config);

        match kind {
            PrankKind::ImageHeist => self.schedule_image(now, None),
            PrankKind::EditorHeist => {
                let at = now + self.world.rng.gen_range(EDITOR_MIN_S..=EDITOR_MAX_S);
                self.timers.schedule(at, TaskKind::EditorHeist);
                // A fresh editor prank earns the image heist a break.
                let push = now + self.world.rng.gen_range(IMAGE_PUSH_MIN_S..=IMAGE_PUSH_MAX_S);
                self.schedule_image_at_least(push);
            }
            _ => {}
        }
    }

    fn schedule_image(&mut self, now: f64, retry: Option<(f64, f64)>) {
        let (min_s, max_s) = retry.unwrap_or((self.config.image_min_s, self.config.image_max_s));
        let at = now + self.world.rng.gen_range(min_s..=max_s);
        if let Some(handle) = self.next_image_task.take() {
            self.timers.cancel(handle);
        }
        self.next_image_task = Some(self.timers.schedule(at, TaskKind::ImageHeist));
    }

    fn schedule_image_at_least(&mut self, at: f64) {
        if let Some(handle) = self.next_image_task.take() {
            self.timers.cancel(handle);
        }
        self.next_image_task = Some(self.timers.schedule(at, TaskKind::ImageHeist));
    }

    fn try_image_heist(&mut self, now: f64) {
        self.next_image_task = None;
        let idle = self.idle_seconds();
        if !self.prank_allowed(now) || idle < self.config.image_idle_s {
            self.schedule_image(now, Some((IMAGE_RETRY_MIN_S, IMAGE_RETRY_MAX_S)));
            return;
        }
        match HeistSession::start_image(
            &mut self.world,
            &mut self.host,
            &self.config,
            &mut self.image_pool,
            now,
        ) {
            Ok(session) => {
                info!("image heist started");
                let _ = self.events.send(Event::prank_started(PrankKind::ImageHeist));
                self.heist = Some(session);
            }
            Err(err) => {
                debug!(%err, "image heist skipped");
                self.schedule_image(now, Some((IMAGE_RETRY_MIN_S, IMAGE_RETRY_MAX_S)));
            }
        }
    }

    fn try_editor_heist(&mut self, now: f64) {
        if !self.prank_allowed(now) {
            let at = now + self.world.rng.gen_range(EDITOR_RETRY_MIN_S..=EDITOR_RETRY_MAX_S);
            self.timers.schedule(at, TaskKind::EditorHeist);
            return;
        }
        let profile: &PetProfile = self.config.pet_profile();
        match HeistSession::start_editor(&mut self.world, &self.config, profile, now) {
            Ok(session) => {
                info!(profile = profile.id, "editor heist started");
                let _ = self
                    .events
                    .send(Event::prank_started(PrankKind::EditorHeist));
                self.heist = Some(session);
            }
            Err(err) => {
                debug!(%err, "editor heist skipped");
                let at = now + self.world.rng.gen_range(EDITOR_RETRY_MIN_S..=EDITOR_RETRY_MAX_S);
                self.timers.schedule(at, TaskKind::EditorHeist);
            }
        }
    }

    fn try_window_kill(&mut self, now: f64) {
        let at = now + self.world.rng.gen_range(KILL_MIN_S..=KILL_MAX_S);
        self.timers.schedule(at, TaskKind::WindowKill);

        if !self.prank_allowed(now) || !self.world.rng.gen_bool(KILL_CHANCE) {
            return;
        }
        if let Err(err) =
            self.pointer
                .start_window_kill(&mut self.host, &self.config, &self.events, now)
        {
            debug!(%err, "window kill skipped");
        }
    }

    fn try_mouse_lock(&mut self, now: f64) {
        if self.prank_allowed(now) && self.world.rng.gen_bool(LOCK_CHANCE) {
            match self
                .pointer
                .start_mouse_lock(&mut self.world, &self.events, now)
            {
                Ok(()) => {
                    let at = now + self.world.rng.gen_range(LOCK_OK_MIN_S..=LOCK_OK_MAX_S);
                    self.timers.schedule(at, TaskKind::MouseLock);
                    return;
                }
                Err(err) => debug!(%err, "mouse lock skipped"),
            }
        }
        let at = now + self.world.rng.gen_range(LOCK_RETRY_MIN_S..=LOCK_RETRY_MAX_S);
        self.timers.schedule(at, TaskKind::MouseLock);
    }

    fn try_clone_spawn(&mut self, now: f64) {
        let at = now + self.world.rng.gen_range(CLONE_MIN_S..=CLONE_MAX_S);
        self.timers.schedule(at, TaskKind::CloneSpawn);

        if self.clone.is_some() || self.finale.is_some() {
            return;
        }
        if !self.world.rng.gen_bool(CLONE_CHANCE) {
            return;
        }
        let clone = CloneState::spawn(&mut self.world, &self.config, now);
        let _ = self.events.send(Event::CloneSpawned {
            x: clone.x.round() as i32,
            y: clone.y.round() as i32,
        });
        self.clone = Some(clone);
    }

    fn step_clone(&mut self, now: f64) {
        // During cursor-pong the clone is pinned to the right paddle.
        if let ActiveBehavior::PingPong(pong) = &self.pointer {
            if let Some(clone) = self.clone.as_mut() {
                let (px, py) = pong.right_paddle(&self.config);
                clone.x = px;
                clone.y = py;
                let _ = self.events.send(Event::CloneMoved {
                    x: px.round() as i32,
                    y: py.round() as i32,
                });
            }
            return;
        }
        if let Some(clone) = self.clone.as_mut() {
            let (expired, bounced) = clone.tick(&mut self.world, &self.config, now);
            if expired {
                self.clone = None;
                let _ = self.events.send(Event::CloneDespawned);
            } else {
                let _ = self.events.send(Event::CloneMoved {
                    x: clone.x.round() as i32,
                    y: clone.y.round() as i32,
                });
                if bounced
                    && self.config.sounds_enabled
                    && self.world.rng.gen_bool(CLONE_BOUNCE_SOUND_CHANCE)
                {
                    let _ = self.events.send(Event::Bounce { volume: 0.4 });
                }
            }
        }
    }

    fn tick_annoy(&mut self, now: f64) {
        let at = now + self.world.rng.gen_range(ANNOY_MIN_S..=ANNOY_MAX_S);
        self.timers.schedule(at, TaskKind::Annoy);

        if self.prank_allowed(now) && self.world.rng.gen_bool(ORBIT_CHANCE) {
            if self.pointer.start_close_attack(&self.events, now).is_ok() {
                debug!("close attack started");
            }
        }
    }

    fn tick_foreground(&mut self, now: f64) {
        let at = now + self.world.rng.gen_range(POLL_MIN_S..=POLL_MAX_S);
        self.timers.schedule(at, TaskKind::ForegroundPoll);

        let info = match self.host.foreground_window() {
            Ok(Some(info)) => info,
            _ => {
                self.watch.video_active = false;
                self.watch.chat_active = false;
                return;
            }
        };
        let title = info.title.to_lowercase();
        let process = info.process.as_deref().unwrap_or("");

        let on_video = title.contains("youtube")
            && (process.is_empty() || BROWSER_PROCESSES.contains(&process));
        if on_video && !self.watch.video_active && self.config.notifications_enabled {
            let profile = self.config.pet_profile();
            let _ = self.events.send(Event::notification(
                profile.name,
                "videos gucken statt arbeiten?",
            ));
        }
        self.watch.video_active = on_video;

        let on_chat = CHAT_PROCESSES.contains(&process);
        if on_chat && !self.watch.chat_active && self.config.notifications_enabled {
            let profile = self.config.pet_profile();
            let _ = self
                .events
                .send(Event::notification(profile.name, "mit wem schreibst du da?"));
        }
        self.watch.chat_active = on_chat;
    }

    fn tick_hunger(&mut self, now: f64) {
        self.timers.schedule(now + HUNGER_TICK_S, TaskKind::HungerTick);
        if !self.config.hunger_enabled {
            return;
        }
        let before = self.world.hunger;
        let drain = HUNGER_TICK_S / self.config.hunger_full_s;
        self.world.hunger = (self.world.hunger - drain).max(0.0);
        if before > 0.2 && self.world.hunger <= 0.2 && self.config.notifications_enabled {
            let profile = self.config.pet_profile();
            let _ = self
                .events
                .send(Event::notification(profile.name, "ich hab hunger."));
        }
    }

    fn tick_scary(&mut self, now: f64) {
        if !self.world.scary_mode {
            return;
        }
        let at = now + self.world.rng.gen_range(SCARY_MIN_S..=SCARY_MAX_S);
        self.timers.schedule(at, TaskKind::ScaryTick);

        if self.world.rng.gen_bool(SCARY_TELEPORT_CHANCE) {
            let max_x = (self.config.screen_w - self.config.block_size).max(1);
            let max_y = (self.config.screen_h - self.config.block_size).max(1);
            self.world.x = self.world.rng.gen_range(0..max_x) as f64;
            self.world.y = self.world.rng.gen_range(0..max_y) as f64;
            let _ = self.events.send(Event::Teleported {
                x: self.world.x.round() as i32,
                y: self.world.y.round() as i32,
            });
        }
        if self.world.rng.gen_bool(SCARY_TEXT_CHANCE) {
            let idx = self.world.rng.gen_range(0..SCARY_TEXTS.len());
            let _ = self.events.send(Event::ScaryText {
                text: SCARY_TEXTS[idx].to_string(),
            });
        }
        if self.world.rng.gen_bool(SCARY_EDITOR_CHANCE) {
            self.spawn_scary_editor();
        }
        if self.world.rng.gen_bool(SCARY_JUMPSCARE_CHANCE) {
            let _ = self.events.send(Event::JumpScare);
        }
        if self.world.rng.gen_bool(SCARY_CURSOR_CHANCE) {
            if let Ok((cx, cy)) = self.host.cursor_pos() {
                for _ in 0..5 {
                    let nx = cx + self.world.rng.gen_range(-50..=50);
                    let ny = cy + self.world.rng.gen_range(-50..=50);
                    let _ = self.host.set_cursor_pos(nx, ny);
                }
            }
        }
    }

    fn spawn_scary_editor(&mut self) -> bool {
        if self.scary_editors_spawned >= SCARY_EDITOR_CAP {
            return false;
        }
        self.scary_editors_spawned += 1;
        let idx = self.world.rng.gen_range(0..SCARY_TEXTS.len());
        let _ = self.events.send(Event::ScaryEditorSpawned {
            title: "???.txt - Notepad".to_string(),
            body: SCARY_TEXTS[idx].to_string(),
        });
        true
    }

    fn emit_emotion(&mut self, now: f64) {
        let emotion = self.world.emotion(now);
        if emotion != self.last_emotion {
            self.last_emotion = emotion;
            let _ = self.events.send(Event::emotion(emotion.name()));
        }
    }

    /// Handle a command from the embedder. Returns false on shutdown.
    pub fn handle_command(&mut self, command: Command, now: f64) -> bool {
        self.clock = now;
        match command {
            Command::DragStart => {
                self.world.dragging = true;
                self.drag_origin = Some((self.world.x, self.world.y));
            }
            Command::DragMove { x, y } => {
                if self.world.dragging {
                    self.world.vx = f64::from(x) - self.world.x;
                    self.world.vy = f64::from(y) - self.world.y;
                    self.world.x = f64::from(x);
                    self.world.y = f64::from(y);
                    let _ = self.events.send(Event::agent_moved(x, y));
                }
            }
            Command::DragEnd => self.on_drag_end(now),
            Command::CloseRequested => {
                self.world.prompt_open = true;
            }
            Command::CancelClose => {
                self.world.prompt_open = false;
                self.world.confused_until = now + 1.5;
            }
            Command::ConfirmClose => {
                self.world.prompt_open = false;
                self.begin_finale(now);
            }
            Command::FinalClick { x, y } => {
                if let Some(finale) = self.finale.as_mut() {
                    finale.on_click(
                        &mut self.world,
                        &self.config,
                        &self.events,
                        &mut self.timers,
                        now,
                        x,
                        y,
                    );
                }
            }
            Command::PayloadClosedByUser => {
                if let Some(mut heist) = self.heist.take() {
                    let kind = heist.kind;
                    let _ = heist.stop(&mut self.host, &self.events);
                    self.finish_heist(kind.prank_kind(), now);
                }
                self.world.angry_until = now + PAYLOAD_CLOSED_ANGER_S;
            }
            Command::ScaryEditorClosed => {
                // Closing one spawns more. Resistance is counterproductive.
                if self.world.scary_mode {
                    let extra = self.world.rng.gen_range(1..=2);
                    for _ in 0..extra {
                        if !self.spawn_scary_editor() {
                            break;
                        }
                    }
                }
            }
            Command::Feed { bytes } => {
                self.world.feed();
                self.world.ingest_food(&bytes);
                if self.config.notifications_enabled {
                    let profile = self.config.pet_profile();
                    let _ = self
                        .events
                        .send(Event::notification(profile.name, "mmh. daten."));
                }
            }
            Command::EscapePressed => {
                if let Some(finale) = self.finale.as_mut() {
                    finale.abort(&self.events, &mut self.timers, now);
                }
            }
            Command::Shutdown => return false,
        }
        true
    }

    fn on_drag_end(&mut self, now: f64) {
        self.world.dragging = false;
        self.world.stunned_until = now + DRAG_STUN_S;

        let distance = match self.drag_origin.take() {
            Some((ox, oy)) => {
                let dx = self.world.x - ox;
                let dy = self.world.y - oy;
                (dx * dx + dy * dy).sqrt()
            }
            None => 0.0,
        };

        if distance >= STRONG_DRAG_PX {
            self.strong_drags.push_back(now);
        }
        while let Some(&front) = self.strong_drags.front() {
            if now - front > STRONG_DRAG_WINDOW_S {
                self.strong_drags.pop_front();
            } else {
                break;
            }
        }

        if self.strong_drags.len() >= 2
            && self.heist.is_none()
            && self.finale.is_none()
            && !self.world.prompt_open
        {
            // The rally outranks a running chase.
            if matches!(self.pointer, ActiveBehavior::AngryCatch { .. }) {
                self.pointer.cancel(&self.events);
            }
            self.strong_drags.clear();
            if self
                .pointer
                .start_ping_pong(&mut self.world, &self.config, &self.events, now)
                .is_ok()
            {
                // The rally needs an opponent on the right paddle.
                if self.clone.is_none() {
                    let clone = CloneState::spawn(&mut self.world, &self.config, now);
                    let _ = self.events.send(Event::CloneSpawned {
                        x: clone.x.round() as i32,
                        y: clone.y.round() as i32,
                    });
                    self.clone = Some(clone);
                }
                if let Some(clone) = self.clone.as_mut() {
                    clone.extend(now + PONG_CLONE_EXTENSION_S);
                }
                return;
            }
        }

        // A shoo can make the agent mad enough to chase.
        if self.world.rng.gen_bool(SHOO_ANGER_CHANCE) && self.prank_allowed(now) {
            if self
                .pointer
                .start_angry_catch(&mut self.world, &self.events, now)
                .is_ok()
            {
                self.world.angry_until = now + 2.0;
                self.world.angry_catch_cooldown_until = now + DRAG_COOLDOWN_S;
            }
        }
    }

    fn begin_finale(&mut self, now: f64) {
        if self.finale.is_some() {
            return;
        }
        if let Some(mut heist) = self.heist.take() {
            let _ = heist.stop(&mut self.host, &self.events);
            let _ = self.events.send(Event::prank_ended(heist.kind.prank_kind()));
        }
        if self.pointer.is_active() {
            self.pointer.cancel(&self.events);
        }
        if self.clone.take().is_some() {
            let _ = self.events.send(Event::CloneDespawned);
        }
        info!("final sequence started");
        self.finale = Some(FinalSequence::begin(
            &mut self.world,
            &self.config,
            &self.events,
            &mut self.timers,
            now,
        ));
    }

    fn resurrect(&mut self, now: f64) {
        if let Some(mut finale) = self.finale.take() {
            finale.cancel_all(&mut self.timers);
        }
        info!("the agent is back");
        self.world.scary_mode = true;
        self.world.x = f64::from(self.config.screen_w - self.config.block_size) / 2.0;
        self.world.y = f64::from(self.config.screen_h - self.config.block_size) / 2.0;
        self.world.vx = 0.0;
        self.world.vy = 0.0;
        let _ = self.events.send(Event::FinalStageChanged {
            stage: crate::event::FinalStageEvent::Done,
        });
        let _ = self.events.send(Event::Resurrected);
        let _ = self.events.send(Event::prank_ended(PrankKind::FinalSequence));
        let at = now + self.world.rng.gen_range(SCARY_MIN_S..=SCARY_MAX_S);
        self.timers.schedule(at, TaskKind::ScaryTick);
        let _ = self.events.send(Event::agent_moved(
            self.world.x.round() as i32,
            self.world.y.round() as i32,
        ));
    }

    /// Drive all timers due up to `t` with manual time. Test harness entry
    /// point; fired tasks observe their own fire time as "now".
    pub fn run_until(&mut self, t: f64) {
        while let Some((_, kind, at)) = self.timers.pop_due(t) {
            self.dispatch(kind, at);
        }
        self.clock = t;
    }

    /// Current engine time as seen by the last dispatch.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Run the engine on tokio time until shutdown or cancellation.
    pub async fn run(&mut self, mut commands: mpsc::UnboundedReceiver<Command>) -> Result<()> {
        let start = tokio::time::Instant::now();
        info!(
            profile = self.config.profile_id.as_str(),
            "engine running"
        );

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                info!("engine cancelled");
                return Ok(());
            }

            let now = start.elapsed().as_secs_f64();
            while let Some((_, kind, at)) = self.timers.pop_due(now) {
                self.dispatch(kind, at);
            }

            let sleep_for = self
                .timers
                .next_deadline()
                .map(|at| (at - start.elapsed().as_secs_f64()).max(0.0))
                .unwrap_or(0.25);

            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs_f64(sleep_for)) => {}
                cmd = commands.recv() => {
                    let now = start.elapsed().as_secs_f64();
                    match cmd {
                        Some(command) => {
                            if !self.handle_command(command, now) {
                                info!("engine shut down");
                                return Ok(());
                            }
                        }
                        None => {
                            info!("command channel closed");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;

    fn engine() -> (Engine<NullHost>, EventReceiver) {
        let config = Config::new().screen(800, 600).seed(5);
        let (engine, rx, _handle) = Engine::new(config, NullHost);
        (engine, rx)
    }

    fn drain(rx: &mut EventReceiver) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn test_motion_reschedules_itself() {
        let (mut engine, mut rx) = engine();
        engine.run_until(1.0);
        let moved = drain(&mut rx)
            .iter()
            .filter(|e| matches!(e, Event::AgentMoved { .. }))
            .count();
        // Roughly one per 16 ms tick.
        assert!(moved > 40, "only {moved} motion events");
    }

    #[test]
    fn test_intro_blocks_early_pranks() {
        let (mut engine, mut rx) = engine();
        engine.run_until(DEFAULT_INTRO_S - 0.1);
        let started = drain(&mut rx)
            .iter()
            .any(|e| matches!(e, Event::PrankStarted { .. }));
        assert!(!started);
    }

    #[test]
    fn test_image_heist_runs_and_reschedules() {
        let (mut engine, mut rx) = engine();
        engine.set_image_pool(vec![PathBuf::from("cat.png")]);
        engine.run_until(120.0);
        let events = drain(&mut rx);
        let started = events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    Event::PrankStarted {
                        kind: PrankKind::ImageHeist
                    }
                )
            })
            .count();
        let ended = events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    Event::PrankEnded {
                        kind: PrankKind::ImageHeist
                    }
                )
            })
            .count();
        assert!(started >= 2, "only {started} heists in two minutes");
        assert!(ended >= started - 1);
    }

    #[test]
    fn test_heist_ends_in_place_without_teleporting() {
        let (mut engine, mut rx) = engine();
        engine.set_image_pool(vec![PathBuf::from("cat.png")]);
        engine.run_until(120.0);

        let mut last: Option<(i32, i32)> = None;
        let mut before: Option<(i32, i32)> = None;
        let mut after: Option<(i32, i32)> = None;
        let mut ended = false;
        for ev in drain(&mut rx) {
            match ev {
                Event::AgentMoved { x, y } => {
                    if ended && after.is_none() {
                        after = Some((x, y));
                    } else if !ended {
                        last = Some((x, y));
                    }
                }
                Event::PrankEnded {
                    kind: PrankKind::ImageHeist,
                } if !ended => {
                    ended = true;
                    before = last;
                }
                _ => {}
            }
        }
        let (bx, by) = before.expect("no image heist ended");
        let (ax, ay) = after.expect("no motion after the heist");
        // A release kick, not a jump to a random spot.
        assert!((ax - bx).abs() <= 40, "x jumped from {bx} to {ax}");
        assert!((ay - by).abs() <= 40, "y jumped from {by} to {ay}");
    }

    #[test]
    fn test_heists_never_overlap() {
        let (mut engine, mut rx) = engine();
        engine.set_image_pool(vec![PathBuf::from("cat.png")]);
        engine.run_until(300.0);

        let mut depth = 0i32;
        for ev in drain(&mut rx) {
            match ev {
                Event::PrankStarted { .. } => {
                    depth += 1;
                    assert!(depth <= 1, "two major pranks at once");
                }
                Event::PrankEnded { .. } => depth -= 1,
                _ => {}
            }
        }
    }

    #[test]
    fn test_drag_blocks_pranks_and_stuns() {
        let (mut engine, mut rx) = engine();
        engine.set_image_pool(vec![PathBuf::from("cat.png")]);
        engine.run_until(5.0);
        engine.handle_command(Command::DragStart, 5.0);
        engine.handle_command(Command::DragMove { x: 100, y: 100 }, 5.1);
        drain(&mut rx);

        engine.run_until(40.0);
        // Still held; nothing may start.
        let started = drain(&mut rx)
            .iter()
            .any(|e| matches!(e, Event::PrankStarted { .. }));
        assert!(!started);

        engine.handle_command(Command::DragEnd, 40.0);
        assert!(engine.world.stunned_until > 40.0);
    }

    #[test]
    fn test_two_strong_drags_start_pong() {
        let (mut engine, mut rx) = engine();
        engine.run_until(5.0);

        engine.handle_command(Command::DragStart, 5.0);
        engine.handle_command(Command::DragMove { x: 700, y: 500 }, 5.2);
        engine.handle_command(Command::DragEnd, 5.4);

        engine.handle_command(Command::DragStart, 5.8);
        engine.handle_command(Command::DragMove { x: 100, y: 100 }, 6.0);
        engine.handle_command(Command::DragEnd, 6.2);

        let events = drain(&mut rx);
        let pong = events.iter().any(|e| {
            matches!(
                e,
                Event::PrankStarted {
                    kind: PrankKind::PingPong
                }
            )
        });
        assert!(pong);
        // The rally always has an opponent.
        assert!(engine.clone.is_some());

        // While the session runs the clone sits on the right paddle.
        engine.run_until(7.0);
        drain(&mut rx);
        let clone = engine.clone.as_ref().unwrap();
        assert!((clone.x - (800.0 - 94.0 - 10.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_confirm_close_starts_finale_and_resurrects() {
        let (mut engine, mut rx) = engine();
        engine.run_until(5.0);
        engine.handle_command(Command::CloseRequested, 5.0);
        engine.handle_command(Command::ConfirmClose, 5.5);
        drain(&mut rx);

        // Nobody clicks; the timeout plays the farewell, then the comeback.
        engine.run_until(60.0);
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, Event::FaceRevealed)));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::MessageTyped { text } if text == "warum?")));
        assert!(events.iter().any(|e| matches!(e, Event::Resurrected)));
        assert!(engine.world.scary_mode);
        assert!(engine.finale.is_none());
    }

    #[test]
    fn test_prompt_blocks_pranks() {
        let (mut engine, mut rx) = engine();
        engine.set_image_pool(vec![PathBuf::from("cat.png")]);
        engine.run_until(4.0);
        engine.handle_command(Command::CloseRequested, 4.0);
        drain(&mut rx);
        engine.run_until(40.0);
        let started = drain(&mut rx)
            .iter()
            .any(|e| matches!(e, Event::PrankStarted { .. }));
        assert!(!started);

        engine.handle_command(Command::CancelClose, 40.0);
        assert!(!engine.world.prompt_open);
        assert!(engine.world.confused_until > 40.0);
    }

    #[test]
    fn test_feed_restores_hunger_and_harvests_tokens() {
        let config = Config::new().screen(800, 600).seed(5).hunger(true);
        let (mut engine, mut rx) = {
            let (engine, rx, _handle) = Engine::new(config, NullHost);
            (engine, rx)
        };
        engine.world.hunger = 0.1;
        engine.handle_command(
            Command::Feed {
                bytes: b"delicious data stream".to_vec(),
            },
            1.0,
        );
        assert!((engine.world.hunger - 0.65).abs() < 1e-9);
        assert!(!engine.world.food_tokens.is_empty());
        let fed = drain(&mut rx)
            .iter()
            .any(|e| matches!(e, Event::Notification { .. }));
        assert!(fed);
    }

    #[test]
    fn test_hunger_drains_over_time() {
        let config = Config::new()
            .screen(800, 600)
            .seed(5)
            .hunger(true)
            .hunger_full_s(30.0);
        let (mut engine, _rx, _handle) = Engine::new(config, NullHost);
        engine.run_until(31.0);
        assert!(engine.world.hunger < 0.05);
    }

    #[test]
    fn test_shutdown_command() {
        let (mut engine, _rx) = engine();
        assert!(engine.handle_command(Command::CloseRequested, 1.0));
        assert!(!engine.handle_command(Command::Shutdown, 1.0));
    }
}
