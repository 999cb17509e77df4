//! The heist state machine.
//!
//! A heist sends the agent off one side of the screen, then drags a payload
//! window (a fake image viewer or a fake editor) back in on a wavy rope. An
//! image heist parks its loot the moment it arrives; an editor heist lingers
//! with it and types. Either way the window stays behind when the heist
//! ends. Stages always advance Exit -> Pull -> Linger; there is no way back.

use crate::config::{Config, DEFAULT_PAYLOAD_GAP, DEFAULT_PAYLOAD_PAD};
use crate::error::{Error, Result};
use crate::event::{Event, EventSender, PrankKind};
use crate::host::{Host, PayloadKind, PayloadSize};
use crate::profile::PetProfile;
use crate::world::{Boundary, WorldState};
use rand::Rng;
use std::path::PathBuf;

/// Off-screen overshoot past the screen edge for the exit point.
const EXIT_MARGIN: f64 = 60.0;

/// The agent counts as gone this far past the edge.
const OFFSCREEN_MARGIN: f64 = 10.0;

/// Steering force and speed cap during the exit sprint.
const EXIT_FORCE: f64 = 0.90;
const EXIT_MAX_SPEED: f64 = 14.0;

/// Agent offset behind the screen edge when the pull starts.
const PULL_START_MARGIN: f64 = 20.0;

/// Candidate images probed before an image heist gives up.
const IMAGE_TRIES: usize = 12;

/// Minimum payload window size.
const PAYLOAD_MIN_W: i32 = 120;
const PAYLOAD_MIN_H: i32 = 50;

/// Pull speed ranges, pixels per motion tick.
const IMAGE_SPEED_MIN: f64 = 8.8;
const IMAGE_SPEED_MAX: f64 = 13.0;
const EDITOR_SPEED_MIN: f64 = 8.0;
const EDITOR_SPEED_MAX: f64 = 11.6;

/// Linger duration range, seconds.
const LINGER_MIN_S: f64 = 2.2;
const LINGER_MAX_S: f64 = 4.0;

/// Typing interval range during the linger stage, seconds.
const TYPE_MIN_S: f64 = 0.08;
const TYPE_MAX_S: f64 = 0.20;

/// Chance to end a typed chunk with a newline.
const NEWLINE_CHANCE: f64 = 0.35;
const NEWLINE_CHANCE_MISCHIEF: f64 = 0.40;

/// Chance that a lingering editor types at all; profiles override this in
/// mischief mode.
const TYPING_CHANCE: f64 = 0.12;

/// Maximum length of a single typed chunk.
const CHUNK_CAP: usize = 140;

/// Number of points in the rope polyline.
const ROPE_POINTS: usize = 9;

/// What the heist is dragging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeistKind {
    /// A stolen image in a frameless viewer.
    Image,
    /// A fake editor that types nonsense.
    Editor,
}

impl HeistKind {
    /// The prank kind reported in events.
    pub fn prank_kind(&self) -> PrankKind {
        match self {
            HeistKind::Image => PrankKind::ImageHeist,
            HeistKind::Editor => PrankKind::EditorHeist,
        }
    }
}

/// Current heist stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeistStage {
    /// Sprinting off screen toward the exit point.
    Exit,
    /// Dragging the payload back on screen.
    Pull,
    /// Holding the payload on screen, typing if it is an editor.
    Linger,
}

/// One running heist.
#[derive(Debug)]
pub struct HeistSession {
    /// What is being dragged.
    pub kind: HeistKind,
    /// Current stage.
    pub stage: HeistStage,
    /// +1 exits left and pulls rightward, -1 exits right and pulls leftward.
    direction: i32,
    payload: PayloadKind,
    payload_size: Option<PayloadSize>,
    exit_x: f64,
    exit_y: f64,
    target_x: f64,
    target_y: f64,
    speed: f64,
    linger_until: f64,
    next_type_at: f64,
    typing_enabled: bool,
    newline_chance: f64,
    rope_phase: f64,
}

impl HeistSession {
    /// Start an image heist.
    ///
    /// Probes up to [`IMAGE_TRIES`] random candidates from the pool,
    /// removing ones that fail so they are not retried next time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoAsset`] when no candidate can be probed.
    pub fn start_image(
        world: &mut WorldState,
        host: &mut dyn Host,
        config: &Config,
        pool: &mut Vec<PathBuf>,
        now: f64,
    ) -> Result<Self> {
        let mut chosen: Option<(PathBuf, PayloadSize)> = None;
        for _ in 0..IMAGE_TRIES {
            if pool.is_empty() {
                break;
            }
            let idx = world.rng.gen_range(0..pool.len());
            match host.probe_image(&pool[idx]) {
                Ok(size) => {
                    chosen = Some((pool[idx].clone(), size));
                    break;
                }
                Err(_) => {
                    pool.swap_remove(idx);
                }
            }
        }
        let (path, size) = chosen.ok_or(Error::NoAsset)?;
        let speed = world.rng.gen_range(IMAGE_SPEED_MIN..=IMAGE_SPEED_MAX);
        Ok(Self::new(
            world,
            config,
            HeistKind::Image,
            PayloadKind::Image { path },
            size,
            speed,
            now,
        ))
    }

    /// Start an editor heist for the given profile.
    pub fn start_editor(
        world: &mut WorldState,
        config: &Config,
        profile: &PetProfile,
        now: f64,
    ) -> Result<Self> {
        let payload = PayloadKind::Editor {
            title: profile.editor_title.to_string(),
            intro: profile.editor_intro.to_string(),
        };
        // Nominal size until the window exists; Pull start replaces it.
        let size = PayloadSize { w: 520, h: 360 };
        let speed = world.rng.gen_range(EDITOR_SPEED_MIN..=EDITOR_SPEED_MAX);
        let mut session = Self::new(world, config, HeistKind::Editor, payload, size, speed, now);
        if config.editor_mischief_enabled {
            session.newline_chance = NEWLINE_CHANCE_MISCHIEF;
        }
        Ok(session)
    }

    fn new(
        world: &mut WorldState,
        config: &Config,
        kind: HeistKind,
        payload: PayloadKind,
        size: PayloadSize,
        speed: f64,
        _now: f64,
    ) -> Self {
        let direction = if world.rng.gen_bool(0.5) { 1 } else { -1 };
        let block = f64::from(config.block_size);
        let exit_x = if direction == 1 {
            -block - EXIT_MARGIN
        } else {
            f64::from(config.screen_w) + EXIT_MARGIN
        };

        let size = PayloadSize {
            w: size.w.max(PAYLOAD_MIN_W),
            h: size.h.max(PAYLOAD_MIN_H),
        };
        let (target_x, target_y) = Self::pull_target(world, config, direction, size);

        Self {
            kind,
            stage: HeistStage::Exit,
            direction,
            payload,
            payload_size: None,
            exit_x,
            exit_y: world.y,
            target_x,
            target_y,
            speed,
            linger_until: 0.0,
            next_type_at: 0.0,
            typing_enabled: false,
            newline_chance: NEWLINE_CHANCE,
            rope_phase: 0.0,
        }
    }

    /// Agent resting position that leaves the payload fully on screen.
    fn pull_target(
        world: &mut WorldState,
        config: &Config,
        direction: i32,
        size: PayloadSize,
    ) -> (f64, f64) {
        let pad = f64::from(DEFAULT_PAYLOAD_PAD);
        let gap = f64::from(DEFAULT_PAYLOAD_GAP);
        let block = f64::from(config.block_size);
        let x = if direction == 1 {
            pad + f64::from(size.w) + gap
        } else {
            f64::from(config.screen_w) - pad - f64::from(size.w) - gap - block
        };
        let y_max = (f64::from(config.screen_h) - f64::from(size.h) - pad).max(pad);
        let y = world.rng.gen_range(pad..=y_max);
        (x, y)
    }

    /// Payload top-left for the current agent position.
    pub fn payload_position(&self, world: &WorldState, config: &Config) -> (i32, i32) {
        let size = self.payload_size.unwrap_or(PayloadSize {
            w: PAYLOAD_MIN_W,
            h: PAYLOAD_MIN_H,
        });
        let gap = f64::from(DEFAULT_PAYLOAD_GAP);
        let x = if self.direction == 1 {
            world.x - gap - f64::from(size.w)
        } else {
            world.x + f64::from(config.block_size) + gap
        };
        let pad = f64::from(DEFAULT_PAYLOAD_PAD);
        let y_max = (f64::from(config.screen_h) - f64::from(size.h) - pad).max(pad);
        let y = world.y.clamp(pad, y_max);
        (x.round() as i32, y.round() as i32)
    }

    /// Whether the payload window currently exists.
    pub fn payload_visible(&self) -> bool {
        self.payload_size.is_some()
    }

    /// Rope polyline from the agent to the payload.
    pub fn rope_points(&self, world: &WorldState, config: &Config, t: f64) -> Vec<(i32, i32)> {
        let (ax, ay) = world.center(config);
        let (px, py) = self.payload_position(world, config);
        let size = self.payload_size.unwrap_or(PayloadSize {
            w: PAYLOAD_MIN_W,
            h: PAYLOAD_MIN_H,
        });
        let bx = f64::from(px) + f64::from(size.w) / 2.0;
        let by = f64::from(py) + f64::from(size.h) / 2.0;

        let dx = bx - ax;
        let dy = by - ay;
        let dist = (dx * dx + dy * dy).sqrt().max(1.0);
        let amp = (2.5 + dist * 0.03).min(22.0);
        // Unit normal to the rope direction.
        let nx = -dy / dist;
        let ny = dx / dist;

        (0..ROPE_POINTS)
            .map(|i| {
                let f = i as f64 / (ROPE_POINTS - 1) as f64;
                let sag = (f * std::f64::consts::PI).sin();
                let wave = (t * 7.0 + self.rope_phase + f * std::f64::consts::TAU).sin();
                let x = ax + dx * f + nx * wave * amp * sag;
                let y = ay + dy * f + ny * wave * amp * sag;
                (x.round() as i32, y.round() as i32)
            })
            .collect()
    }

    /// Advance the heist by one motion tick.
    ///
    /// Returns `true` when the heist finished and the session should be
    /// dropped. The caller applies the release kick afterwards.
    pub fn tick(
        &mut self,
        world: &mut WorldState,
        host: &mut dyn Host,
        config: &Config,
        events: &EventSender,
        now: f64,
    ) -> Result<bool> {
        match self.stage {
            HeistStage::Exit => {
                world.steer_to(self.exit_x, self.exit_y, EXIT_FORCE);
                world.clamp_velocity(EXIT_MAX_SPEED);
                world.advance(config, Boundary::Free);

                let block = f64::from(config.block_size);
                let gone = if self.direction == 1 {
                    world.x <= -block - OFFSCREEN_MARGIN
                } else {
                    world.x >= f64::from(config.screen_w) + OFFSCREEN_MARGIN
                };
                if gone {
                    self.begin_pull(world, host, config, now)?;
                }
                Ok(false)
            }
            HeistStage::Pull => {
                world.vx = 0.0;
                world.vy = 0.0;
                world.x += f64::from(self.direction) * self.speed;
                world.y += world.rng.gen_range(-0.7..=0.7);

                let arrived = if self.direction == 1 {
                    world.x >= self.target_x
                } else {
                    world.x <= self.target_x
                };
                if arrived {
                    world.x = self.target_x;
                    world.y = self.target_y;
                    if self.kind == HeistKind::Image {
                        // The loot is parked; drop the rope and walk away.
                        let (px, py) = self.payload_position(world, config);
                        let _ = events.send(Event::PayloadMoved { x: px, y: py });
                        let _ = events.send(Event::RopeRemoved);
                        return Ok(true);
                    }
                    self.stage = HeistStage::Linger;
                    self.linger_until = now + world.rng.gen_range(LINGER_MIN_S..=LINGER_MAX_S);
                    self.next_type_at = now + world.rng.gen_range(TYPE_MIN_S..=TYPE_MAX_S);
                    let chance = if config.editor_mischief_enabled {
                        config.pet_profile().editor_typing_chance
                    } else {
                        TYPING_CHANCE
                    };
                    self.typing_enabled = world.rng.gen_bool(chance);
                }
                Ok(false)
            }
            HeistStage::Linger => {
                if self.typing_enabled && now >= self.next_type_at {
                    let text = self.typed_chunk(world, config);
                    let _ = events.send(Event::EditorTyped { text });
                    self.next_type_at = now + world.rng.gen_range(TYPE_MIN_S..=TYPE_MAX_S);
                }
                if now >= self.linger_until {
                    // The editor window stays open behind the departing agent.
                    return Ok(true);
                }
                Ok(false)
            }
        }
    }

    /// Create the payload off screen and reposition the agent for the pull.
    fn begin_pull(
        &mut self,
        world: &mut WorldState,
        host: &mut dyn Host,
        config: &Config,
        _now: f64,
    ) -> Result<()> {
        let size = host
            .create_payload(&self.payload)
            .map_err(|err| Error::payload_creation(err.to_string()))?;
        let size = PayloadSize {
            w: size.w.max(PAYLOAD_MIN_W),
            h: size.h.max(PAYLOAD_MIN_H),
        };
        self.payload_size = Some(size);

        // The probed size may differ from the created one; re-aim.
        let pad = f64::from(DEFAULT_PAYLOAD_PAD);
        let gap = f64::from(DEFAULT_PAYLOAD_GAP);
        let block = f64::from(config.block_size);
        self.target_x = if self.direction == 1 {
            pad + f64::from(size.w) + gap
        } else {
            f64::from(config.screen_w) - pad - f64::from(size.w) - gap - block
        };

        world.x = if self.direction == 1 {
            -block - PULL_START_MARGIN
        } else {
            f64::from(config.screen_w) + PULL_START_MARGIN
        };
        world.y = self.target_y;
        world.vx = 0.0;
        world.vy = 0.0;
        self.stage = HeistStage::Pull;
        self.rope_phase = world.rng.gen_range(0.0..std::f64::consts::TAU);
        Ok(())
    }

    /// Pick the next chunk typed into the editor.
    ///
    /// When the hunger system is on and the pet is starving, begging text
    /// takes priority. With mischief on, harvested food tokens are typed
    /// back. A small slice is pure random noise, the rest comes from the
    /// profile's chunk pool.
    fn typed_chunk(&mut self, world: &mut WorldState, config: &Config) -> String {
        let profile = config.pet_profile();
        let mut text = if config.hunger_enabled && world.hunger <= 0.22 && world.rng.gen_bool(0.55)
        {
            format!("{} hat hunger. fuetter mich. ", profile.name)
        } else if config.editor_mischief_enabled
            && !world.food_tokens.is_empty()
            && world.rng.gen_bool(0.55)
        {
            let idx = world.rng.gen_range(0..world.food_tokens.len());
            format!("{} ", world.food_tokens[idx])
        } else if world.rng.gen_bool(0.14) {
            let len = world.rng.gen_range(3..=9);
            let mut s: String = (0..len)
                .map(|_| {
                    let c = world.rng.gen_range(b'a'..=b'z');
                    c as char
                })
                .collect();
            s.push(' ');
            s
        } else {
            let idx = world.rng.gen_range(0..profile.editor_chunks.len());
            profile.editor_chunks[idx].to_string()
        };

        text.truncate(CHUNK_CAP);
        if world.rng.gen_bool(self.newline_chance) {
            text.push('\n');
        }
        text
    }

    /// Tear down the payload and rope.
    pub fn stop(&mut self, host: &mut dyn Host, events: &EventSender) -> Result<()> {
        if self.payload_size.take().is_some() {
            host.destroy_payload()?;
            let _ = events.send(Event::PayloadClosed);
            let _ = events.send(Event::RopeRemoved);
        }
        Ok(())
    }
}
