//! Shared world state and the motion model.
//!
//! One integration step per motion tick: steering adjusts velocity toward a
//! target, the speed cap and friction are applied, then the position
//! advances and optionally reflects off the screen edges. Every behavior in
//! the engine reuses these primitives instead of rolling its own physics.

use crate::config::Config;
use rand::{rngs::SmallRng, Rng, SeedableRng};

/// Energy kept after a screen-edge bounce.
pub const BOUNCE_DAMPING: f64 = 0.95;

/// Per-tick velocity friction.
const FRICTION: f64 = 0.992;

/// Chance per bounce to emit a bounce sound.
pub const BOUNCE_SOUND_CHANCE: f64 = 0.34;

/// Idle jitter magnitude added to each velocity component per tick.
const JITTER: f64 = 0.06;

/// Jitter magnitude while scare mode is active.
const SCARY_JITTER: f64 = 0.8;

/// Wander retarget countdown range, in motion ticks.
const WANDER_TICKS_MIN: u32 = 24;
const WANDER_TICKS_MAX: u32 = 130;

/// Chance per tick to retarget early.
const WANDER_RETARGET_CHANCE: f64 = 0.04;

/// Hunger restored per feeding.
const FEED_AMOUNT: f64 = 0.55;

/// Food token pool bounds. When the pool exceeds the cap it is truncated
/// back to the floor, oldest first.
const TOKEN_CAP: usize = 900;
const TOKEN_FLOOR: usize = 700;

/// How the agent's face currently looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emotion {
    /// Default face.
    Neutral,
    /// Angry face, used while chasing or after being dragged.
    Mad,
    /// Dizzy face, shown right after a drag release.
    Silly,
    /// Confused face, shown after a prank is cancelled on it.
    Confused,
    /// Scare-mode face.
    Scary,
}

impl Emotion {
    /// Stable name used in events.
    pub fn name(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Mad => "mad",
            Emotion::Silly => "silly",
            Emotion::Confused => "confused",
            Emotion::Scary => "scary",
        }
    }
}

/// What happens at the screen edges during an advance step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Reflect off the edges with damping.
    Reflect,
    /// Leave the screen freely, clamped to a generous off-screen margin.
    Free,
}

/// The agent's physical and emotional state.
///
/// Owns the engine's RNG so every random draw in the engine goes through
/// one seeded stream.
#[derive(Debug)]
pub struct WorldState {
    /// Agent position, top-left corner.
    pub x: f64,
    /// Agent position, top-left corner.
    pub y: f64,
    /// Velocity in pixels per tick.
    pub vx: f64,
    /// Velocity in pixels per tick.
    pub vy: f64,

    /// Current wander destination.
    pub wander_x: f64,
    /// Current wander destination.
    pub wander_y: f64,
    /// Motion ticks until the next wander retarget.
    pub wander_ticks: u32,

    /// The user is currently dragging the agent.
    pub dragging: bool,
    /// A modal prompt is open; major pranks must not start.
    pub prompt_open: bool,
    /// Startup grace period is active until `intro_until`.
    pub intro_active: bool,
    /// Engine time at which the intro ends.
    pub intro_until: f64,
    /// Scare mode entered after a resurrection.
    pub scary_mode: bool,

    /// Stunned (no steering) until this engine time.
    pub stunned_until: f64,
    /// Confused face until this engine time.
    pub confused_until: f64,
    /// Angry face until this engine time.
    pub angry_until: f64,
    /// No angry chase may start until this engine time.
    pub angry_catch_cooldown_until: f64,

    /// Hunger level in [0, 1]; 1 is full.
    pub hunger: f64,
    /// Words harvested from fed files, typed back by the editor heist.
    pub food_tokens: Vec<String>,

    /// The engine's RNG.
    pub rng: SmallRng,
}

impl WorldState {
    /// Create world state centered on screen, with the configured seed.
    pub fn new(config: &Config) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let x = f64::from(config.screen_w - config.block_size) / 2.0;
        let y = f64::from(config.screen_h - config.block_size) / 2.0;
        let mut world = Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            wander_x: x,
            wander_y: y,
            wander_ticks: 1,
            dragging: false,
            prompt_open: false,
            intro_active: true,
            intro_until: 0.0,
            scary_mode: false,
            stunned_until: 0.0,
            confused_until: 0.0,
            angry_until: 0.0,
            angry_catch_cooldown_until: 0.0,
            hunger: 1.0,
            food_tokens: Vec::new(),
            rng,
        };
        world.choose_wander_target(config);
        world
    }

    /// Agent center point.
    pub fn center(&self, config: &Config) -> (f64, f64) {
        let half = f64::from(config.block_size) / 2.0;
        (self.x + half, self.y + half)
    }

    /// Accelerate toward a target point.
    pub fn steer_to(&mut self, tx: f64, ty: f64, accel: f64) {
        let dx = tx - self.x;
        let dy = ty - self.y;
        let dist = (dx * dx + dy * dy).sqrt().max(1.0);
        self.vx += dx / dist * accel;
        self.vy += dy / dist * accel;
    }

    /// Add small random jitter to the velocity.
    pub fn jitter(&mut self) {
        let amount = if self.scary_mode { SCARY_JITTER } else { JITTER };
        self.vx += self.rng.gen_range(-amount..=amount);
        self.vy += self.rng.gen_range(-amount..=amount);
    }

    /// Clamp speed to `limit`, then apply friction.
    pub fn clamp_velocity(&mut self, limit: f64) {
        let speed = (self.vx * self.vx + self.vy * self.vy).sqrt();
        if speed > limit && speed > 0.0 {
            let scale = limit / speed;
            self.vx *= scale;
            self.vy *= scale;
        }
        self.vx *= FRICTION;
        self.vy *= FRICTION;
    }

    /// Advance the position by one tick. Returns true if the agent bounced
    /// off a screen edge.
    pub fn advance(&mut self, config: &Config, boundary: Boundary) -> bool {
        self.x += self.vx;
        self.y += self.vy;

        let block = f64::from(config.block_size);
        let max_x = f64::from(config.screen_w) - block;
        let max_y = f64::from(config.screen_h) - block;

        match boundary {
            Boundary::Reflect => {
                let mut bounced = false;
                if self.x < 0.0 {
                    self.x = 0.0;
                    self.vx = self.vx.abs() * BOUNCE_DAMPING;
                    bounced = true;
                } else if self.x > max_x {
                    self.x = max_x;
                    self.vx = -self.vx.abs() * BOUNCE_DAMPING;
                    bounced = true;
                }
                if self.y < 0.0 {
                    self.y = 0.0;
                    self.vy = self.vy.abs() * BOUNCE_DAMPING;
                    bounced = true;
                } else if self.y > max_y {
                    self.y = max_y;
                    self.vy = -self.vy.abs() * BOUNCE_DAMPING;
                    bounced = true;
                }
                bounced
            }
            Boundary::Free => {
                // Generous margin so heists can walk off screen without
                // escaping entirely.
                self.x = self
                    .x
                    .clamp(-block - 150.0, f64::from(config.screen_w) + 150.0);
                self.y = self.y.clamp(-40.0, max_y + 40.0);
                false
            }
        }
    }

    /// Pick a new random wander destination and reset the countdown.
    pub fn choose_wander_target(&mut self, config: &Config) {
        let max_x = (config.screen_w - config.block_size).max(1);
        let max_y = (config.screen_h - config.block_size).max(1);
        self.wander_x = self.rng.gen_range(0..max_x) as f64;
        self.wander_y = self.rng.gen_range(0..max_y) as f64;
        self.wander_ticks = self.rng.gen_range(WANDER_TICKS_MIN..=WANDER_TICKS_MAX);
    }

    /// Advance the wander countdown, retargeting when it expires or on the
    /// small per-tick chance.
    pub fn tick_wander(&mut self, config: &Config) {
        self.wander_ticks = self.wander_ticks.saturating_sub(1);
        if self.wander_ticks == 0 || self.rng.gen_bool(WANDER_RETARGET_CHANCE) {
            self.choose_wander_target(config);
        }
    }

    /// Apply an instantaneous velocity change.
    pub fn kick(&mut self, dvx: f64, dvy: f64) {
        self.vx += dvx;
        self.vy += dvy;
    }

    /// Halve the velocity softly, used when a stun lands.
    pub fn stun_decay(&mut self) {
        self.vx *= 0.7;
        self.vy *= 0.7;
    }

    /// Compute the current emotion from the timed flags.
    pub fn emotion(&self, now: f64) -> Emotion {
        if self.scary_mode {
            Emotion::Scary
        } else if now < self.angry_until {
            Emotion::Mad
        } else if now < self.confused_until {
            Emotion::Confused
        } else if now < self.stunned_until || self.dragging {
            Emotion::Silly
        } else {
            Emotion::Neutral
        }
    }

    /// Restore hunger by one feeding.
    pub fn feed(&mut self) {
        self.hunger = (self.hunger + FEED_AMOUNT).min(1.0);
    }

    /// Harvest typed-back tokens from a fed file's bytes.
    ///
    /// Splits the text on non-alphanumeric runs, keeps words of 2 to 24
    /// characters, caps the harvest at 160 tokens, and shuffles them into
    /// the pool. Binary files that yield nothing fall back to hex chunks.
    pub fn ingest_food(&mut self, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes);
        let mut harvest: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| (2..=24).contains(&w.len()))
            .take(160)
            .map(str::to_string)
            .collect();

        if harvest.is_empty() {
            harvest = bytes
                .chunks(4)
                .take(60)
                .map(|chunk| chunk.iter().map(|b| format!("{b:02x}")).collect())
                .collect();
        }

        for token in harvest {
            let at = self.rng.gen_range(0..=self.food_tokens.len());
            self.food_tokens.insert(at, token);
        }
        if self.food_tokens.len() > TOKEN_CAP {
            self.food_tokens.truncate(TOKEN_FLOOR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config::new().screen(800, 600).seed(42)
    }

    #[test]
    fn test_starts_centered() {
        let config = test_config();
        let world = WorldState::new(&config);
        assert!((world.x - 353.0).abs() < f64::EPSILON);
        assert!((world.y - 253.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clamp_velocity_limits_speed() {
        let config = test_config();
        let mut world = WorldState::new(&config);
        world.vx = 100.0;
        world.vy = 0.0;
        world.clamp_velocity(config.max_speed);
        let speed = (world.vx * world.vx + world.vy * world.vy).sqrt();
        assert!(speed <= config.max_speed);
    }

    #[test]
    fn test_speed_invariant_over_many_ticks() {
        let config = test_config();
        let mut world = WorldState::new(&config);
        for _ in 0..500 {
            world.steer_to(world.wander_x, world.wander_y, 0.35);
            world.jitter();
            world.clamp_velocity(config.max_speed);
            world.advance(&config, Boundary::Reflect);
            world.tick_wander(&config);
            let speed = (world.vx * world.vx + world.vy * world.vy).sqrt();
            assert!(speed <= config.max_speed + 1e-9);
        }
    }

    #[test]
    fn test_bounce_reflects_and_damps() {
        let config = test_config();
        let mut world = WorldState::new(&config);
        world.x = 707.0;
        world.y = 100.0;
        world.vx = 4.0;
        world.vy = 0.0;
        let bounced = world.advance(&config, Boundary::Reflect);
        assert!(bounced);
        assert!((world.x - 706.0).abs() < f64::EPSILON);
        assert!((world.vx - (-4.0 * BOUNCE_DAMPING)).abs() < 1e-9);
    }

    #[test]
    fn test_free_boundary_allows_off_screen() {
        let config = test_config();
        let mut world = WorldState::new(&config);
        world.x = -50.0;
        world.vx = -300.0;
        let bounced = world.advance(&config, Boundary::Free);
        assert!(!bounced);
        assert!(world.x >= -f64::from(config.block_size) - 150.0);
        assert!(world.x < 0.0);
    }

    #[test]
    fn test_emotion_priority() {
        let config = test_config();
        let mut world = WorldState::new(&config);
        assert_eq!(world.emotion(0.0), Emotion::Neutral);

        world.stunned_until = 5.0;
        assert_eq!(world.emotion(1.0), Emotion::Silly);

        world.confused_until = 5.0;
        assert_eq!(world.emotion(1.0), Emotion::Confused);

        world.angry_until = 5.0;
        assert_eq!(world.emotion(1.0), Emotion::Mad);

        world.scary_mode = true;
        assert_eq!(world.emotion(1.0), Emotion::Scary);
    }

    #[test]
    fn test_feed_caps_at_full() {
        let config = test_config();
        let mut world = WorldState::new(&config);
        world.hunger = 0.8;
        world.feed();
        assert!((world.hunger - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ingest_food_splits_words() {
        let config = test_config();
        let mut world = WorldState::new(&config);
        world.ingest_food(b"hello, world! a bb very-long-tokens-are-still-split ok");
        assert!(world.food_tokens.iter().any(|t| t == "hello"));
        assert!(world.food_tokens.iter().any(|t| t == "world"));
        // Single characters are rejected.
        assert!(!world.food_tokens.iter().any(|t| t == "a"));
    }

    #[test]
    fn test_ingest_food_binary_falls_back_to_hex() {
        let config = test_config();
        let mut world = WorldState::new(&config);
        world.ingest_food(&[0x00, 0x01, 0xff, 0xfe, 0x02, 0x03]);
        assert!(!world.food_tokens.is_empty());
        assert!(world.food_tokens[0].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_token_pool_bounded() {
        let config = test_config();
        let mut world = WorldState::new(&config);
        let blob: String = (0..2000).map(|i| format!("word{i} ")).collect();
        for _ in 0..10 {
            world.ingest_food(blob.as_bytes());
        }
        assert!(world.food_tokens.len() <= 900);
    }
}
