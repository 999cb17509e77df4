//! The clone.
//!
//! At most one short-lived copy of the agent bounces around on its own.
//! It has no behaviors, no pointer access, and no payload; it exists to
//! make the user doubt which block is the real one.

use crate::config::Config;
use crate::world::{WorldState, BOUNCE_DAMPING};
use rand::Rng;

/// Spawn offset from the agent, pixels.
const SPAWN_SPREAD_X: f64 = 140.0;
const SPAWN_SPREAD_Y: f64 = 120.0;

/// Initial speed range, pixels per tick.
const SPEED_MIN: f64 = 3.0;
const SPEED_MAX: f64 = 6.5;

/// Lifetime range, seconds.
const LIFETIME_MIN_S: f64 = 10.0;
const LIFETIME_MAX_S: f64 = 22.0;

/// Per-tick chance of a small random nudge.
const NUDGE_CHANCE: f64 = 0.05;
const NUDGE: f64 = 1.8;

/// A live clone.
#[derive(Debug, Clone)]
pub struct CloneState {
    /// Position, top-left corner.
    pub x: f64,
    /// Position, top-left corner.
    pub y: f64,
    vx: f64,
    vy: f64,
    /// Engine time at which the clone despawns.
    pub expires_at: f64,
}

impl CloneState {
    /// Spawn a clone near the agent with a random heading.
    pub fn spawn(world: &mut WorldState, config: &Config, now: f64) -> Self {
        let block = f64::from(config.block_size);
        let max_x = f64::from(config.screen_w) - block;
        let max_y = f64::from(config.screen_h) - block;

        let x = (world.x + world.rng.gen_range(-SPAWN_SPREAD_X..=SPAWN_SPREAD_X)).clamp(0.0, max_x);
        let y = (world.y + world.rng.gen_range(-SPAWN_SPREAD_Y..=SPAWN_SPREAD_Y)).clamp(0.0, max_y);

        let speed = world.rng.gen_range(SPEED_MIN..=SPEED_MAX);
        let angle = world.rng.gen_range(0.0..std::f64::consts::TAU);
        let lifetime = world.rng.gen_range(LIFETIME_MIN_S..=LIFETIME_MAX_S);

        Self {
            x,
            y,
            vx: speed * angle.cos(),
            vy: speed * angle.sin(),
            expires_at: now + lifetime,
        }
    }

    /// Apply an instantaneous velocity change.
    pub fn kick(&mut self, dvx: f64, dvy: f64) {
        self.vx += dvx;
        self.vy += dvy;
    }

    /// Keep the clone alive until at least `until`.
    pub fn extend(&mut self, until: f64) {
        if until > self.expires_at {
            self.expires_at = until;
        }
    }

    /// One motion tick. Returns `(expired, bounced)`.
    pub fn tick(&mut self, world: &mut WorldState, config: &Config, now: f64) -> (bool, bool) {
        if now >= self.expires_at {
            return (true, false);
        }

        if world.rng.gen_bool(NUDGE_CHANCE) {
            self.vx += world.rng.gen_range(-NUDGE..=NUDGE);
            self.vy += world.rng.gen_range(-NUDGE..=NUDGE);
        }

        self.x += self.vx;
        self.y += self.vy;

        let block = f64::from(config.block_size);
        let max_x = f64::from(config.screen_w) - block;
        let max_y = f64::from(config.screen_h) - block;

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

        (false, bounced)
    }
}
