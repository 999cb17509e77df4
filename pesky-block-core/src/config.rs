//! Configuration for the Pesky Block engine.
//!
//! This module provides the `Config` struct with a builder pattern for all
//! runtime tuning, plus the small `Settings` document that is persisted
//! between runs (profile id, feature toggles, hunger level).
//!
//! Several values here are empirically tuned and intentionally preserved as
//! named constants rather than re-derived.

use crate::error::{Error, Result};
use crate::profile::PetProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default screen width used when the embedder doesn't report one.
const DEFAULT_SCREEN_W: i32 = 1920;

/// Default screen height used when the embedder doesn't report one.
const DEFAULT_SCREEN_H: i32 = 1080;

/// Side length of the square agent window, in pixels.
pub const DEFAULT_BLOCK_SIZE: i32 = 94;

/// Baseline speed limit for idle wandering.
pub const DEFAULT_MAX_SPEED: f64 = 6.2;

/// Velocity boost applied when fleeing the pointer.
pub const DEFAULT_ESCAPE_BOOST: f64 = 3.2;

/// Distance (pixels, center to cursor) at which an angry chase turns into a
/// catch. Tuned empirically.
pub const DEFAULT_ANGRY_CATCH_RADIUS: f64 = 22.0;

/// "Recently active" threshold for the idle source, in seconds.
const DEFAULT_ACTIVE_GRACE_S: f64 = 1.2;

/// Minimum idle seconds before an image heist may start.
const DEFAULT_IMAGE_IDLE_S: f64 = 0.05;

/// Image heist reschedule window, in seconds.
const DEFAULT_IMAGE_MIN_S: f64 = 10.0;
const DEFAULT_IMAGE_MAX_S: f64 = 22.0;

/// Seconds to drain the hunger bar from full to empty.
const DEFAULT_HUNGER_FULL_S: f64 = 900.0;

/// Gap in pixels between the agent and the dragged payload.
pub const DEFAULT_PAYLOAD_GAP: i32 = 18;

/// Screen-edge padding kept around the payload while it is visible.
pub const DEFAULT_PAYLOAD_PAD: i32 = 10;

/// Maximum number of candidate image paths kept in the pool.
const DEFAULT_SCAN_LIMIT: usize = 350;

/// Duration of the startup grace period, in seconds.
pub const DEFAULT_INTRO_S: f64 = 2.9;

/// Configuration for the Pesky Block engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Screen width in pixels.
    pub screen_w: i32,

    /// Screen height in pixels.
    pub screen_h: i32,

    /// Side length of the square agent.
    pub block_size: i32,

    /// Baseline speed limit for idle wandering.
    pub max_speed: f64,

    /// Velocity boost applied when fleeing the pointer.
    pub escape_boost: f64,

    /// Catch radius for the angry chase.
    pub angry_catch_radius: f64,

    /// Whether disruptive pranks are suppressed while the user is active.
    pub respect_input: bool,

    /// "Recently active" idle threshold in seconds.
    pub active_grace_s: f64,

    /// Whether bounce/alert sound events are emitted.
    pub sounds_enabled: bool,

    /// Whether notification events are emitted.
    pub notifications_enabled: bool,

    /// Whether the hidden horror mini-game can be entered.
    pub horror_game_enabled: bool,

    /// Minimum idle seconds before an image heist may start.
    pub image_idle_s: f64,

    /// Lower bound of the image heist reschedule window.
    pub image_min_s: f64,

    /// Upper bound of the image heist reschedule window.
    pub image_max_s: f64,

    /// Whether the hunger bar drains and feeding matters.
    pub hunger_enabled: bool,

    /// Seconds to drain hunger from full to empty.
    pub hunger_full_s: f64,

    /// Whether the prank editor types more aggressively.
    pub editor_mischief_enabled: bool,

    /// Selected pet profile id.
    pub profile_id: String,

    /// Maximum number of candidate image paths kept in the pool.
    pub scan_limit: usize,

    /// RNG seed for deterministic runs. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            screen_w: DEFAULT_SCREEN_W,
            screen_h: DEFAULT_SCREEN_H,
            block_size: DEFAULT_BLOCK_SIZE,
            max_speed: DEFAULT_MAX_SPEED,
            escape_boost: DEFAULT_ESCAPE_BOOST,
            angry_catch_radius: DEFAULT_ANGRY_CATCH_RADIUS,
            respect_input: true,
            active_grace_s: DEFAULT_ACTIVE_GRACE_S,
            sounds_enabled: false,
            notifications_enabled: true,
            horror_game_enabled: true,
            image_idle_s: DEFAULT_IMAGE_IDLE_S,
            image_min_s: DEFAULT_IMAGE_MIN_S,
            image_max_s: DEFAULT_IMAGE_MAX_S,
            hunger_enabled: false,
            hunger_full_s: DEFAULT_HUNGER_FULL_S,
            editor_mischief_enabled: false,
            profile_id: "cube".to_string(),
            scan_limit: DEFAULT_SCAN_LIMIT,
            seed: None,
        }
    }
}

impl Config {
    /// Create a new Config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the screen dimensions.
    pub fn screen(mut self, w: i32, h: i32) -> Self {
        self.screen_w = w.max(1);
        self.screen_h = h.max(1);
        self
    }

    /// Set the agent's block size.
    pub fn block_size(mut self, size: i32) -> Self {
        self.block_size = size.max(8);
        self
    }

    /// Enable or disable suppressing pranks while the user is active.
    pub fn respect_input(mut self, enabled: bool) -> Self {
        self.respect_input = enabled;
        self
    }

    /// Set the "recently active" idle threshold in seconds.
    pub fn active_grace_s(mut self, secs: f64) -> Self {
        self.active_grace_s = secs.max(0.0);
        self
    }

    /// Enable or disable sound events.
    pub fn sounds(mut self, enabled: bool) -> Self {
        self.sounds_enabled = enabled;
        self
    }

    /// Enable or disable notification events.
    pub fn notifications(mut self, enabled: bool) -> Self {
        self.notifications_enabled = enabled;
        self
    }

    /// Enable or disable the hidden horror mini-game.
    pub fn horror_game(mut self, enabled: bool) -> Self {
        self.horror_game_enabled = enabled;
        self
    }

    /// Set the image heist scheduling window.
    ///
    /// The lower bound is clamped to 2 seconds and the upper bound is raised
    /// to at least the lower bound.
    pub fn image_window(mut self, min_s: f64, max_s: f64) -> Self {
        self.image_min_s = min_s.max(2.0);
        self.image_max_s = max_s.max(self.image_min_s);
        self
    }

    /// Set the minimum idle seconds before an image heist may start.
    pub fn image_idle_s(mut self, secs: f64) -> Self {
        self.image_idle_s = secs.max(0.0);
        self
    }

    /// Enable or disable the hunger system.
    pub fn hunger(mut self, enabled: bool) -> Self {
        self.hunger_enabled = enabled;
        self
    }

    /// Set the full-to-empty hunger drain time (clamped to >= 30 s).
    pub fn hunger_full_s(mut self, secs: f64) -> Self {
        self.hunger_full_s = secs.max(30.0);
        self
    }

    /// Enable or disable editor mischief mode.
    pub fn editor_mischief(mut self, enabled: bool) -> Self {
        self.editor_mischief_enabled = enabled;
        self
    }

    /// Select a pet profile. Unknown ids normalize to `cube`.
    pub fn profile(mut self, id: impl AsRef<str>) -> Self {
        self.profile_id = PetProfile::normalize_id(id.as_ref()).to_string();
        self
    }

    /// Set the candidate image pool size limit.
    pub fn scan_limit(mut self, limit: usize) -> Self {
        self.scan_limit = limit;
        self
    }

    /// Set an RNG seed for deterministic runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Resolve the configured pet profile.
    pub fn pet_profile(&self) -> &'static PetProfile {
        PetProfile::by_id(&self.profile_id)
    }

    /// Apply persisted settings on top of this config.
    pub fn apply_settings(mut self, settings: &Settings) -> Self {
        self.profile_id = PetProfile::normalize_id(&settings.profile_id).to_string();
        self.hunger_enabled = settings.hunger_enabled;
        self.editor_mischief_enabled = settings.editor_mischief_enabled;
        self
    }
}

/// The persisted settings document.
///
/// Only the user-visible choices survive a restart; everything else in
/// `Config` is runtime tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Document version for forward compatibility.
    pub version: u32,

    /// Selected pet profile id.
    pub profile_id: String,

    /// Whether the hunger bar is shown and drains.
    pub hunger_enabled: bool,

    /// Whether the prank editor types more aggressively.
    pub editor_mischief_enabled: bool,

    /// Last persisted hunger level in [0, 1].
    pub hunger: f64,

    /// When the settings were last written.
    pub saved_at: Option<DateTime<Utc>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 1,
            profile_id: "cube".to_string(),
            hunger_enabled: false,
            editor_mischief_enabled: false,
            hunger: 1.0,
            saved_at: None,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::SettingsRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Settings =
            serde_json::from_str(&content).map_err(|source| Error::SettingsParse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.hunger = settings.hunger.clamp(0.0, 1.0);
        settings.profile_id = PetProfile::normalize_id(&settings.profile_id).to_string();
        Ok(settings)
    }

    /// Save settings to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut doc = self.clone();
        doc.saved_at = Some(Utc::now());
        let content = serde_json::to_string_pretty(&doc).map_err(|source| Error::SettingsParse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, content).map_err(|source| Error::SettingsWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}
