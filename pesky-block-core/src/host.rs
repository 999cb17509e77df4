//! The host abstraction.
//!
//! Everything the engine needs from the operating system goes through the
//! [`Host`] trait: idle time, cursor position and control, the foreground
//! window, and creating the payload windows it drags around. Every method
//! returns a `Result`; any error means "this capability is unavailable
//! right now" and the engine skips or reschedules the affected behavior.

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Idle value reported when the idle source is unavailable.
///
/// High enough that every idle threshold in the engine passes, so a host
/// without an idle source behaves as if the user is always away.
pub const IDLE_SENTINEL_S: f64 = 9999.0;

/// A screen-space rectangle (left, top, width, height).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub w: i32,
    /// Height in pixels.
    pub h: i32,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Right edge.
    pub fn right(&self) -> i32 {
        self.x + self.w
    }
}

/// Information about the current foreground window.
#[derive(Debug, Clone)]
pub struct WindowInfo {
    /// Window title.
    pub title: String,
    /// Lowercased executable name of the owning process, if known.
    pub process: Option<String>,
    /// Window rectangle.
    pub rect: Rect,
}

/// Size of a created payload window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSize {
    /// Width in pixels.
    pub w: i32,
    /// Height in pixels.
    pub h: i32,
}

/// What kind of payload window a heist wants.
#[derive(Debug, Clone)]
pub enum PayloadKind {
    /// A frameless viewer showing the image at `path`.
    Image {
        /// Path of the image to display.
        path: PathBuf,
    },
    /// A fake plain-text editor window.
    Editor {
        /// Window title.
        title: String,
        /// Text inserted when the window opens.
        intro: String,
    },
}

/// Platform services the engine depends on.
///
/// All methods are synchronous and cheap; implementations that need real
/// OS calls should cache aggressively. Errors are never fatal.
pub trait Host {
    /// Seconds since the last keyboard or mouse input.
    fn idle_seconds(&mut self) -> Result<f64>;

    /// Current cursor position.
    fn cursor_pos(&mut self) -> Result<(i32, i32)>;

    /// Move the cursor to the given position.
    fn set_cursor_pos(&mut self, x: i32, y: i32) -> Result<()>;

    /// Synthesize a left click at the given position.
    fn synthesize_click(&mut self, x: i32, y: i32) -> Result<()>;

    /// The current foreground window, if any.
    fn foreground_window(&mut self) -> Result<Option<WindowInfo>>;

    /// Probe a candidate image and report the size its viewer would take,
    /// already scaled for dragging.
    fn probe_image(&mut self, path: &std::path::Path) -> Result<PayloadSize>;

    /// Create the single payload window and return its size.
    fn create_payload(&mut self, kind: &PayloadKind) -> Result<PayloadSize>;

    /// Destroy the payload window if one exists.
    fn destroy_payload(&mut self) -> Result<()>;
}

/// Scans the filesystem for candidate images to steal.
///
/// Runs on a blocking thread at startup; the result is handed to the
/// engine once via a oneshot channel.
pub trait AssetScanner: Send + Sync {
    /// Collect up to `limit` candidate image paths.
    fn scan(&self, limit: usize) -> Vec<PathBuf>;
}

/// A host with no platform capabilities.
///
/// Pointer and window queries fail, payload creation succeeds with nominal
/// sizes. Useful for the CLI dry-run mode and as a base for tests.
#[derive(Debug, Default)]
pub struct NullHost;

impl Host for NullHost {
    fn idle_seconds(&mut self) -> Result<f64> {
        Ok(IDLE_SENTINEL_S)
    }

    fn cursor_pos(&mut self) -> Result<(i32, i32)> {
        Err(Error::capability("cursor"))
    }

    fn set_cursor_pos(&mut self, _x: i32, _y: i32) -> Result<()> {
        Err(Error::capability("cursor"))
    }

    fn synthesize_click(&mut self, _x: i32, _y: i32) -> Result<()> {
        Err(Error::capability("click"))
    }

    fn foreground_window(&mut self) -> Result<Option<WindowInfo>> {
        Ok(None)
    }

    fn probe_image(&mut self, _path: &std::path::Path) -> Result<PayloadSize> {
        Ok(PayloadSize { w: 320, h: 240 })
    }

    fn create_payload(&mut self, kind: &PayloadKind) -> Result<PayloadSize> {
        match kind {
            PayloadKind::Image { .. } => Ok(PayloadSize { w: 320, h: 240 }),
            PayloadKind::Editor { .. } => Ok(PayloadSize { w: 520, h: 360 }),
        }
    }

    fn destroy_payload(&mut self) -> Result<()> {
        Ok(())
    }
}
