//! Error types for the Pesky Block behavior engine.
//!
//! The engine treats every collaborator failure the same way: the current
//! attempt is skipped and rescheduled. The variants below exist so callers
//! and logs can still tell *what* was unavailable, but nothing in the core
//! branches on the specific cause beyond "capability missing" vs "asset
//! missing".

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for pesky-block-core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An external capability (cursor control, foreground window query,
    /// payload window creation) is unavailable right now.
    #[error("capability unavailable: {capability}")]
    Capability {
        /// Short name of the missing capability.
        capability: &'static str,
    },

    /// No eligible asset could be found or loaded for a heist attempt.
    #[error("no eligible asset for heist")]
    NoAsset,

    /// A payload window could not be created.
    #[error("payload creation failed: {message}")]
    PayloadCreation {
        /// Description of what went wrong.
        message: String,
    },

    /// A prank start was refused because another major prank is active or
    /// the arbiter forbids starting one right now.
    #[error("prank refused")]
    PrankRefused,

    /// Failed to read the persisted settings file.
    #[error("failed to read settings '{path}': {source}")]
    SettingsRead {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the persisted settings file.
    #[error("failed to parse settings '{path}': {source}")]
    SettingsParse {
        /// The path containing invalid JSON.
        path: PathBuf,
        /// The underlying JSON parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to write the persisted settings file.
    #[error("failed to write settings '{path}': {source}")]
    SettingsWrite {
        /// The path that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An error that doesn't fit other categories.
    #[error("{message}")]
    Other {
        /// Description of the error.
        message: String,
    },
}

impl Error {
    /// Create a new `Capability` error for the given capability name.
    pub fn capability(capability: &'static str) -> Self {
        Self::Capability { capability }
    }

    /// Create a new `PayloadCreation` error with the given message.
    pub fn payload_creation(message: impl Into<String>) -> Self {
        Self::PayloadCreation {
            message: message.into(),
        }
    }

    /// Create a new `Other` error with the given message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

/// A specialized `Result` type for pesky-block-core operations.
pub type Result<T> = std::result::Result<T, Error>;
