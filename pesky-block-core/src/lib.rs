//! Core behavior engine for the Pesky Block desktop prank pet.
//!
//! The engine is headless: it owns the motion model, the prank state
//! machines, and a cooperative timer queue, and tells the embedder what to
//! draw through an event channel. The embedder supplies platform access
//! through the [`host::Host`] trait and feeds user input back in as
//! [`engine::Command`]s.
//!
//! # Example
//!
//! ```no_run
//! use pesky_block_core::{Config, Engine, NullHost};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new().screen(1920, 1080).profile("cube");
//!     let (mut engine, mut events, handle) = Engine::new(config, NullHost);
//!     let (_commands, command_rx) = tokio::sync::mpsc::unbounded_channel();
//!
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             println!("{event}");
//!         }
//!     });
//!
//!     engine.run(command_rx).await?;
//!     handle.cancel();
//!     Ok(())
//! }
//! ```

pub mod arbiter;
pub mod clone;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod finale;
pub mod heist;
pub mod host;
pub mod pointer;
pub mod profile;
pub mod scheduler;
pub mod world;

pub use config::{Config, Settings};
pub use engine::{Command, Engine, EngineHandle};
pub use error::{Error, Result};
pub use event::{Event, EventReceiver, EventSender, PrankKind};
pub use host::{AssetScanner, Host, NullHost, PayloadKind, PayloadSize, Rect, WindowInfo};
pub use profile::{PetProfile, PROFILES};
pub use world::{Emotion, WorldState};
