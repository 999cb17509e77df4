//! Command-line front end for the Pesky Block engine.
//!
//! Runs the engine headless with a null host and prints every event it
//! emits. Useful for watching the behavior schedule without a desktop
//! embedder, and for soak-testing prank timing.

use anyhow::Result;
use clap::Parser;
use pesky_block_core::{Command, Config, Engine, Event, NullHost};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "pesky-block",
    about = "Headless runner for the Pesky Block desktop pet engine",
    version
)]
struct Cli {
    /// Pet profile to run (cube, aki, pamuk)
    #[arg(long, default_value = "cube", env = "PESKY_PROFILE")]
    profile: String,

    /// Screen size as WIDTHxHEIGHT
    #[arg(long, default_value = "1920x1080")]
    screen: String,

    /// Keep pranking even while the user is actively typing
    #[arg(long)]
    no_respect_input: bool,

    /// Seconds of idle time before the user counts as away
    #[arg(long, default_value_t = 1.2)]
    active_grace: f64,

    /// Minimum seconds between image heists
    #[arg(long, default_value_t = 10.0)]
    image_min: f64,

    /// Maximum seconds between image heists
    #[arg(long, default_value_t = 22.0)]
    image_max: f64,

    /// Enable the hunger system
    #[arg(long)]
    hunger: bool,

    /// Enable editor mischief mode
    #[arg(long)]
    mischief: bool,

    /// Disable the hidden horror mini-game
    #[arg(long)]
    no_horror_game: bool,

    /// Disable desktop notifications
    #[arg(long)]
    no_notifications: bool,

    /// Enable bounce and alert sounds
    #[arg(long)]
    sound: bool,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
}

impl Cli {
    fn screen_size(&self) -> Result<(i32, i32)> {
        let (w, h) = self
            .screen
            .split_once('x')
            .ok_or_else(|| anyhow::anyhow!("screen must look like 1920x1080"))?;
        Ok((w.trim().parse()?, h.trim().parse()?))
    }

    fn to_config(&self) -> Result<Config> {
        let (w, h) = self.screen_size()?;
        let mut config = Config::new()
            .screen(w, h)
            .profile(&self.profile)
            .respect_input(!self.no_respect_input)
            .active_grace_s(self.active_grace)
            .image_window(self.image_min, self.image_max)
            .hunger(self.hunger)
            .editor_mischief(self.mischief)
            .horror_game(!self.no_horror_game)
            .notifications(!self.no_notifications)
            .sounds(self.sound);
        if let Some(seed) = self.seed {
            config = config.seed(seed);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.to_config()?;
    info!(
        profile = config.profile_id.as_str(),
        screen_w = config.screen_w,
        screen_h = config.screen_h,
        "starting engine"
    );

    let (mut engine, mut events, handle) = Engine::new(config, NullHost);
    let (command_tx, command_rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            // Per-tick movement is too chatty for info.
            match event {
                Event::AgentMoved { .. }
                | Event::CloneMoved { .. }
                | Event::PayloadMoved { .. }
                | Event::RopeUpdated { .. }
                | Event::EnemyMoved { .. }
                | Event::DotsPulse { .. } => debug!(%event, "event"),
                _ => info!(%event, "event"),
            }
        }
    });

    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            let _ = command_tx.send(Command::Shutdown);
            shutdown_handle.cancel();
        }
    });

    engine.run(command_rx).await?;
    Ok(())
}
