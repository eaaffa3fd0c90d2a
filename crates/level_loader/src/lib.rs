//! # Level Loader
//!
//! Discovers level bundles on disk, groups them, registers the content their
//! mod manifests declare and shares the resulting level packs with every
//! member of the session.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with the default configuration (loader.toml, created if missing)
//! level_loader
//!
//! # Scan specific directories and exit after one pass
//! level_loader --dir mods --dir workshop --once
//!
//! # Exercise pack sync against three in-process followers
//! level_loader --simulate-peers 3 --log-level debug
//! ```
//!
//! ## Signal Handling
//!
//! Without `--once` the loader keeps its session open until SIGINT or
//! SIGTERM arrives.

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod readiness;
mod services;
mod signals;

/// Parses the command line, sets up logging and runs the application until
/// it finishes or is signalled. Startup and runtime failures exit the
/// process with status 1.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Logging settings come from the file before the application validates it.
    let mut config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

pub use app::{Application, RunSummary};
pub use cli::{CliArgs, DEFAULT_CONFIG_PATH};
pub use config::{AppConfig, LoaderSettings, LoggingSettings, SyncConfig};
pub use readiness::OnDemandGroups;
pub use services::{Follower, LoaderServices};
