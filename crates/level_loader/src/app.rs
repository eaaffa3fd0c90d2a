//! Application lifecycle: configuration, one discovery pass, pack hand-off
//! to the session, then waiting for shutdown.

use crate::cli::CliArgs;
use crate::config::AppConfig;
use crate::logging::display_banner;
use crate::services::LoaderServices;
use crate::signals::wait_for_shutdown_signal;
use bundle_system::{group_callback, PassReport};
use loader_event_system::EventSystem;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct Application {
    config: AppConfig,
    services: LoaderServices,
    once: bool,
}

/// What one discovery pass and hand-off produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub groups: usize,
    pub mods: usize,
    pub packs: usize,
    /// `None` when there was nothing to broadcast.
    pub peers_confirmed: Option<bool>,
}

impl Application {
    /// Loads configuration (creating a default file if missing), applies CLI
    /// overrides, validates the result and starts the services.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        apply_overrides(&mut config, &args);

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let services = LoaderServices::start(&config, args.simulate_peers.unwrap_or(0));
        Ok(Self {
            config,
            services,
            once: args.once,
        })
    }

    pub fn services(&self) -> &LoaderServices {
        &self.services
    }

    /// Runs one discovery pass, ingests every group into the content
    /// registry, logs the registry dump and hands the resulting packs to the
    /// session.
    pub async fn load_and_sync(&self) -> RunSummary {
        let content = self.services.content.clone();
        let callback = group_callback(move |group| {
            let content = content.clone();
            async move {
                content.ingest_group(&group).await;
                Ok(())
            }
        });

        let report = self
            .services
            .bundles
            .load_all(self.config.discovery_request(), Some(callback))
            .await;
        let groups = match report {
            Some(PassReport {
                discovered,
                loaded,
                failed,
                groups,
                ..
            }) => {
                info!(
                    "📦 {} bundle(s) discovered, {} loaded, {} failed, {} group(s)",
                    discovered,
                    loaded,
                    failed,
                    groups.len()
                );
                groups.len()
            }
            None => {
                warn!(
                    "⚠️ No bundles found in {}",
                    self.config.loader.directories.join(", ")
                );
                0
            }
        };

        for line in self.services.content.dump().lines() {
            info!("{}", line);
        }

        let packs = self.services.content.packs();
        let peers_confirmed = if packs.is_empty() {
            info!("📭 No packs to share with the session");
            None
        } else {
            match self.services.sync.broadcast(&packs, true).await {
                Ok(outcome) if outcome.confirmed => {
                    info!("✅ All peers acknowledged {} pack(s)", packs.len());
                    Some(true)
                }
                Ok(outcome) => {
                    warn!(
                        "⚠️ Not all peers acknowledged the packs ({}/{})",
                        outcome.acknowledged, outcome.expected_acks
                    );
                    Some(false)
                }
                Err(e) => {
                    error!("❌ Pack broadcast failed: {}", e);
                    Some(false)
                }
            }
        };

        RunSummary {
            groups,
            mods: self.services.content.mod_count(),
            packs: packs.len(),
            peers_confirmed,
        }
    }

    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting level loader");
        self.log_configuration_summary();

        let summary = self.load_and_sync().await;
        info!(
            "🗺️ Ready: {} group(s), {} mod(s), {} pack(s)",
            summary.groups, summary.mods, summary.packs
        );

        if !self.once {
            info!("🛑 Press Ctrl+C to shut down");
            wait_for_shutdown_signal().await?;
        }

        self.services.shutdown();
        log_final_statistics(&self.services.events).await;
        info!("✅ Level loader shutdown complete");
        Ok(())
    }

    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  📂 Bundle directories: {}", self.config.loader.directories.join(", "));
        info!(
            "  🔍 File filter: {}{}",
            self.config.loader.file_name, self.config.loader.file_extension
        );
        info!("  🧩 Custom packs enabled: {}", self.config.loader.enable_customs);
        info!(
            "  ⏱️ Ack timeout: {}ms | Group ready timeout: {}ms",
            self.config.sync.ack_timeout_ms, self.config.sync.group_ready_timeout_ms
        );
        info!("  👥 Session members: {}", self.services.session.member_count());
    }
}

fn apply_overrides(config: &mut AppConfig, args: &CliArgs) {
    if !args.directories.is_empty() {
        config.loader.directories = args
            .directories
            .iter()
            .map(|d| d.to_string_lossy().into_owned())
            .collect();
    }
    if let Some(log_level) = &args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
}

async fn log_final_statistics(events: &Arc<EventSystem>) {
    let stats = events.stats().await;
    info!("📊 Final Statistics:");
    info!("  - Events emitted: {}", stats.events_emitted);
    info!("  - Handler deliveries: {}", stats.deliveries);
    info!("  - Handler failures: {}", stats.handler_failures);
    info!("  - Handlers registered: {}", stats.total_handlers);
}
