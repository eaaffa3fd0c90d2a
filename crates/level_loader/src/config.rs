//! Configuration management for the level loader.
//!
//! Settings are read from a TOML file. A missing file is created with the
//! defaults; missing keys in an existing file fall back to their defaults.

use bundle_system::DiscoveryRequest;
use pack_sync::SyncSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

fn default_directories() -> Vec<String> {
    vec!["mods".to_string()]
}
fn default_file_name() -> String {
    "*".to_string()
}
fn default_file_extension() -> String {
    ".pll".to_string()
}
fn default_enable_customs() -> bool {
    true
}
fn default_ack_timeout_ms() -> u64 {
    12_000
}
fn default_ack_poll_interval_ms() -> u64 {
    150
}
fn default_group_ready_timeout_ms() -> u64 {
    10_000
}
fn default_group_ready_poll_interval_ms() -> u64 {
    250
}
fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub loader: LoaderSettings,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Where bundles are found and whether their packs are used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderSettings {
    #[serde(default = "default_directories")]
    pub directories: Vec<String>,
    /// Wildcard pattern for bundle file names
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
    /// When false, discovered packs stay out of the pack collection
    #[serde(default = "default_enable_customs")]
    pub enable_customs: bool,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            directories: default_directories(),
            file_name: default_file_name(),
            file_extension: default_file_extension(),
            enable_customs: default_enable_customs(),
        }
    }
}

/// Pack sync timing in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    #[serde(default = "default_ack_poll_interval_ms")]
    pub ack_poll_interval_ms: u64,
    #[serde(default = "default_group_ready_timeout_ms")]
    pub group_ready_timeout_ms: u64,
    #[serde(default = "default_group_ready_poll_interval_ms")]
    pub group_ready_poll_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: default_ack_timeout_ms(),
            ack_poll_interval_ms: default_ack_poll_interval_ms(),
            group_ready_timeout_ms: default_group_ready_timeout_ms(),
            group_ready_poll_interval_ms: default_group_ready_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file, writing the defaults to `path`
    /// first when it does not exist.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.loader.directories.is_empty() {
            return Err("At least one bundle directory must be configured".to_string());
        }
        if self.loader.directories.iter().any(|d| d.trim().is_empty()) {
            return Err("Bundle directories cannot be empty".to_string());
        }

        let timings = [
            ("ack", self.sync.ack_poll_interval_ms, self.sync.ack_timeout_ms),
            (
                "group_ready",
                self.sync.group_ready_poll_interval_ms,
                self.sync.group_ready_timeout_ms,
            ),
        ];
        for (name, poll, timeout) in timings {
            if poll == 0 {
                return Err(format!("sync.{name}_poll_interval_ms must be greater than 0"));
            }
            if poll > timeout {
                return Err(format!(
                    "sync.{name}_poll_interval_ms ({poll}) cannot exceed sync.{name}_timeout_ms ({timeout})"
                ));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }

    pub fn discovery_request(&self) -> DiscoveryRequest {
        DiscoveryRequest::new(self.loader.directories.iter().map(PathBuf::from).collect())
            .with_file_name(self.loader.file_name.clone())
            .with_extension(self.loader.file_extension.clone())
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            ack_timeout: Duration::from_millis(self.sync.ack_timeout_ms),
            ack_poll_interval: Duration::from_millis(self.sync.ack_poll_interval_ms),
            group_ready_timeout: Duration::from_millis(self.sync.group_ready_timeout_ms),
            group_ready_poll_interval: Duration::from_millis(self.sync.group_ready_poll_interval_ms),
        }
    }
}
