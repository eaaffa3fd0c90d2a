//! Command-line interface for the level loader.
//!
//! Every option overrides the matching configuration file setting.

use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "loader.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Bundle directories replacing the configured ones
    pub directories: Vec<PathBuf>,
    pub log_level: Option<String>,
    pub json_logs: bool,
    /// Follower peers to simulate in the in-process session
    pub simulate_peers: Option<usize>,
    /// Exit after the first discovery pass instead of waiting for a signal
    pub once: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            directories: Vec::new(),
            log_level: None,
            json_logs: false,
            simulate_peers: None,
            once: false,
        }
    }
}

fn command() -> Command {
    Command::new("Level Loader")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Discovers level bundles, registers their content and syncs packs across a session")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("dir")
                .short('d')
                .long("dir")
                .value_name("DIR")
                .help("Bundle directory to scan (repeatable)")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("simulate-peers")
                .long("simulate-peers")
                .value_name("N")
                .help("Number of follower peers to run in-process")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("Exit after the first discovery pass")
                .action(clap::ArgAction::SetTrue),
        )
}

impl CliArgs {
    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            directories: matches
                .get_many::<String>("dir")
                .map(|dirs| dirs.map(PathBuf::from).collect())
                .unwrap_or_default(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            simulate_peers: matches.get_one::<usize>("simulate-peers").copied(),
            once: matches.get_flag("once"),
        }
    }
}
