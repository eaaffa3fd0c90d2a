//! Event keys and payloads published by the bundle system.

use serde::{Deserialize, Serialize};

pub const BUNDLE_NAMESPACE: &str = "bundle";
pub const GROUP_NAMESPACE: &str = "group";
pub const REGISTRY_NAMESPACE: &str = "registry";

pub const LOADED: &str = "loaded";
pub const UNLOADED: &str = "unloaded";
pub const STATUS_CHANGED: &str = "status_changed";
pub const BEFORE_PROCESS: &str = "before_process";
pub const GROUPS_READY: &str = "groups_ready";

/// A single bundle finished loading or unloading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleEvent {
    pub bundle_name: String,
    pub file_path: String,
    pub loaded: bool,
    pub adopted: bool,
}

/// Aggregate state of a group after one of its members changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupEvent {
    pub group_name: String,
    pub loaded_status: crate::group::GroupLoadedStatus,
    pub loading_status: crate::group::GroupLoadingStatus,
}

/// A discovery pass found files and is about to load them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassStartedEvent {
    pub pass: u64,
    pub bundle_count: usize,
}

/// A discovery pass finished grouping. Published once per pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupsReadyEvent {
    pub pass: u64,
    pub group_names: Vec<String>,
    pub loaded_bundles: usize,
    pub failed_bundles: usize,
}
