//! Events published by the content registry.

use serde::{Deserialize, Serialize};

pub const CONTENT_NAMESPACE: &str = "content";
pub const MOD_REGISTERED: &str = "mod_registered";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModRegisteredEvent {
    pub mod_name: String,
    pub group_name: String,
    pub content_count: usize,
    pub pack_count: usize,
    pub tag_names: Vec<String>,
}
