//! Group readiness that loads groups on demand.

use bundle_system::{BundleRegistry, GroupLoadedStatus, GroupLoadingStatus};
use pack_sync::GroupReadiness;
use std::sync::Arc;
use tracing::debug;

/// Reports whether a named group is loaded. An idle group that is not fully
/// loaded is asked to load, so a follower polling for a pack's group brings
/// it in instead of waiting out the timeout.
#[derive(Debug, Clone)]
pub struct OnDemandGroups {
    bundles: Arc<BundleRegistry>,
}

impl OnDemandGroups {
    pub fn new(bundles: Arc<BundleRegistry>) -> Self {
        Self { bundles }
    }
}

impl GroupReadiness for OnDemandGroups {
    fn is_group_loaded(&self, group_name: &str) -> bool {
        let Some(group) = self.bundles.group(group_name) else {
            return false;
        };
        if group.loaded_status() == GroupLoadedStatus::Loaded {
            return true;
        }
        if group.loading_status() == GroupLoadingStatus::None {
            debug!("📥 Loading group '{}' for an incoming pack", group.name());
            group.request_load_all();
        }
        false
    }
}
