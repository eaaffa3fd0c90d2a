//! Groups of bundles that make up one logical content unit.

use crate::backend::BundleContents;
use crate::error::BundleSystemError;
use crate::events::{BundleEvent, GroupEvent, BUNDLE_NAMESPACE, GROUP_NAMESPACE, LOADED, STATUS_CHANGED, UNLOADED};
use crate::handle::{BundleHandle, BundleMode, LoadOutcome, LoadingStatus, UnloadOutcome};
use futures::future::join_all;
use loader_event_system::{EventError, EventSystem};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, error};

static NEXT_GROUP_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupLoadedStatus {
    Unloaded,
    Partial,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupLoadingStatus {
    None,
    Mixed,
    Loading,
    Unloading,
}

/// A fixed set of bundles treated as one unit.
///
/// Members are held weakly: the registry owns the handles, a group only
/// aggregates over them. A member whose handle has been dropped counts as
/// unloaded.
pub struct BundleGroup {
    id: u64,
    name: String,
    members: Vec<Weak<BundleHandle>>,
    events: Arc<EventSystem>,
}

impl std::fmt::Debug for BundleGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleGroup")
            .field("name", &self.name)
            .field("members", &self.members.len())
            .finish()
    }
}

impl BundleGroup {
    pub fn new(members: &[Arc<BundleHandle>], events: Arc<EventSystem>) -> Self {
        Self {
            id: NEXT_GROUP_ID.fetch_add(1, Ordering::Relaxed),
            name: display_name(members),
            members: members.iter().map(Arc::downgrade).collect(),
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Live member handles in group order.
    pub fn members(&self) -> Vec<Arc<BundleHandle>> {
        self.members.iter().filter_map(Weak::upgrade).collect()
    }

    /// Loaded iff every member is loaded, Unloaded iff none is. An empty group
    /// is Loaded.
    pub fn loaded_status(&self) -> GroupLoadedStatus {
        let mut loaded = 0usize;
        let mut unloaded = 0usize;
        for member in &self.members {
            match member.upgrade() {
                Some(handle) if handle.is_loaded() => loaded += 1,
                _ => unloaded += 1,
            }
            if loaded > 0 && unloaded > 0 {
                return GroupLoadedStatus::Partial;
            }
        }
        if unloaded == 0 {
            GroupLoadedStatus::Loaded
        } else {
            GroupLoadedStatus::Unloaded
        }
    }

    /// Mixed only when one member is loading while another is unloading.
    pub fn loading_status(&self) -> GroupLoadingStatus {
        let mut seen = LoadingStatus::None;
        for handle in self.members() {
            match (handle.status(), seen) {
                (LoadingStatus::Loading, LoadingStatus::Unloading)
                | (LoadingStatus::Unloading, LoadingStatus::Loading) => return GroupLoadingStatus::Mixed,
                (LoadingStatus::None, _) => {}
                (status, _) => seen = status,
            }
        }
        match seen {
            LoadingStatus::Loading => GroupLoadingStatus::Loading,
            LoadingStatus::Unloading => GroupLoadingStatus::Unloading,
            LoadingStatus::None => GroupLoadingStatus::None,
        }
    }

    /// Mean member progress in 0-100. An empty group reports 0.
    pub fn progress(&self) -> f32 {
        if self.members.is_empty() {
            return 0.0;
        }
        let total: f32 = self
            .members
            .iter()
            .map(|m| m.upgrade().map(|h| h.progress()).unwrap_or(0.0))
            .sum();
        total / self.members.len() as f32
    }

    /// All declared scene names across members, in member order.
    pub fn scene_names(&self) -> Vec<String> {
        self.members()
            .iter()
            .flat_map(|handle| handle.scene_names())
            .collect()
    }

    pub fn contains_scene(&self, scene: &str) -> bool {
        self.members().iter().any(|handle| handle.contains_scene(scene))
    }

    pub fn contains_file(&self, path: &Path) -> bool {
        self.members().iter().any(|handle| handle.path() == path)
    }

    /// Text assets of loaded standard-mode members as `(asset name, text)`.
    pub fn read_text_assets(&self) -> Vec<(String, String)> {
        let mut texts = Vec::new();
        for handle in self.members() {
            if handle.mode() != BundleMode::Standard {
                continue;
            }
            let Some(contents) = handle.contents() else {
                continue;
            };
            collect_texts(contents.as_ref(), &mut texts);
        }
        texts
    }

    /// Starts loading every member that is not loaded.
    pub fn request_load_all(&self) -> Vec<JoinHandle<LoadOutcome>> {
        self.members()
            .iter()
            .filter(|handle| !handle.is_loaded())
            .map(|handle| handle.request_load())
            .collect()
    }

    /// Starts unloading every loaded member.
    pub fn request_unload_all(&self) -> Vec<JoinHandle<UnloadOutcome>> {
        self.members()
            .iter()
            .filter(|handle| handle.is_loaded())
            .map(|handle| handle.request_unload())
            .collect()
    }

    /// Loads every member and waits for all of them to settle.
    pub async fn load_all(&self) -> GroupLoadedStatus {
        let members = self.members();
        join_all(members.iter().filter(|h| !h.is_loaded()).map(|h| h.load())).await;
        self.loaded_status()
    }

    fn handler_name(&self) -> String {
        format!("bundle_group::{}#{}", self.name, self.id)
    }

    /// Subscribes the group to its members' load and unload events so it
    /// publishes `group:*` events when its aggregate state changes.
    pub async fn attach(self: &Arc<Self>) -> Result<(), BundleSystemError> {
        let handler_name = self.handler_name();
        for event_name in [LOADED, UNLOADED] {
            let group = Arc::downgrade(self);
            self.events
                .on_named(BUNDLE_NAMESPACE, event_name, &handler_name, move |event: BundleEvent| {
                    on_member_changed(&group, &event)
                })
                .await?;
        }
        Ok(())
    }

    /// Removes the subscriptions made by [`BundleGroup::attach`].
    pub async fn detach(&self) {
        let handler_name = self.handler_name();
        for event_name in [LOADED, UNLOADED] {
            self.events.off(BUNDLE_NAMESPACE, event_name, &handler_name).await;
        }
    }

    async fn publish_status(&self) {
        let loaded_status = self.loaded_status();
        let event = GroupEvent {
            group_name: self.name.clone(),
            loaded_status,
            loading_status: self.loading_status(),
        };
        let edge = match loaded_status {
            GroupLoadedStatus::Loaded => LOADED,
            GroupLoadedStatus::Partial | GroupLoadedStatus::Unloaded => UNLOADED,
        };
        for event_name in [edge, STATUS_CHANGED] {
            if let Err(e) = self.events.emit(GROUP_NAMESPACE, event_name, &event).await {
                error!("❌ Failed to publish group:{} for '{}': {}", event_name, self.name, e);
            }
        }
    }
}

fn on_member_changed(group: &Weak<BundleGroup>, event: &BundleEvent) -> Result<(), EventError> {
    let Some(group) = group.upgrade() else {
        return Ok(());
    };
    if !group.contains_file(Path::new(&event.file_path)) {
        return Ok(());
    }
    debug!("🔁 Group '{}' member '{}' changed", group.name, event.bundle_name);
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move { group.publish_status().await });
            Ok(())
        }
        Err(e) => Err(EventError::HandlerExecution(e.to_string())),
    }
}

fn collect_texts(contents: &dyn BundleContents, into: &mut Vec<(String, String)>) {
    for asset in contents.asset_names() {
        if let Some(text) = contents.read_text(&asset) {
            into.push((asset, text));
        }
    }
}

/// The member declaring the most scenes names the group (first one on ties),
/// with trailing dots trimmed and the first letter upper-cased.
pub fn display_name(members: &[Arc<BundleHandle>]) -> String {
    let Some(mut best) = members.first() else {
        return String::new();
    };
    let mut best_count = best.scene_names().len();
    for handle in &members[1..] {
        let count = handle.scene_names().len();
        if count > best_count {
            best = handle;
            best_count = count;
        }
    }

    let trimmed = best.name().trim_end_matches('.');
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
