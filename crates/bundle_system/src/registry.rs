//! Discovery passes: find bundle files, load them, group them, hand the
//! groups to whoever asked, and release the bundles again.

use crate::backend::BundleBackend;
use crate::discovery::{canonical_path, discover_bundle_files, DiscoveryRequest};
use crate::error::BundleSystemError;
use crate::events::{GroupsReadyEvent, PassStartedEvent, BEFORE_PROCESS, GROUPS_READY, REGISTRY_NAMESPACE};
use crate::group::{BundleGroup, GroupLoadedStatus};
use crate::grouping::partition_by_scenes;
use crate::handle::{BundleHandle, UnloadAnimation};
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use loader_event_system::{panic_message, EventSystem};
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

/// Invoked once per matching group when a pass completes.
pub type GroupCallback =
    Arc<dyn Fn(Arc<BundleGroup>) -> BoxFuture<'static, Result<(), BundleSystemError>> + Send + Sync>;

/// Wraps an async closure as a [`GroupCallback`].
pub fn group_callback<F, Fut>(callback: F) -> GroupCallback
where
    F: Fn(Arc<BundleGroup>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), BundleSystemError>> + Send + 'static,
{
    Arc::new(move |group| callback(group).boxed())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CallbackKey {
    directory: String,
    filter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModProcessingStatus {
    Inactive,
    Loading,
    Complete,
}

/// Summary of one completed discovery pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub pass: u64,
    pub discovered: usize,
    pub loaded: usize,
    pub failed: usize,
    pub groups: Vec<Arc<BundleGroup>>,
}

struct PassState {
    status: ModProcessingStatus,
    finalised: bool,
}

/// Owns every bundle handle and the groups built from them.
pub struct BundleRegistry {
    backend: Arc<dyn BundleBackend>,
    events: Arc<EventSystem>,
    animation: UnloadAnimation,
    allow_loading: AtomicBool,
    passes: AtomicU64,
    handles: RwLock<Vec<Arc<BundleHandle>>>,
    groups: RwLock<Vec<Arc<BundleGroup>>>,
    callbacks: DashMap<CallbackKey, Vec<GroupCallback>>,
    pass_state: Mutex<PassState>,
}

impl std::fmt::Debug for BundleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleRegistry")
            .field("allow_loading", &self.allow_loading.load(Ordering::SeqCst))
            .field("handles", &self.handles().len())
            .field("groups", &self.groups().len())
            .finish()
    }
}

impl BundleRegistry {
    pub fn new(backend: Arc<dyn BundleBackend>, events: Arc<EventSystem>) -> Self {
        Self::with_animation(backend, events, UnloadAnimation::default())
    }

    pub fn with_animation(backend: Arc<dyn BundleBackend>, events: Arc<EventSystem>, animation: UnloadAnimation) -> Self {
        Self {
            backend,
            events,
            animation,
            allow_loading: AtomicBool::new(true),
            passes: AtomicU64::new(0),
            handles: RwLock::new(Vec::new()),
            groups: RwLock::new(Vec::new()),
            callbacks: DashMap::new(),
            pass_state: Mutex::new(PassState {
                status: ModProcessingStatus::Inactive,
                finalised: false,
            }),
        }
    }

    pub fn events(&self) -> &Arc<EventSystem> {
        &self.events
    }

    /// Whether a new pass may start.
    pub fn is_loading_allowed(&self) -> bool {
        self.allow_loading.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> ModProcessingStatus {
        self.pass_state.lock().unwrap_or_else(PoisonError::into_inner).status
    }

    /// Set once a pass has finished handing its groups out.
    pub fn has_finalised(&self) -> bool {
        self.pass_state.lock().unwrap_or_else(PoisonError::into_inner).finalised
    }

    pub fn handles(&self) -> Vec<Arc<BundleHandle>> {
        self.handles.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn groups(&self) -> Vec<Arc<BundleGroup>> {
        self.groups.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Group by display name, case-insensitive.
    pub fn group(&self, name: &str) -> Option<Arc<BundleGroup>> {
        self.groups().into_iter().find(|g| g.name().eq_ignore_ascii_case(name))
    }

    pub fn is_group_loaded(&self, name: &str) -> bool {
        self.group(name)
            .map(|g| g.loaded_status() == GroupLoadedStatus::Loaded)
            .unwrap_or(false)
    }

    /// Starts a discovery pass in the background. Returns false, doing
    /// nothing, when another pass is running or no files match.
    pub fn request_load_all(self: &Arc<Self>, request: DiscoveryRequest, callback: Option<GroupCallback>) -> bool {
        let Some(files) = self.begin_pass(&request, callback) else {
            return false;
        };
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            registry.run_pass(files).await;
        });
        true
    }

    /// Runs a discovery pass to completion. `None` when it could not start.
    pub async fn load_all(&self, request: DiscoveryRequest, callback: Option<GroupCallback>) -> Option<PassReport> {
        let files = self.begin_pass(&request, callback)?;
        Some(self.run_pass(files).await)
    }

    fn begin_pass(&self, request: &DiscoveryRequest, callback: Option<GroupCallback>) -> Option<Vec<PathBuf>> {
        if self
            .allow_loading
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("⚠️ Bundle loading is disabled while a discovery pass is running");
            return None;
        }

        let files = discover_bundle_files(request);
        if files.is_empty() {
            info!(
                "🔍 No bundle files matching {}{}",
                request.file_name, request.file_extension
            );
            self.allow_loading.store(true, Ordering::SeqCst);
            return None;
        }

        let key = CallbackKey {
            directory: request
                .directories
                .first()
                .map(|d| canonical_path(d).to_string_lossy().into_owned())
                .unwrap_or_default(),
            filter: request.filter_key(),
        };
        let mut entry = self.callbacks.entry(key).or_default();
        if let Some(callback) = callback {
            entry.push(callback);
        }

        Some(files)
    }

    async fn run_pass(&self, files: Vec<PathBuf>) -> PassReport {
        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_pass_state(ModProcessingStatus::Loading, false);

        let handles: Vec<Arc<BundleHandle>> = files
            .iter()
            .map(|path| {
                Arc::new(BundleHandle::new(
                    path.clone(),
                    self.backend.clone(),
                    self.events.clone(),
                    self.animation,
                ))
            })
            .collect();
        *self.handles.write().unwrap_or_else(PoisonError::into_inner) = handles.clone();

        info!("🔌 Discovery pass {} processing {} bundle file(s)", pass, handles.len());
        self.publish(
            BEFORE_PROCESS,
            &PassStartedEvent {
                pass,
                bundle_count: handles.len(),
            },
        )
        .await;

        // Every handle settles, loaded or failed, before grouping.
        join_all(handles.iter().map(|handle| handle.load())).await;

        let loaded: Vec<Arc<BundleHandle>> = handles.iter().filter(|h| h.is_loaded()).cloned().collect();
        let failed = handles.len() - loaded.len();
        if failed > 0 {
            warn!("⚠️ {} bundle(s) failed to load in pass {}", failed, pass);
        }

        let scene_sets: Vec<Vec<String>> = loaded.iter().map(|h| h.scene_names()).collect();
        let mut groups = Vec::new();
        for indices in partition_by_scenes(&scene_sets) {
            let members: Vec<Arc<BundleHandle>> = indices.iter().map(|&i| loaded[i].clone()).collect();
            let group = Arc::new(BundleGroup::new(&members, self.events.clone()));
            if let Err(e) = group.attach().await {
                error!("❌ Failed to attach group '{}': {}", group.name(), e);
            }
            groups.push(group);
        }

        let previous = std::mem::replace(
            &mut *self.groups.write().unwrap_or_else(PoisonError::into_inner),
            groups.clone(),
        );
        for group in previous {
            group.detach().await;
        }

        for group in &groups {
            self.invoke_callbacks(group).await;
        }

        self.allow_loading.store(true, Ordering::SeqCst);
        self.set_pass_state(ModProcessingStatus::Complete, true);
        info!("🎉 Discovery pass {} produced {} group(s)", pass, groups.len());
        self.publish(
            GROUPS_READY,
            &GroupsReadyEvent {
                pass,
                group_names: groups.iter().map(|g| g.name().to_string()).collect(),
                loaded_bundles: loaded.len(),
                failed_bundles: failed,
            },
        )
        .await;

        join_all(handles.iter().map(|handle| handle.unload())).await;

        PassReport {
            pass,
            discovered: handles.len(),
            loaded: loaded.len(),
            failed,
            groups,
        }
    }

    /// Runs the callbacks of every key whose directory and filter match a
    /// member of `group`. Each key fires at most once per group.
    async fn invoke_callbacks(&self, group: &Arc<BundleGroup>) {
        let matching: Vec<GroupCallback> = self
            .callbacks
            .iter()
            .filter(|entry| {
                let key = entry.key();
                group.members().iter().any(|handle| {
                    handle.path().to_string_lossy().contains(&key.directory)
                        && handle.file_name().to_lowercase().contains(&key.filter)
                })
            })
            .flat_map(|entry| entry.value().clone())
            .collect();

        for callback in matching {
            let outcome = AssertUnwindSafe(callback(group.clone())).catch_unwind().await;
            match outcome {
                Ok(Ok(())) => debug!("Group callback finished for '{}'", group.name()),
                Ok(Err(e)) => error!("❌ Group callback failed for '{}': {}", group.name(), e),
                Err(panic) => error!(
                    "❌ Group callback panicked for '{}': {}",
                    group.name(),
                    panic_message(panic.as_ref())
                ),
            }
        }
    }

    fn set_pass_state(&self, status: ModProcessingStatus, finalised: bool) {
        let mut state = self.pass_state.lock().unwrap_or_else(PoisonError::into_inner);
        state.status = status;
        state.finalised = finalised;
    }

    async fn publish<T: loader_event_system::Event>(&self, event_name: &str, event: &T) {
        if let Err(e) = self.events.emit(REGISTRY_NAMESPACE, event_name, event).await {
            error!("❌ Failed to publish registry:{}: {}", event_name, e);
        }
    }
}
