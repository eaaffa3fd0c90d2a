//! One bundle file and its load/unload state machine.

use crate::backend::{declared_scene_names, BundleBackend, BundleContents, ProgressReporter};
use crate::events::{BundleEvent, BUNDLE_NAMESPACE, LOADED, UNLOADED};
use loader_event_system::EventSystem;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// What a handle is currently doing. `None` is the idle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadingStatus {
    None,
    Loading,
    Unloading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleMode {
    Standard,
    Streaming,
}

/// Timing of the cosmetic progress sweep shown while a bundle unloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnloadAnimation {
    pub duration: Duration,
    pub tick: Duration,
}

impl Default for UnloadAnimation {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(150),
            tick: Duration::from_millis(16),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadFailure {
    FileNotFound,
    OpenFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The bundle is loaded. `adopted` is set when the host already had it open.
    Loaded { adopted: bool },
    Failed(LoadFailure),
    /// A load was already in flight or the bundle was already loaded.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadOutcome {
    Unloaded,
    Ignored,
}

struct HandleState {
    status: LoadingStatus,
    loaded: bool,
    progress: f32,
    mode: BundleMode,
    adopted: bool,
    contents: Option<Arc<dyn BundleContents>>,
    scenes: Vec<String>,
}

pub struct BundleHandle {
    path: PathBuf,
    file_name: String,
    name: String,
    backend: Arc<dyn BundleBackend>,
    events: Arc<EventSystem>,
    animation: UnloadAnimation,
    state: Mutex<HandleState>,
    /// Signalled when an unload settles back to idle.
    unload_settled: Notify,
}

impl std::fmt::Debug for BundleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("BundleHandle")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("status", &state.status)
            .field("loaded", &state.loaded)
            .field("progress", &state.progress)
            .finish()
    }
}

impl BundleHandle {
    pub fn new(
        path: impl Into<PathBuf>,
        backend: Arc<dyn BundleBackend>,
        events: Arc<EventSystem>,
        animation: UnloadAnimation,
    ) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            path,
            file_name,
            name,
            backend,
            events,
            animation,
            state: Mutex::new(HandleState {
                status: LoadingStatus::None,
                loaded: false,
                progress: 0.0,
                mode: BundleMode::Standard,
                adopted: false,
                contents: None,
                scenes: Vec::new(),
            }),
            unload_settled: Notify::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Logical name: the file name without its extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_loaded(&self) -> bool {
        self.state().loaded
    }

    pub fn status(&self) -> LoadingStatus {
        self.state().status
    }

    pub fn progress(&self) -> f32 {
        self.state().progress
    }

    pub fn mode(&self) -> BundleMode {
        self.state().mode
    }

    /// Whether the current load reused a bundle the host already had open.
    pub fn is_adopted(&self) -> bool {
        self.state().adopted
    }

    /// Opened contents, only while loaded.
    pub fn contents(&self) -> Option<Arc<dyn BundleContents>> {
        let state = self.state();
        if state.loaded {
            state.contents.clone()
        } else {
            None
        }
    }

    /// Scene names declared by the most recent successful load. Kept after
    /// unloading so groups stay queryable.
    pub fn scene_names(&self) -> Vec<String> {
        self.state().scenes.clone()
    }

    /// True when `scene` (or `scene` with a `.unity` suffix removed) is one of
    /// the declared scene names.
    pub fn contains_scene(&self, scene: &str) -> bool {
        let state = self.state();
        let stripped = scene.replace(".unity", "");
        state.scenes.iter().any(|s| s == scene || *s == stripped)
    }

    /// Loads the bundle. Ignored when already loaded or loading. A request
    /// made while unloading waits for the unload to settle, then loads.
    pub async fn load(&self) -> LoadOutcome {
        loop {
            let settled = self.unload_settled.notified();
            tokio::pin!(settled);
            {
                let mut state = self.state();
                if state.loaded || state.status == LoadingStatus::Loading {
                    return LoadOutcome::Ignored;
                }
                if state.status == LoadingStatus::None {
                    state.status = LoadingStatus::Loading;
                    state.progress = 0.0;
                    break;
                }
                // Registered under the lock so the unload's wake-up cannot be missed.
                settled.as_mut().enable();
            }
            debug!("⏳ Load of '{}' waits for its unload to finish", self.name);
            settled.await;
        }

        if let Some(existing) = self.backend.find_loaded(&self.name).await {
            debug!("♻️ Bundle '{}' already open in host, adopting it", self.name);
            return self.finish_load(existing, true).await;
        }

        if !self.backend.exists(&self.path).await {
            warn!("⚠️ Bundle file not found: {}", self.path.display());
            self.reset_to_idle();
            return LoadOutcome::Failed(LoadFailure::FileNotFound);
        }

        let reporter = HandleProgress { handle: self };
        match self.backend.open(&self.path, &reporter).await {
            Some(contents) => self.finish_load(contents, false).await,
            None => {
                error!("❌ Failed to open bundle at {}", self.path.display());
                self.reset_to_idle();
                LoadOutcome::Failed(LoadFailure::OpenFailed)
            }
        }
    }

    async fn finish_load(&self, contents: Arc<dyn BundleContents>, adopted: bool) -> LoadOutcome {
        let mode = match contents.is_streamed_scene() {
            Ok(true) => BundleMode::Streaming,
            Ok(false) => BundleMode::Standard,
            Err(e) => {
                warn!("⚠️ Could not classify bundle '{}', assuming standard: {}", self.name, e);
                BundleMode::Standard
            }
        };
        let scenes = declared_scene_names(contents.as_ref(), mode == BundleMode::Streaming);

        {
            let mut state = self.state();
            state.mode = mode;
            state.scenes = scenes;
            state.contents = Some(contents);
            state.adopted = adopted;
            state.loaded = true;
            state.status = LoadingStatus::None;
            state.progress = 100.0;
        }

        info!("📦 Loaded bundle '{}' ({:?})", self.name, mode);
        self.publish(LOADED, true, adopted).await;
        LoadOutcome::Loaded { adopted }
    }

    /// Unloads the bundle, then sweeps progress for the configured animation
    /// before settling idle.
    pub async fn unload(&self) -> UnloadOutcome {
        let contents = {
            let mut state = self.state();
            if !state.loaded || state.status == LoadingStatus::Unloading {
                return UnloadOutcome::Ignored;
            }
            state.status = LoadingStatus::Unloading;
            state.progress = 0.0;
            state.loaded = false;
            state.contents.take()
        };

        if let Some(contents) = contents {
            contents.unload();
        }

        let start = Instant::now();
        loop {
            let elapsed = start.elapsed();
            if elapsed >= self.animation.duration {
                break;
            }
            let fraction = elapsed.as_secs_f32() / self.animation.duration.as_secs_f32();
            self.raise_progress(fraction.clamp(0.0, 1.0) * 100.0);
            tokio::time::sleep(self.animation.tick).await;
        }

        {
            let mut state = self.state();
            state.progress = 0.0;
            state.status = LoadingStatus::None;
            state.adopted = false;
        }

        debug!("📤 Unloaded bundle '{}'", self.name);
        self.publish(UNLOADED, false, false).await;
        self.unload_settled.notify_waiters();
        UnloadOutcome::Unloaded
    }

    /// Spawns [`BundleHandle::load`] on the runtime.
    pub fn request_load(self: &Arc<Self>) -> JoinHandle<LoadOutcome> {
        let handle = Arc::clone(self);
        tokio::spawn(async move { handle.load().await })
    }

    /// Spawns [`BundleHandle::unload`] on the runtime.
    pub fn request_unload(self: &Arc<Self>) -> JoinHandle<UnloadOutcome> {
        let handle = Arc::clone(self);
        tokio::spawn(async move { handle.unload().await })
    }

    fn reset_to_idle(&self) {
        let mut state = self.state();
        state.status = LoadingStatus::None;
        state.progress = 0.0;
        state.loaded = false;
        state.contents = None;
    }

    /// Progress never moves backwards within one operation.
    fn raise_progress(&self, percent: f32) {
        let mut state = self.state();
        if state.status == LoadingStatus::None {
            return;
        }
        let percent = percent.clamp(0.0, 100.0);
        if percent > state.progress {
            state.progress = percent;
        }
    }

    async fn publish(&self, event_name: &str, loaded: bool, adopted: bool) {
        let event = BundleEvent {
            bundle_name: self.name.clone(),
            file_path: self.path.to_string_lossy().into_owned(),
            loaded,
            adopted,
        };
        if let Err(e) = self.events.emit(BUNDLE_NAMESPACE, event_name, &event).await {
            error!("❌ Failed to publish {} for bundle '{}': {}", event_name, self.name, e);
        }
    }
}

struct HandleProgress<'a> {
    handle: &'a BundleHandle,
}

impl ProgressReporter for HandleProgress<'_> {
    fn report(&self, percent: f32) {
        // 100 is reserved for the completed state.
        self.handle.raise_progress(percent.min(99.9));
    }
}
