//! A development backend reading JSON bundle containers from disk.
//!
//! Container layout:
//!
//! ```json
//! {
//!   "streamed_scene": false,
//!   "scenes": ["Assets/Levels/Forest.unity"],
//!   "assets": { "mod.json": "{ \"modName\": \"Forest\" }" }
//! }
//! ```

use crate::backend::{BundleBackend, BundleContents, ProgressReporter};
use crate::error::BundleSystemError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Weak};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

type OpenBundles = DashMap<String, Arc<FsBundleContents>>;

#[derive(Debug, Deserialize)]
struct ContainerFile {
    #[serde(default)]
    streamed_scene: bool,
    #[serde(default)]
    scenes: Vec<String>,
    #[serde(default)]
    assets: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct FsBundleContents {
    name: String,
    container: ContainerFile,
    open: Weak<OpenBundles>,
}

impl BundleContents for FsBundleContents {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_streamed_scene(&self) -> Result<bool, BundleSystemError> {
        Ok(self.container.streamed_scene)
    }

    fn asset_names(&self) -> Vec<String> {
        self.container.assets.keys().cloned().collect()
    }

    fn scene_paths(&self) -> Vec<String> {
        self.container.scenes.clone()
    }

    fn read_text(&self, asset_name: &str) -> Option<String> {
        self.container.assets.get(asset_name).cloned()
    }

    fn unload(&self) {
        if let Some(open) = self.open.upgrade() {
            open.remove(&self.name.to_lowercase());
        }
    }
}

/// Opens JSON containers, streaming the file in chunks to report progress.
#[derive(Debug)]
pub struct FsBundleBackend {
    open: Arc<OpenBundles>,
    chunk_size: usize,
}

impl Default for FsBundleBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FsBundleBackend {
    pub fn new() -> Self {
        Self {
            open: Arc::new(DashMap::new()),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Number of bundles currently open.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    async fn read_with_progress(&self, path: &Path, progress: &dyn ProgressReporter) -> Result<Vec<u8>, BundleSystemError> {
        let mut file = tokio::fs::File::open(path).await?;
        let total = file.metadata().await?.len().max(1) as f32;
        let mut bytes = Vec::new();
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            let read = file.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..read]);
            progress.report(bytes.len() as f32 / total * 100.0);
        }
        Ok(bytes)
    }
}

#[async_trait]
impl BundleBackend for FsBundleBackend {
    async fn find_loaded(&self, name: &str) -> Option<Arc<dyn BundleContents>> {
        self.open
            .get(&name.to_lowercase())
            .map(|entry| entry.value().clone() as Arc<dyn BundleContents>)
    }

    async fn open(&self, path: &Path, progress: &dyn ProgressReporter) -> Option<Arc<dyn BundleContents>> {
        let bytes = match self.read_with_progress(path, progress).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("⚠️ Could not read bundle {}: {}", path.display(), e);
                return None;
            }
        };
        let container: ContainerFile = match serde_json::from_slice(&bytes) {
            Ok(container) => container,
            Err(e) => {
                warn!("⚠️ {} is not a valid bundle container: {}", path.display(), e);
                return None;
            }
        };

        let name = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let contents = Arc::new(FsBundleContents {
            name: name.clone(),
            container,
            open: Arc::downgrade(&self.open),
        });
        self.open.insert(name.to_lowercase(), contents.clone());
        debug!("📂 Opened bundle container {}", path.display());
        Some(contents)
    }
}
