//! The seam between the bundle state machine and whatever actually opens
//! bundle files.

use crate::error::BundleSystemError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

/// Receives percentage updates (0-100) while a bundle is being opened.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, percent: f32);
}

/// Opens bundle files and knows which bundles the host already has loaded.
#[async_trait]
pub trait BundleBackend: Send + Sync + 'static {
    /// Returns the already-open bundle whose logical name matches `name`
    /// (case-insensitive), if any.
    async fn find_loaded(&self, name: &str) -> Option<Arc<dyn BundleContents>>;

    /// Whether a bundle file exists at `path`.
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    /// Opens the bundle at `path`. `None` means the open produced no result.
    async fn open(&self, path: &Path, progress: &dyn ProgressReporter) -> Option<Arc<dyn BundleContents>>;
}

/// The opened contents of one bundle.
pub trait BundleContents: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Whether this is a scene-streaming bundle. Errors fall back to standard.
    fn is_streamed_scene(&self) -> Result<bool, BundleSystemError>;

    fn asset_names(&self) -> Vec<String>;

    fn scene_paths(&self) -> Vec<String>;

    /// Text of a contained asset, if it has a text form.
    fn read_text(&self, asset_name: &str) -> Option<String>;

    /// Releases the underlying resource.
    fn unload(&self);
}

/// Scene name for an asset or scene path: the file stem of a `.unity` path,
/// with either separator style accepted.
pub fn scene_name_from_path(path: &str) -> Option<String> {
    let normalized = path.replace('\\', "/");
    if normalized.len() < ".unity".len() || !normalized.to_ascii_lowercase().ends_with(".unity") {
        return None;
    }
    let file_name = normalized.rsplit('/').next().unwrap_or(&normalized);
    let stem = &file_name[..file_name.len() - ".unity".len()];
    Some(stem.to_string())
}

/// Scene names declared by opened contents. Streamed bundles list their scene
/// paths; standard bundles are scanned for scene assets.
pub fn declared_scene_names(contents: &dyn BundleContents, streamed: bool) -> Vec<String> {
    let paths = if streamed {
        contents.scene_paths()
    } else {
        contents.asset_names()
    };
    paths
        .iter()
        .filter_map(|path| scene_name_from_path(path))
        .collect()
}
