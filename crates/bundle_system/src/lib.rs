//! # Bundle System
//!
//! Discovers bundle files, drives each one through its load/unload state
//! machine, and partitions loaded bundles into groups by the scenes they
//! declare.
//!
//! The [`BundleRegistry`] owns every [`BundleHandle`]. A discovery pass loads
//! all matching files, waits for every load to settle, builds
//! [`BundleGroup`]s, runs the callbacks registered for that directory and
//! filter, publishes `registry:groups_ready` and unloads the bundles again.
//! Groups can re-load their members on demand afterwards.

pub mod backend;
pub mod discovery;
pub mod error;
pub mod events;
pub mod fs_backend;
pub mod group;
pub mod grouping;
pub mod handle;
pub mod registry;


pub use backend::{declared_scene_names, scene_name_from_path, BundleBackend, BundleContents, ProgressReporter};
pub use discovery::{discover_bundle_files, DiscoveryRequest};
pub use error::BundleSystemError;
pub use fs_backend::FsBundleBackend;
pub use group::{BundleGroup, GroupLoadedStatus, GroupLoadingStatus};
pub use grouping::partition_by_scenes;
pub use handle::{BundleHandle, BundleMode, LoadFailure, LoadOutcome, LoadingStatus, UnloadAnimation, UnloadOutcome};
pub use registry::{group_callback, BundleRegistry, GroupCallback, ModProcessingStatus, PassReport};
