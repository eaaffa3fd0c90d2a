//! # Content Registry
//!
//! Turns discovered bundle groups into registered content. Each group's
//! `mod.json` manifest becomes a [`ModDescriptor`] with one custom
//! [`ContentItem`] per segment, a set of [`LevelPack`]s and named
//! spawnables. After every registration the tag merge passes run so each
//! tag name resolves to a single shared [`ContentTag`] instance, and the
//! tag-name indices are rebuilt.

pub mod content;
pub mod error;
pub mod events;
pub mod json_scan;
pub mod manifest;
pub mod mod_descriptor;
pub mod packs;
pub mod registry;
pub mod spawnables;
pub mod tag;
pub mod tags;

#[cfg(test)]
mod tests;

pub use content::{ContentItem, ContentKind, SegmentData};
pub use error::ContentError;
pub use events::{ModRegisteredEvent, CONTENT_NAMESPACE, MOD_REGISTERED};
pub use manifest::{detect_manifest, ModManifest};
pub use mod_descriptor::{ModDescriptor, CUSTOM_TAG};
pub use packs::{merge_packs, LevelPack, PackCollection, SpawnMapping};
pub use registry::{ContentRegistry, IngestReport, ManifestReport};
pub use spawnables::{SpawnableEntry, SpawnableRegistry};
pub use tag::{create_content_tags, ContentTag, TagColor, TagRef};
pub use tags::{merge_all_tags, merge_mod_tags, ContentRef, TagIndex};
