//! The `mod.json` manifest carried inside a bundle group.
//!
//! Parsing is lenient: unknown fields are ignored, `null` reads as the
//! default, and each segment, spawnable, spawn mapping and tag object is
//! parsed on its own so one bad entry does not discard its siblings.

use crate::error::ContentError;
use crate::json_scan::{extract_top_level_array, sanitize_json, split_top_level_objects};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{info, warn};

pub const MANIFEST_ASSET_NAME: &str = "mod.json";

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reads a list entry by entry, skipping entries that do not fit `T`. A
/// value that is not an array reads as empty.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let entries = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(entries)) => entries,
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(other) => {
            warn!("⚠️ Expected a list of {}, found {}", short_type_name::<T>(), other);
            return Ok(Vec::new());
        }
    };
    Ok(entries
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| match serde_json::from_value(entry) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("⚠️ Skipping {} entry {}: {}", short_type_name::<T>(), i, e);
                None
            }
        })
        .collect())
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestSpawnable {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub prefab_name: String,
    /// Group providing the prefab. Empty means the manifest's own group.
    #[serde(deserialize_with = "null_as_default")]
    pub bundle_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestSpawnMapping {
    #[serde(deserialize_with = "null_as_default")]
    pub spawner_marker: String,
    #[serde(deserialize_with = "null_as_default")]
    pub spawnable_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestSegment {
    #[serde(deserialize_with = "null_as_default")]
    pub index: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub replace: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub is_variant: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub biome: String,
    #[serde(deserialize_with = "null_as_default")]
    pub segment_prefab: String,
    #[serde(deserialize_with = "null_as_default")]
    pub campfire_prefab: String,
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient_list")]
    pub spawnables: Vec<ManifestSpawnable>,
    #[serde(deserialize_with = "lenient_list")]
    pub spawn_mappings: Vec<ManifestSpawnMapping>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestTag {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub color_hex: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModManifest {
    pub mod_name: String,
    pub author: String,
    pub version: String,
    pub description: String,
    pub bundled_scenes: Vec<String>,
    pub segments: Vec<ManifestSegment>,
    pub content_tags: Vec<String>,
    pub content_tag_objects: Vec<ManifestTag>,
    pub spawnables: Vec<ManifestSpawnable>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawManifest {
    #[serde(deserialize_with = "null_as_default")]
    mod_name: String,
    #[serde(deserialize_with = "null_as_default")]
    author: String,
    #[serde(deserialize_with = "null_as_default")]
    version: String,
    #[serde(deserialize_with = "null_as_default")]
    description: String,
    #[serde(deserialize_with = "null_as_default")]
    bundled_scenes: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    segments: Vec<Value>,
    #[serde(deserialize_with = "null_as_default")]
    content_tags: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    content_tag_objects: Vec<ManifestTag>,
    #[serde(deserialize_with = "lenient_list")]
    spawnables: Vec<ManifestSpawnable>,
}

impl ModManifest {
    /// Parses manifest text. When no segment survives structured parsing but
    /// the text mentions `"segments"`, the array is recovered by bracket
    /// matching and each object parsed separately.
    pub fn parse(text: &str) -> Result<Self, ContentError> {
        let raw_text = sanitize_json(text);
        let raw: RawManifest =
            serde_json::from_str(raw_text).map_err(|e| ContentError::ManifestParse(e.to_string()))?;

        let mut segments: Vec<ManifestSegment> = raw
            .segments
            .into_iter()
            .enumerate()
            .filter_map(|(i, value)| match serde_json::from_value(value) {
                Ok(segment) => Some(segment),
                Err(e) => {
                    warn!("⚠️ Skipping segment {} in manifest '{}': {}", i, raw.mod_name, e);
                    None
                }
            })
            .collect();

        if segments.is_empty() && raw_text.to_ascii_lowercase().contains("\"segments\"") {
            segments = recover_segments(raw_text, &raw.mod_name);
        }

        Ok(Self {
            mod_name: raw.mod_name,
            author: raw.author,
            version: raw.version,
            description: raw.description,
            bundled_scenes: raw.bundled_scenes,
            segments,
            content_tags: raw.content_tags,
            content_tag_objects: raw.content_tag_objects,
            spawnables: raw.spawnables,
        })
    }

    /// Why this manifest cannot register a mod, if it cannot.
    pub fn rejection(&self) -> Option<&'static str> {
        if self.segments.is_empty() {
            Some("no segments")
        } else if self.mod_name.is_empty() {
            Some("no modName")
        } else {
            None
        }
    }
}

fn recover_segments(raw_text: &str, mod_name: &str) -> Vec<ManifestSegment> {
    let Some(array) = extract_top_level_array(raw_text, "segments") else {
        info!("🔍 No recoverable segments array in manifest '{}'", mod_name);
        return Vec::new();
    };

    let segments: Vec<ManifestSegment> = split_top_level_objects(array)
        .into_iter()
        .enumerate()
        .filter_map(|(i, object)| match serde_json::from_str(object) {
            Ok(segment) => Some(segment),
            Err(e) => {
                warn!("⚠️ Recovered segment {} in manifest '{}' failed to parse: {}", i, mod_name, e);
                None
            }
        })
        .collect();
    info!("🔍 Recovered {} segment(s) from manifest '{}'", segments.len(), mod_name);
    segments
}

/// Picks the manifest among `(asset name, text)` pairs: an asset named
/// `mod.json`, otherwise the first JSON object text mentioning `modName`.
pub fn detect_manifest(texts: &[(String, String)]) -> Option<&str> {
    let by_name = texts.iter().find(|(name, _)| {
        let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
        file.eq_ignore_ascii_case(MANIFEST_ASSET_NAME)
    });
    if let Some((_, text)) = by_name {
        return Some(text);
    }
    texts
        .iter()
        .map(|(_, text)| text.trim())
        .find(|text| text.starts_with('{') && text.contains("modName"))
}
