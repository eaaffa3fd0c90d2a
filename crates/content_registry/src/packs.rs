//! Level packs and the deduplicated pack collection.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpawnMapping {
    pub spawner_marker: String,
    pub spawnable_name: String,
}

/// One placeable level segment. Serialized with the field names peers
/// exchange on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LevelPack {
    pub index: i32,
    pub replace: bool,
    pub is_variant: bool,
    pub biome: String,
    /// Name of the bundle group that provides the prefabs. Empty when the
    /// pack does not depend on a group.
    #[serde(rename = "bundlePath")]
    pub group_name: String,
    pub prefab_name: String,
    pub campfire_prefab_name: Option<String>,
    pub pack_name: String,
    pub id: String,
    pub spawn_mappings: Vec<SpawnMapping>,
}

impl LevelPack {
    /// The id, or the pack name when the id is empty.
    pub fn dedup_key(&self) -> &str {
        if self.id.is_empty() {
            &self.pack_name
        } else {
            &self.id
        }
    }

    pub fn required_group(&self) -> Option<&str> {
        if self.group_name.is_empty() {
            None
        } else {
            Some(&self.group_name)
        }
    }
}

/// `existing` followed by `incoming`, keeping the first pack per dedup key.
pub fn merge_packs(existing: &[LevelPack], incoming: &[LevelPack]) -> Vec<LevelPack> {
    let mut seen = HashSet::new();
    existing
        .iter()
        .chain(incoming)
        .filter(|pack| seen.insert(pack.dedup_key().to_string()))
        .cloned()
        .collect()
}

/// The authoritative set of packs to apply.
#[derive(Debug, Clone, Default)]
pub struct PackCollection {
    packs: Vec<LevelPack>,
}

impl PackCollection {
    pub fn packs(&self) -> &[LevelPack] {
        &self.packs
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }

    /// Adds `incoming`. Packs whose key is already present are dropped.
    /// Returns the unique pack count.
    pub fn merge(&mut self, incoming: &[LevelPack]) -> usize {
        if incoming.is_empty() {
            return self.packs.len();
        }
        self.packs = merge_packs(&self.packs, incoming);
        self.packs.len()
    }

    pub fn clear(&mut self) {
        self.packs.clear();
    }
}
