//! Process-wide content bookkeeping: mods, packs, spawnables and the tag
//! indices, fed from bundle groups as they are discovered.

use crate::content::{ContentItem, SegmentData};
use crate::error::ContentError;
use crate::events::{ModRegisteredEvent, CONTENT_NAMESPACE, MOD_REGISTERED};
use crate::manifest::{detect_manifest, ManifestSegment, ModManifest};
use crate::mod_descriptor::ModDescriptor;
use crate::packs::{LevelPack, PackCollection, SpawnMapping};
use crate::spawnables::{SpawnableEntry, SpawnableRegistry};
use crate::tag::{ContentTag, TagColor, TagRef};
use crate::tags::{merge_all_tags, merge_mod_tags, TagIndex};
use bundle_system::BundleGroup;
use loader_event_system::EventSystem;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
struct RegistryState {
    mods: Vec<ModDescriptor>,
    index: TagIndex,
    packs: PackCollection,
    spawnables: SpawnableRegistry,
    mod_defined_tags: HashMap<String, Vec<TagRef>>,
    level_scene_names: Vec<String>,
    bundle_hashes: Vec<String>,
    bundle_names: Vec<String>,
}

/// Outcome of registering one manifest.
#[derive(Debug, Clone)]
pub struct ManifestReport {
    pub mod_name: String,
    pub contents_registered: usize,
    pub packs: Vec<LevelPack>,
    pub tag_count: usize,
    pub total_packs: usize,
}

/// Outcome of ingesting one bundle group.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub group_name: String,
    pub scenes_added: usize,
    pub manifest: Option<ManifestReport>,
    pub new_bundle_hashes: usize,
}

pub struct ContentRegistry {
    events: Arc<EventSystem>,
    enable_customs: bool,
    state: RwLock<RegistryState>,
}

impl std::fmt::Debug for ContentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("ContentRegistry")
            .field("mods", &state.mods.len())
            .field("packs", &state.packs.len())
            .field("enable_customs", &self.enable_customs)
            .finish()
    }
}

impl ContentRegistry {
    /// With `enable_customs` off, manifests still register their mods but
    /// their packs stay out of the pack collection.
    pub fn new(events: Arc<EventSystem>, enable_customs: bool) -> Self {
        Self {
            events,
            enable_customs,
            state: RwLock::new(RegistryState::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a group's scenes, registers the mod its manifest describes and
    /// fingerprints its member files. The group must still be loaded for its
    /// manifest to be readable.
    pub async fn ingest_group(&self, group: &BundleGroup) -> IngestReport {
        let mut report = IngestReport {
            group_name: group.name().to_string(),
            ..Default::default()
        };

        {
            let mut state = self.write();
            for scene in group.scene_names() {
                if !state.level_scene_names.contains(&scene) {
                    state.level_scene_names.push(scene);
                    report.scenes_added += 1;
                }
            }
        }

        let texts = group.read_text_assets();
        match detect_manifest(&texts) {
            Some(text) => match ModManifest::parse(text) {
                Ok(manifest) => match self.ingest_manifest(&manifest, group.name()).await {
                    Ok(manifest_report) => report.manifest = Some(manifest_report),
                    Err(e) => warn!("⚠️ Manifest in group '{}' not registered: {}", group.name(), e),
                },
                Err(e) => warn!("⚠️ Failed to parse manifest in group '{}': {}", group.name(), e),
            },
            None => debug!("No manifest in group '{}'", group.name()),
        }

        for handle in group.members() {
            let Some(hash) = hash_file(handle.path()).await else {
                continue;
            };
            let mut state = self.write();
            if !state.bundle_hashes.contains(&hash) {
                state.bundle_hashes.push(hash);
                state.bundle_names.push(handle.file_name().to_string());
                report.new_bundle_hashes += 1;
            }
        }

        report
    }

    /// Registers the mod described by `manifest`, whose prefabs live in the
    /// group `group_name` (empty when they need no group).
    pub async fn ingest_manifest(&self, manifest: &ModManifest, group_name: &str) -> Result<ManifestReport, ContentError> {
        if let Some(reason) = manifest.rejection() {
            return Err(ContentError::ManifestRejected(reason.to_string()));
        }
        if manifest.version.trim().is_empty() {
            error!(
                "❌ Manifest '{}' does not define a version; add a \"version\" entry",
                manifest.mod_name
            );
        }

        let created_tags = manifest_tags(manifest);
        let fallback_group: &str = if group_name.is_empty() { &manifest.mod_name } else { group_name };

        let mut descriptor = ModDescriptor::new(
            Some(manifest.mod_name.as_str()),
            Some(manifest.author.as_str()),
            Some(manifest.version.as_str()),
        );
        let packs: Vec<LevelPack> = manifest
            .segments
            .iter()
            .map(|segment| segment_pack(&manifest.mod_name, group_name, segment))
            .collect();
        for pack in &packs {
            let content = ContentItem::segment(pack.pack_name.clone(), segment_data(pack)).with_tags(created_tags.iter().cloned());
            descriptor.try_register(content);
        }
        let contents_registered = descriptor.contents().len();

        let total_packs = {
            let mut state = self.write();

            let spawnables = manifest
                .spawnables
                .iter()
                .chain(manifest.segments.iter().flat_map(|s| s.spawnables.iter()));
            for spawnable in spawnables {
                if spawnable.name.is_empty() || spawnable.prefab_name.is_empty() {
                    continue;
                }
                let group: &str = if spawnable.bundle_path.is_empty() { fallback_group } else { &spawnable.bundle_path };
                state.spawnables.register(&spawnable.name, group, &spawnable.prefab_name);
                debug!("Spawnable '{}' -> {}::{}", spawnable.name, group, spawnable.prefab_name);
            }

            let total = if self.enable_customs {
                add_packs(&mut state.packs, &packs)
            } else {
                info!("🚫 Custom content disabled, skipping {} pack(s) from '{}'", packs.len(), manifest.mod_name);
                state.packs.len()
            };

            merge_mod_tags(&mut descriptor);
            state.mods.push(descriptor);
            merge_all_tags(&mut state.mods);
            state.mods.sort_by_key(|m| m.name.to_lowercase());
            for m in state.mods.iter_mut() {
                m.sort_contents();
            }
            let RegistryState { mods, index, .. } = &mut *state;
            index.rebuild(mods);

            let canonical: Vec<TagRef> = created_tags
                .iter()
                .map(|tag| index.tags_named(&tag.name).first().cloned().unwrap_or_else(|| tag.clone()))
                .collect();
            let defined = state.mod_defined_tags.entry(manifest.mod_name.clone()).or_default();
            for tag in &canonical {
                if !defined.iter().any(|t| Arc::ptr_eq(t, tag)) {
                    defined.push(tag.clone());
                }
            }
            let defined = defined.clone();
            if !group_name.is_empty() {
                state.mod_defined_tags.entry(group_name.to_string()).or_insert(defined);
            }

            total
        };

        info!(
            "🧩 Registered mod '{}' with {} segment(s) and {} tag(s)",
            manifest.mod_name,
            manifest.segments.len(),
            created_tags.len()
        );

        let event = ModRegisteredEvent {
            mod_name: manifest.mod_name.clone(),
            group_name: group_name.to_string(),
            content_count: contents_registered,
            pack_count: packs.len(),
            tag_names: created_tags.iter().map(|t| t.name.clone()).collect(),
        };
        if let Err(e) = self.events.emit(CONTENT_NAMESPACE, MOD_REGISTERED, &event).await {
            error!("❌ Failed to publish content:{}: {}", MOD_REGISTERED, e);
        }

        Ok(ManifestReport {
            mod_name: manifest.mod_name.clone(),
            contents_registered,
            packs,
            tag_count: created_tags.len(),
            total_packs,
        })
    }

    /// Merges packs received from elsewhere. Returns the unique pack count.
    pub fn add_packs(&self, packs: &[LevelPack]) -> usize {
        add_packs(&mut self.write().packs, packs)
    }

    pub fn packs(&self) -> Vec<LevelPack> {
        self.read().packs.packs().to_vec()
    }

    pub fn mods(&self) -> Vec<ModDescriptor> {
        self.read().mods.clone()
    }

    pub fn mod_count(&self) -> usize {
        self.read().mods.len()
    }

    /// Every content item carrying a tag with this name, case-insensitive.
    pub fn contents_by_tag(&self, name: &str) -> Vec<ContentItem> {
        let state = self.read();
        state
            .index
            .contents_tagged(name)
            .iter()
            .filter_map(|at| state.mods.get(at.mod_index)?.contents().get(at.content_index).cloned())
            .collect()
    }

    /// Distinct tag instances with this name. One after a merge pass.
    pub fn tags_named(&self, name: &str) -> Vec<TagRef> {
        self.read().index.tags_named(name).to_vec()
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.read().index.tag_names().into_iter().map(str::to_string).collect()
    }

    /// Tags declared by a mod, looked up by mod name or by group name.
    pub fn mod_defined_tags(&self, key: &str) -> Vec<TagRef> {
        self.read().mod_defined_tags.get(key).cloned().unwrap_or_default()
    }

    pub fn spawnable(&self, name: &str) -> Option<SpawnableEntry> {
        self.read().spawnables.get(name).cloned()
    }

    pub fn level_scene_names(&self) -> Vec<String> {
        self.read().level_scene_names.clone()
    }

    pub fn loaded_bundle_hashes(&self) -> Vec<String> {
        self.read().bundle_hashes.clone()
    }

    pub fn loaded_bundle_names(&self) -> Vec<String> {
        self.read().bundle_names.clone()
    }

    /// Human-readable snapshot of everything registered.
    pub fn dump(&self) -> String {
        let state = self.read();
        let mut out = String::new();
        let _ = writeln!(out, "==== Content Dump ====");
        let _ = writeln!(out, "LoadedBundleHashes: {}", state.bundle_hashes.len());
        let _ = writeln!(out, "LoadedBundleNames: {}", state.bundle_names.len());
        let _ = writeln!(out, "AllLevelSceneNames: {}", state.level_scene_names.len());
        let _ = writeln!(out, "Packs: {}", state.packs.len());
        let _ = writeln!(out, "Mods: {}", state.mods.len());
        for m in &state.mods {
            let _ = writeln!(out, " - Mod: {} (Author: {})", m.name, m.author);
            for content in m.contents() {
                let _ = writeln!(
                    out,
                    "   - Content: {} (Type: {:?}, Tags: {})",
                    content.name,
                    content.kind,
                    content.tag_names().join(",")
                );
            }
        }
        let _ = writeln!(out, "==== End Dump ====");
        out
    }
}

fn add_packs(collection: &mut PackCollection, packs: &[LevelPack]) -> usize {
    if packs.is_empty() {
        return collection.len();
    }
    let total = collection.merge(packs);
    info!("📚 Pack collection now holds {} unique pack(s)", total);
    total
}

/// Coloured tag objects first, then plain names; one tag per name.
fn manifest_tags(manifest: &ModManifest) -> Vec<TagRef> {
    let declared = manifest
        .content_tag_objects
        .iter()
        .map(|t| (t.name.as_str(), TagColor::from_hex(&t.color_hex).unwrap_or_default()))
        .chain(manifest.content_tags.iter().map(|name| (name.as_str(), TagColor::WHITE)));

    let mut tags: Vec<TagRef> = Vec::new();
    for (name, color) in declared {
        if name.is_empty() || tags.iter().any(|t| t.name.eq_ignore_ascii_case(name)) {
            continue;
        }
        tags.push(ContentTag::create_with_color(name, color));
    }
    tags
}

fn segment_pack(mod_name: &str, group_name: &str, segment: &ManifestSegment) -> LevelPack {
    let suffix = if segment.id.is_empty() {
        segment.index.to_string()
    } else {
        segment.id.clone()
    };
    LevelPack {
        index: segment.index,
        replace: segment.replace,
        is_variant: segment.is_variant,
        biome: segment.biome.clone(),
        group_name: group_name.to_string(),
        prefab_name: segment.segment_prefab.clone(),
        campfire_prefab_name: Some(segment.campfire_prefab.clone()).filter(|c| !c.is_empty()),
        pack_name: format!("{}_{}", mod_name, suffix),
        id: if segment.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            segment.id.clone()
        },
        spawn_mappings: segment
            .spawn_mappings
            .iter()
            .map(|m| SpawnMapping {
                spawner_marker: m.spawner_marker.clone(),
                spawnable_name: m.spawnable_name.clone(),
            })
            .collect(),
    }
}

fn segment_data(pack: &LevelPack) -> SegmentData {
    SegmentData {
        index: pack.index,
        replace: pack.replace,
        is_variant: pack.is_variant,
        biome: pack.biome.clone(),
        prefab_name: pack.prefab_name.clone(),
        campfire_prefab_name: pack.campfire_prefab_name.clone(),
        pack_name: pack.pack_name.clone(),
        id: pack.id.clone(),
    }
}

async fn hash_file(path: &Path) -> Option<String> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(hex::encode(Sha256::digest(&bytes))),
        Err(e) => {
            warn!("⚠️ Could not hash bundle {}: {}", path.display(), e);
            None
        }
    }
}
