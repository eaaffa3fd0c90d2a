//! Scenario tests feeding manifests and discovered groups into the registry.

use crate::content::ContentKind;
use crate::error::ContentError;
use crate::events::{ModRegisteredEvent, CONTENT_NAMESPACE, MOD_REGISTERED};
use crate::manifest::ModManifest;
use crate::packs::LevelPack;
use crate::registry::{ContentRegistry, IngestReport};
use crate::tag::TagColor;
use bundle_system::{group_callback, BundleRegistry, DiscoveryRequest, FsBundleBackend, UnloadAnimation};
use loader_event_system::EventSystem;
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn manifest(value: serde_json::Value) -> ModManifest {
    ModManifest::parse(&value.to_string()).unwrap()
}

fn forest_manifest() -> serde_json::Value {
    json!({
        "modName": "Forest Pack",
        "author": "Ana",
        "version": "1.0.0",
        "contentTags": ["Night", "night", ""],
        "contentTagObjects": [{ "name": "Snow", "colorHex": "#80c0ff" }],
        "spawnables": [{ "name": "Crate", "prefabName": "crate_small" }],
        "segments": [
            {
                "index": 1,
                "id": "seg-a",
                "segmentPrefab": "Forest_A",
                "spawnMappings": [{ "spawnerMarker": "Marker_1", "spawnableName": "Crate" }]
            },
            { "index": 2, "segmentPrefab": "Forest_B", "campfirePrefab": "Campfire" }
        ]
    })
}

async fn recorded_registrations(events: &Arc<EventSystem>) -> Arc<Mutex<Vec<ModRegisteredEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    events
        .on(CONTENT_NAMESPACE, MOD_REGISTERED, move |event: ModRegisteredEvent| {
            sink.lock().unwrap().push(event);
            Ok(())
        })
        .await
        .unwrap();
    seen
}

fn write_container(dir: &Path, stem: &str, container: serde_json::Value) {
    std::fs::write(dir.join(format!("{}.pll", stem)), container.to_string()).unwrap();
}

/// Runs one discovery pass over `dir`, ingesting every group it produces.
async fn ingest_directory(dir: &Path, content: &Arc<ContentRegistry>) -> Vec<IngestReport> {
    let animation = UnloadAnimation {
        duration: Duration::ZERO,
        tick: Duration::from_millis(1),
    };
    let bundles = BundleRegistry::with_animation(Arc::new(FsBundleBackend::new()), Arc::new(EventSystem::new()), animation);
    let reports = Arc::new(Mutex::new(Vec::new()));

    let sink = reports.clone();
    let registry = content.clone();
    let callback = group_callback(move |group| {
        let sink = sink.clone();
        let registry = registry.clone();
        async move {
            let report = registry.ingest_group(&group).await;
            sink.lock().unwrap().push(report);
            Ok(())
        }
    });

    let request = DiscoveryRequest::new(vec![dir.to_path_buf()]).with_extension(".pll");
    bundles.load_all(request, Some(callback)).await.unwrap();
    let reports = reports.lock().unwrap().clone();
    reports
}

#[tokio::test]
async fn group_ingestion_registers_mod_packs_and_fingerprints() {
    let root = TempDir::new().unwrap();
    write_container(
        root.path(),
        "forest_a",
        json!({ "streamed_scene": true, "scenes": ["Assets/Levels/Forest_A.unity"] }),
    );
    write_container(
        root.path(),
        "forest_b",
        json!({
            "assets": {
                "mod.json": format!("\u{FEFF}{}", forest_manifest()),
                "Assets/Levels/Forest_A.unity": ""
            }
        }),
    );

    let events = Arc::new(EventSystem::new());
    let registrations = recorded_registrations(&events).await;
    let content = Arc::new(ContentRegistry::new(events, true));
    let reports = ingest_directory(root.path(), &content).await;

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.group_name, "Forest_a");
    assert_eq!(report.scenes_added, 1);
    assert_eq!(report.new_bundle_hashes, 2);

    let packs = content.packs();
    assert_eq!(packs.len(), 2);
    assert_eq!(packs[0].pack_name, "Forest Pack_seg-a");
    assert_eq!(packs[0].id, "seg-a");
    assert_eq!(packs[0].group_name, "Forest_a");
    assert_eq!(packs[0].spawn_mappings[0].spawner_marker, "Marker_1");
    assert_eq!(packs[0].campfire_prefab_name, None);
    assert_eq!(packs[1].pack_name, "Forest Pack_2");
    assert_eq!(packs[1].id.len(), 36);
    assert_eq!(packs[1].campfire_prefab_name.as_deref(), Some("Campfire"));

    let crate_entry = content.spawnable("Crate").unwrap();
    assert_eq!(crate_entry.group_name, "Forest_a");
    assert_eq!(crate_entry.prefab_name, "crate_small");

    let mods = content.mods();
    assert_eq!(mods.len(), 1);
    let names: Vec<&str> = mods[0].contents().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Forest Pack_2", "Forest Pack_seg-a"]);
    for item in mods[0].contents() {
        assert_eq!(item.kind, ContentKind::Custom);
        assert_eq!(item.tag_names(), vec!["Snow", "Night", "Custom"]);
    }

    assert_eq!(content.tags_named("NIGHT").len(), 1);
    assert_eq!(content.tags_named("snow")[0].color, TagColor { r: 0x80, g: 0xc0, b: 0xff, a: 255 });
    assert_eq!(content.contents_by_tag("custom").len(), 2);

    let by_mod: Vec<String> = content.mod_defined_tags("Forest Pack").iter().map(|t| t.name.clone()).collect();
    let by_group: Vec<String> = content.mod_defined_tags("Forest_a").iter().map(|t| t.name.clone()).collect();
    assert_eq!(by_mod, vec!["Snow", "Night"]);
    assert_eq!(by_group, by_mod);

    assert_eq!(content.level_scene_names(), vec!["Forest_A"]);
    let mut bundle_names = content.loaded_bundle_names();
    bundle_names.sort();
    assert_eq!(bundle_names, vec!["forest_a.pll", "forest_b.pll"]);
    assert!(content.loaded_bundle_hashes().iter().all(|h| h.len() == 64));

    let registrations = registrations.lock().unwrap();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].group_name, "Forest_a");
    assert_eq!(registrations[0].pack_count, 2);
}

#[tokio::test]
async fn repeated_passes_do_not_duplicate_fingerprints_or_scenes() {
    let root = TempDir::new().unwrap();
    write_container(
        root.path(),
        "cave",
        json!({ "streamed_scene": true, "scenes": ["Assets/Cave.unity", "Assets/Cave_Deep.unity"] }),
    );

    let content = Arc::new(ContentRegistry::new(Arc::new(EventSystem::new()), true));
    let first = ingest_directory(root.path(), &content).await;
    let second = ingest_directory(root.path(), &content).await;

    assert_eq!(first[0].new_bundle_hashes, 1);
    assert_eq!(second[0].new_bundle_hashes, 0);
    assert_eq!(second[0].scenes_added, 0);
    assert!(second[0].manifest.is_none());
    assert_eq!(content.level_scene_names(), vec!["Cave", "Cave_Deep"]);
    assert_eq!(content.loaded_bundle_hashes().len(), 1);
    assert_eq!(content.mod_count(), 0);
}

#[tokio::test]
async fn equally_named_tags_from_two_mods_share_one_instance() {
    let content = ContentRegistry::new(Arc::new(EventSystem::new()), true);
    for (name, tag) in [("beta", "custom"), ("Alpha", "CUSTOM")] {
        let m = manifest(json!({
            "modName": name,
            "version": "1",
            "contentTags": [tag],
            "segments": [{ "index": 0, "id": name }]
        }));
        content.ingest_manifest(&m, "").await.unwrap();
    }

    let custom = content.tags_named("Custom");
    assert_eq!(custom.len(), 1);
    for m in content.mods() {
        for item in m.contents() {
            assert!(item.tags.iter().all(|t| Arc::ptr_eq(t, &custom[0])));
        }
    }

    let names: Vec<String> = content.mods().into_iter().map(|m| m.name).collect();
    assert_eq!(names, vec!["Alpha", "beta"]);
    assert_eq!(content.contents_by_tag("CUSTOM").len(), 2);
    assert_eq!(content.tag_names(), vec!["custom"]);
}

#[tokio::test]
async fn rejected_manifests_leave_the_registry_untouched() {
    let content = ContentRegistry::new(Arc::new(EventSystem::new()), true);

    let no_segments = manifest(json!({ "modName": "Empty", "segments": [] }));
    let result = content.ingest_manifest(&no_segments, "Empty").await;
    assert!(matches!(result, Err(ContentError::ManifestRejected(_))));

    let no_name = manifest(json!({ "segments": [{ "index": 0 }] }));
    assert!(content.ingest_manifest(&no_name, "").await.is_err());

    assert_eq!(content.mod_count(), 0);
    assert!(content.packs().is_empty());
    assert!(content.mod_defined_tags("Empty").is_empty());
}

#[tokio::test]
async fn missing_version_still_registers() {
    let content = ContentRegistry::new(Arc::new(EventSystem::new()), true);
    let m = manifest(json!({ "modName": "Loose", "segments": [{ "index": 3 }] }));
    let report = content.ingest_manifest(&m, "").await.unwrap();

    assert_eq!(report.contents_registered, 1);
    let mods = content.mods();
    assert_eq!(mods[0].version, "0.0.1");
    assert_eq!(mods[0].author, "Unknown");
    // Without a group the pack needs nothing loaded before it applies.
    assert_eq!(content.packs()[0].required_group(), None);
}

#[tokio::test]
async fn disabled_customs_keep_packs_out_of_the_collection() {
    let content = ContentRegistry::new(Arc::new(EventSystem::new()), false);
    let report = content.ingest_manifest(&manifest(forest_manifest()), "Forest").await.unwrap();

    assert_eq!(report.packs.len(), 2);
    assert_eq!(report.total_packs, 0);
    assert!(content.packs().is_empty());
    assert_eq!(content.mod_count(), 1);
}

#[tokio::test]
async fn duplicate_segment_ids_collapse() {
    let content = ContentRegistry::new(Arc::new(EventSystem::new()), true);
    let m = manifest(json!({
        "modName": "Twin",
        "version": "1",
        "segments": [
            { "index": 0, "id": "same", "biome": "first" },
            { "index": 1, "id": "same", "biome": "second" }
        ]
    }));
    let report = content.ingest_manifest(&m, "Twin").await.unwrap();

    assert_eq!(report.packs.len(), 2);
    assert_eq!(report.contents_registered, 1);
    assert_eq!(report.total_packs, 1);
    assert_eq!(content.packs()[0].biome, "first");
}

#[tokio::test]
async fn received_packs_merge_first_seen() {
    let content = ContentRegistry::new(Arc::new(EventSystem::new()), true);
    content.ingest_manifest(&manifest(forest_manifest()), "Forest").await.unwrap();

    let incoming = vec![
        LevelPack {
            id: "seg-a".into(),
            pack_name: "Renamed".into(),
            ..Default::default()
        },
        LevelPack {
            pack_name: "Remote_0".into(),
            ..Default::default()
        },
    ];
    assert_eq!(content.add_packs(&incoming), 3);
    assert_eq!(content.add_packs(&[]), 3);
    let names: Vec<String> = content.packs().into_iter().map(|p| p.pack_name).collect();
    assert_eq!(names, vec!["Forest Pack_seg-a", "Forest Pack_2", "Remote_0"]);
}

#[tokio::test]
async fn dump_lists_mods_with_their_tags() {
    let content = ContentRegistry::new(Arc::new(EventSystem::new()), true);
    content.ingest_manifest(&manifest(forest_manifest()), "Forest").await.unwrap();

    let dump = content.dump();
    assert!(dump.starts_with("==== Content Dump ===="));
    assert!(dump.contains("Mods: 1"));
    assert!(dump.contains(" - Mod: Forest Pack (Author: Ana)"));
    assert!(dump.contains("   - Content: Forest Pack_seg-a (Type: Custom, Tags: Snow,Night,Custom)"));
    assert!(dump.trim_end().ends_with("==== End Dump ===="));
}
