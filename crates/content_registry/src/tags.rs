//! Tag deduplication and the tag-name indices.
//!
//! Two merge passes run in order. The per-mod pass walks a mod's content from
//! the last item backward, so the last declaration of a name becomes that
//! mod's canonical instance. The global pass then walks every mod forward in
//! registration order and rewrites later declarations to the first one seen.
//! Afterwards every case-insensitive tag name resolves to one shared instance.

use crate::content::ContentItem;
use crate::mod_descriptor::ModDescriptor;
use crate::tag::TagRef;
use std::collections::HashMap;
use std::sync::Arc;

/// Rewrites every tag in `descriptor` to the mod's canonical instance.
pub fn merge_mod_tags(descriptor: &mut ModDescriptor) {
    let mut canonical = HashMap::new();
    for content in descriptor.contents_mut().iter_mut().rev() {
        for tag in content.tags.iter_mut().rev() {
            canonicalize(&mut canonical, tag);
        }
    }
}

/// Rewrites every tag across `mods` to the first instance registered.
pub fn merge_all_tags(mods: &mut [ModDescriptor]) {
    let mut canonical = HashMap::new();
    for descriptor in mods.iter_mut() {
        for content in descriptor.contents_mut().iter_mut() {
            for tag in content.tags.iter_mut() {
                canonicalize(&mut canonical, tag);
            }
        }
    }
}

fn canonicalize(canonical: &mut HashMap<String, TagRef>, tag: &mut TagRef) {
    // Unnamed tags are never shared.
    let Some(key) = tag.key() else {
        return;
    };
    match canonical.get(&key) {
        Some(existing) => {
            if !Arc::ptr_eq(existing, tag) {
                *tag = existing.clone();
            }
        }
        None => {
            canonical.insert(key, tag.clone());
        }
    }
}

/// Position of a content item inside the registry's mod list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentRef {
    pub mod_index: usize,
    pub content_index: usize,
}

/// Lowercased tag name to distinct tag instances and to tagged content.
#[derive(Debug, Default)]
pub struct TagIndex {
    tags: HashMap<String, Vec<TagRef>>,
    contents: HashMap<String, Vec<ContentRef>>,
}

impl TagIndex {
    /// Drops every entry and indexes `mods` from scratch.
    pub fn rebuild(&mut self, mods: &[ModDescriptor]) {
        self.tags.clear();
        self.contents.clear();

        for (mod_index, descriptor) in mods.iter().enumerate() {
            for (content_index, content) in descriptor.contents().iter().enumerate() {
                self.index_content(ContentRef { mod_index, content_index }, content);
            }
        }
    }

    fn index_content(&mut self, at: ContentRef, content: &ContentItem) {
        for tag in &content.tags {
            let Some(key) = tag.key() else {
                continue;
            };
            let instances = self.tags.entry(key.clone()).or_default();
            if !instances.iter().any(|t| Arc::ptr_eq(t, tag)) {
                instances.push(tag.clone());
            }
            let tagged = self.contents.entry(key).or_default();
            if !tagged.contains(&at) {
                tagged.push(at);
            }
        }
    }

    pub fn tags_named(&self, name: &str) -> &[TagRef] {
        self.tags
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contents_tagged(&self, name: &str) -> &[ContentRef] {
        self.contents
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn tag_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tags.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentItem, ContentKind};
    use crate::tag::ContentTag;

    fn descriptor(name: &str, items: &[(&str, &[&str])]) -> ModDescriptor {
        let mut m = ModDescriptor::new(Some(name), Some("tester"), None);
        for (item, tags) in items {
            let content = ContentItem::new(*item, ContentKind::Vanilla)
                .with_tags(tags.iter().map(|t| ContentTag::create(t)));
            m.try_register(content);
        }
        m
    }

    fn tag<'a>(m: &'a ModDescriptor, content: usize, tag: usize) -> &'a TagRef {
        &m.contents()[content].tags[tag]
    }

    #[test]
    fn per_mod_merge_picks_the_last_declaration() {
        let mut m = descriptor("forest", &[("a", &["Night"]), ("b", &["night"]), ("c", &["NIGHT"])]);
        let last = tag(&m, 2, 0).clone();
        merge_mod_tags(&mut m);

        for i in 0..3 {
            assert!(Arc::ptr_eq(tag(&m, i, 0), &last));
        }
        assert_eq!(tag(&m, 0, 0).name, "NIGHT");
    }

    #[test]
    fn per_mod_merge_is_idempotent() {
        let mut m = descriptor("forest", &[("a", &["x", "y"]), ("b", &["Y", "z"]), ("c", &["X"])]);
        merge_mod_tags(&mut m);
        let once: Vec<Vec<TagRef>> = m.contents().iter().map(|c| c.tags.clone()).collect();
        merge_mod_tags(&mut m);

        for (content, expected) in m.contents().iter().zip(&once) {
            for (actual, expected) in content.tags.iter().zip(expected) {
                assert!(Arc::ptr_eq(actual, expected));
            }
        }
    }

    #[test]
    fn global_merge_shares_one_instance_across_mods() {
        let mut mods = vec![
            descriptor("alpha", &[("a", &["custom"])]),
            descriptor("beta", &[("b", &["CUSTOM"])]),
        ];
        merge_all_tags(&mut mods);

        let first = tag(&mods[0], 0, 0);
        let second = tag(&mods[1], 0, 0);
        assert!(Arc::ptr_eq(first, second));
        assert_eq!(second.name, "custom");
    }

    #[test]
    fn unnamed_tags_are_left_alone_and_unindexed() {
        let mut mods = vec![descriptor("alpha", &[("a", &["", "Cave"]), ("b", &[""])])];
        let unnamed = tag(&mods[0], 0, 0).clone();
        merge_all_tags(&mut mods);
        assert!(Arc::ptr_eq(tag(&mods[0], 0, 0), &unnamed));
        assert!(!Arc::ptr_eq(tag(&mods[0], 1, 0), &unnamed));

        let mut index = TagIndex::default();
        index.rebuild(&mods);
        assert_eq!(index.tag_names(), vec!["cave"]);
        assert!(index.tags_named("").is_empty());
    }

    #[test]
    fn index_counts_distinct_instances_and_items() {
        let mut mods = vec![
            descriptor("alpha", &[("a", &["Cave"]), ("b", &["cave"])]),
            descriptor("beta", &[("c", &["CAVE"])]),
        ];
        let mut index = TagIndex::default();
        index.rebuild(&mods);
        assert_eq!(index.tags_named("cave").len(), 3);

        for m in mods.iter_mut() {
            merge_mod_tags(m);
        }
        merge_all_tags(&mut mods);
        index.rebuild(&mods);
        assert_eq!(index.tags_named("Cave").len(), 1);
        assert_eq!(
            index.contents_tagged("CAVE"),
            &[
                ContentRef { mod_index: 0, content_index: 0 },
                ContentRef { mod_index: 0, content_index: 1 },
                ContentRef { mod_index: 1, content_index: 0 },
            ]
        );
    }

    #[test]
    fn rebuild_drops_stale_entries() {
        let mut index = TagIndex::default();
        index.rebuild(&[descriptor("alpha", &[("a", &["Old"])])]);
        assert_eq!(index.contents_tagged("old").len(), 1);

        index.rebuild(&[descriptor("alpha", &[("a", &["New"])])]);
        assert!(index.contents_tagged("old").is_empty());
        assert!(index.tags_named("old").is_empty());
        assert_eq!(index.tag_names(), vec!["new"]);
    }
}
