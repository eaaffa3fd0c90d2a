//! Content items registered by mods.

use crate::tag::{ContentTag, TagRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    Vanilla,
    Custom,
    Any,
}

/// Placement data carried by segment content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentData {
    pub index: i32,
    pub replace: bool,
    pub is_variant: bool,
    pub biome: String,
    pub prefab_name: String,
    pub campfire_prefab_name: Option<String>,
    pub pack_name: String,
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct ContentItem {
    pub name: String,
    pub kind: ContentKind,
    pub tags: Vec<TagRef>,
    pub segment: Option<SegmentData>,
    mod_name: String,
    author_name: String,
}

impl ContentItem {
    /// Creates an untagged item. A `ContentKind::Custom` item gains its
    /// `"Custom"` tag only once `ModDescriptor::try_register` accepts it.
    pub fn new(name: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            tags: Vec::new(),
            segment: None,
            mod_name: String::new(),
            author_name: String::new(),
        }
    }

    pub fn segment(name: impl Into<String>, data: SegmentData) -> Self {
        let mut item = Self::new(name, ContentKind::Custom);
        item.segment = Some(data);
        item
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = TagRef>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn mod_name(&self) -> &str {
        &self.mod_name
    }

    pub fn author_name(&self) -> &str {
        &self.author_name
    }

    pub(crate) fn set_owner(&mut self, mod_name: &str, author_name: &str) {
        self.mod_name = mod_name.to_string();
        self.author_name = author_name.to_string();
    }

    /// `author.mod.name`, lowercased.
    pub fn unique_id(&self) -> String {
        format!(
            "{}.{}.{}",
            self.author_name.to_lowercase(),
            self.mod_name.to_lowercase(),
            self.name.to_lowercase()
        )
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Adds a new white tag unless one with that name is present.
    pub fn try_add_tag(&mut self, name: &str) -> bool {
        if self.has_tag(name) {
            return false;
        }
        self.tags.push(ContentTag::create(name));
        true
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }
}
