//! A mod and the content it owns.

use crate::content::{ContentItem, ContentKind};
use crate::tag::ContentTag;
use tracing::warn;

pub const CUSTOM_TAG: &str = "Custom";

#[derive(Debug, Clone)]
pub struct ModDescriptor {
    pub name: String,
    pub author: String,
    pub version: String,
    pub aliases: Vec<String>,
    contents: Vec<ContentItem>,
}

impl ModDescriptor {
    /// Blank values fall back to `Unspecified`, `Unknown` and `0.0.1`.
    pub fn new(name: Option<&str>, author: Option<&str>, version: Option<&str>) -> Self {
        let pick = |value: Option<&str>, fallback: &str| match value {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => fallback.to_string(),
        };
        Self {
            name: pick(name, "Unspecified"),
            author: pick(author, "Unknown"),
            version: pick(version, "0.0.1"),
            aliases: Vec::new(),
            contents: Vec::new(),
        }
    }

    pub fn contents(&self) -> &[ContentItem] {
        &self.contents
    }

    pub(crate) fn contents_mut(&mut self) -> &mut [ContentItem] {
        &mut self.contents
    }

    /// Takes ownership of `content`. Content already registered under the
    /// same identity is rejected. Custom content gains a `Custom` tag.
    pub fn try_register(&mut self, mut content: ContentItem) -> bool {
        content.set_owner(&self.name, &self.author);
        let id = content.unique_id();
        if self.contents.iter().any(|c| c.unique_id() == id) {
            warn!("⚠️ Content {} already registered in {}", content.name, self.name);
            return false;
        }
        if content.kind == ContentKind::Custom {
            content.tags.push(ContentTag::create(CUSTOM_TAG));
        }
        self.contents.push(content);
        true
    }

    pub fn unregister_all(&mut self) {
        self.contents.clear();
    }

    /// Sorts content by name, case-insensitive.
    pub fn sort_contents(&mut self) {
        self.contents.sort_by_key(|c| c.name.to_lowercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_content_gets_custom_tag_and_identity() {
        let mut m = ModDescriptor::new(Some("Forest Pack"), Some("Ana"), None);
        assert_eq!(m.version, "0.0.1");
        let unregistered = ContentItem::new("Clearing", ContentKind::Custom);
        assert!(!unregistered.has_tag(CUSTOM_TAG));
        assert!(m.try_register(unregistered));
        assert!(m.try_register(ContentItem::new("Boulder", ContentKind::Vanilla)));

        let clearing = &m.contents()[0];
        assert!(clearing.has_tag("custom"));
        assert_eq!(clearing.unique_id(), "ana.forest pack.clearing");
        assert!(!m.contents()[1].has_tag(CUSTOM_TAG));
    }

    #[test]
    fn duplicate_identity_is_rejected_case_insensitively() {
        let mut m = ModDescriptor::new(Some("Forest"), None, None);
        assert!(m.try_register(ContentItem::new("Clearing", ContentKind::Vanilla)));
        assert!(!m.try_register(ContentItem::new("CLEARING", ContentKind::Vanilla)));
        assert_eq!(m.contents().len(), 1);
    }

    #[test]
    fn registration_order_is_kept_until_sorted() {
        let mut m = ModDescriptor::new(Some("Forest"), None, None);
        for name in ["cedar", "Ash", "birch"] {
            m.try_register(ContentItem::new(name, ContentKind::Vanilla));
        }
        let names = |m: &ModDescriptor| m.contents().iter().map(|c| c.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&m), vec!["cedar", "Ash", "birch"]);
        m.sort_contents();
        assert_eq!(names(&m), vec!["Ash", "birch", "cedar"]);
    }
}
