//! Content tags.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// RGBA colour in 0-255 channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl TagColor {
    pub const WHITE: TagColor = TagColor { r: 255, g: 255, b: 255, a: 255 };

    /// Parses `#RRGGBB`, `#RRGGBBAA` or the same without `#`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        match digits.len() {
            6 => Some(Self { r: channel(0)?, g: channel(2)?, b: channel(4)?, a: 255 }),
            8 => Some(Self { r: channel(0)?, g: channel(2)?, b: channel(4)?, a: channel(6)? }),
            _ => None,
        }
    }
}

impl Default for TagColor {
    fn default() -> Self {
        Self::WHITE
    }
}

/// A named label attached to content. Names compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTag {
    pub name: String,
    pub color: TagColor,
}

/// Tags are shared: after a merge pass every equivalent declaration points
/// at one instance.
pub type TagRef = Arc<ContentTag>;

impl ContentTag {
    pub fn create(name: &str) -> TagRef {
        Self::create_with_color(name, TagColor::WHITE)
    }

    pub fn create_with_color(name: &str, color: TagColor) -> TagRef {
        Arc::new(ContentTag {
            name: name.to_string(),
            color,
        })
    }

    /// Lookup key: the lowercased name, or `None` for an unnamed tag.
    pub fn key(&self) -> Option<String> {
        if self.name.is_empty() {
            None
        } else {
            Some(self.name.to_lowercase())
        }
    }
}

/// One white tag per non-empty name.
pub fn create_content_tags<S: AsRef<str>>(names: &[S]) -> Vec<TagRef> {
    names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !name.is_empty())
        .map(ContentTag::create)
        .collect()
}
