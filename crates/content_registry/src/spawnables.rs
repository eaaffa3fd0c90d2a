//! Named spawnables and the groups that provide them.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnableEntry {
    pub name: String,
    pub group_name: String,
    pub prefab_name: String,
}

/// Name to spawnable. A later registration under a name replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct SpawnableRegistry {
    entries: HashMap<String, SpawnableEntry>,
}

impl SpawnableRegistry {
    pub fn register(&mut self, name: &str, group_name: &str, prefab_name: &str) {
        self.entries.insert(
            name.to_string(),
            SpawnableEntry {
                name: name.to_string(),
                group_name: group_name.to_string(),
                prefab_name: prefab_name.to_string(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&SpawnableEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::SpawnableRegistry;

    #[test]
    fn last_registration_wins() {
        let mut registry = SpawnableRegistry::default();
        registry.register("Crate", "Forest", "crate_a");
        registry.register("Crate", "Cave", "crate_b");
        let entry = registry.get("Crate").unwrap();
        assert_eq!((entry.group_name.as_str(), entry.prefab_name.as_str()), ("Cave", "crate_b"));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("crate").is_none());
    }
}
