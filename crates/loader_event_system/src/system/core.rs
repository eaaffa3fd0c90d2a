/// Core EventSystem implementation
use super::stats::EventSystemStats;
use crate::events::EventHandler;
use compact_str::CompactString;
use dashmap::DashMap;
use std::sync::Arc;

/// The hub that routes events to every handler registered under a key.
///
/// Handlers live in a concurrent map keyed by `namespace:event`, so
/// registration and emission never contend on a single lock.
pub struct EventSystem {
    /// Map of event keys to their registered handlers
    pub(super) handlers: DashMap<CompactString, Vec<Arc<dyn EventHandler>>>,
    /// System statistics for monitoring
    pub(super) stats: tokio::sync::RwLock<EventSystemStats>,
}

impl std::fmt::Debug for EventSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSystem")
            .field("keys", &self.handlers.len())
            .field("stats", &"[stats]")
            .finish()
    }
}

impl Default for EventSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSystem {
    /// Creates a new event system with no registered handlers.
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            stats: tokio::sync::RwLock::new(EventSystemStats::default()),
        }
    }

    /// Returns a snapshot of the current statistics.
    pub async fn stats(&self) -> EventSystemStats {
        self.stats.read().await.clone()
    }

    pub(super) fn event_key(namespace: &str, event_name: &str) -> CompactString {
        let mut key = CompactString::new(namespace);
        key.push(':');
        key.push_str(event_name);
        key
    }
}
