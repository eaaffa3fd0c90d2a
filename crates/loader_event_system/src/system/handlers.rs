/// Event handler registration and removal
use super::core::EventSystem;
use crate::events::{Event, EventError, EventHandler, FnHandler};
use compact_str::CompactString;
use std::sync::Arc;
use tracing::info;

impl EventSystem {
    /// Registers a handler for `namespace:event_name`.
    ///
    /// The handler name is derived from the key and the event type.
    pub async fn on<T, F>(&self, namespace: &str, event_name: &str, handler: F) -> Result<(), EventError>
    where
        T: Event + 'static,
        F: Fn(T) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let event_key = Self::event_key(namespace, event_name);
        let handler_name = format!("{}::{}", event_key, T::event_type());
        self.register_fn(event_key, handler_name, handler).await
    }

    /// Registers a handler under an explicit name so it can later be removed
    /// with [`EventSystem::off`].
    pub async fn on_named<T, F>(
        &self,
        namespace: &str,
        event_name: &str,
        handler_name: &str,
        handler: F,
    ) -> Result<(), EventError>
    where
        T: Event + 'static,
        F: Fn(T) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let event_key = Self::event_key(namespace, event_name);
        self.register_fn(event_key, handler_name.to_string(), handler)
            .await
    }

    /// Registers a pre-built handler.
    pub async fn register_handler(
        &self,
        namespace: &str,
        event_name: &str,
        handler: Arc<dyn EventHandler>,
    ) {
        let event_key = Self::event_key(namespace, event_name);
        self.insert_handler(event_key, handler).await;
    }

    /// Removes every handler named `handler_name` from `namespace:event_name`.
    /// Returns how many were removed.
    pub async fn off(&self, namespace: &str, event_name: &str, handler_name: &str) -> usize {
        let event_key = Self::event_key(namespace, event_name);
        let removed = match self.handlers.get_mut(&event_key) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|handler| handler.name() != handler_name);
                before - entry.len()
            }
            None => 0,
        };
        self.handlers.remove_if(&event_key, |_, list| list.is_empty());

        if removed > 0 {
            let mut stats = self.stats.write().await;
            stats.total_handlers = stats.total_handlers.saturating_sub(removed);
            info!("🗑️ Removed {} handler(s) '{}' from {}", removed, handler_name, event_key);
        }
        removed
    }

    /// Number of handlers registered for `namespace:event_name`.
    pub fn handler_count(&self, namespace: &str, event_name: &str) -> usize {
        let event_key = Self::event_key(namespace, event_name);
        self.handlers
            .get(&event_key)
            .map(|entry| entry.value().len())
            .unwrap_or(0)
    }

    /// Gets all registered event keys.
    pub fn registered_events(&self) -> Vec<String> {
        self.handlers.iter().map(|entry| entry.key().to_string()).collect()
    }

    async fn register_fn<T, F>(
        &self,
        event_key: CompactString,
        handler_name: String,
        handler: F,
    ) -> Result<(), EventError>
    where
        T: Event + 'static,
        F: Fn(T) -> Result<(), EventError> + Send + Sync + 'static,
    {
        self.insert_handler(event_key, Arc::new(FnHandler::new(handler_name, handler)))
            .await;
        Ok(())
    }

    async fn insert_handler(&self, event_key: CompactString, handler: Arc<dyn EventHandler>) {
        self.handlers
            .entry(event_key.clone())
            .or_default()
            .push(handler);

        let mut stats = self.stats.write().await;
        stats.total_handlers += 1;

        info!("📝 Registered handler for {}", event_key);
    }
}
