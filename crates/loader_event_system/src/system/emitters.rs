/// Event emission
use super::core::EventSystem;
use crate::events::{panic_message, Event, EventError};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error};

/// Outcome of a single emission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    /// Handlers that completed without error
    pub delivered: usize,
    /// Handlers that returned an error or panicked
    pub failed: usize,
}

impl EmitReport {
    /// True when no handler was registered for the key.
    pub fn is_empty(&self) -> bool {
        self.delivered == 0 && self.failed == 0
    }
}

impl EventSystem {
    /// Emits `event` to every handler registered under `namespace:event_name`.
    ///
    /// Handlers run concurrently. A failing or panicking handler is logged and
    /// counted; it never prevents delivery to the others. The only error this
    /// returns is a payload that cannot be serialized.
    pub async fn emit<T>(&self, namespace: &str, event_name: &str, event: &T) -> Result<EmitReport, EventError>
    where
        T: Event,
    {
        let event_key = Self::event_key(namespace, event_name);
        let data = event.to_payload()?;

        let event_handlers = self.handlers.get(&event_key).map(|entry| entry.value().clone());
        let mut report = EmitReport::default();

        if let Some(event_handlers) = event_handlers {
            debug!("📤 Emitting {} to {} handlers", event_key, event_handlers.len());

            let mut futures = FuturesUnordered::new();
            for handler in event_handlers.iter() {
                let handler = handler.clone();
                let data = &data;
                futures.push(async move {
                    let outcome = AssertUnwindSafe(handler.handle(data)).catch_unwind().await;
                    let result = match outcome {
                        Ok(result) => result,
                        Err(panic) => Err(EventError::HandlerPanicked(panic_message(panic.as_ref()))),
                    };
                    (handler.name().to_string(), result)
                });
            }

            while let Some((handler_name, result)) = futures.next().await {
                match result {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        error!("❌ Handler {} failed: {}", handler_name, e);
                        report.failed += 1;
                    }
                }
            }
        } else {
            debug!("No handlers for event: {}", event_key);
        }

        let mut stats = self.stats.write().await;
        stats.events_emitted += 1;
        stats.deliveries += report.delivered as u64;
        stats.handler_failures += report.failed as u64;

        Ok(report)
    }
}
