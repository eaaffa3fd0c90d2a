//! # Loader Event System
//!
//! A small, type-safe publish/subscribe bus used by the bundle, content and
//! pack-sync services to tell each other what happened without holding direct
//! references to one another.
//!
//! ## Keys
//!
//! Handlers are registered under a `namespace:event` key:
//!
//! - `bundle:loaded` / `bundle:unloaded` - a single bundle file changed state
//! - `group:loaded` / `group:unloaded` / `group:status_changed` - group aggregates
//! - `registry:before_process` / `registry:groups_ready` - discovery pass milestones
//! - `content:mod_registered` - a mod was added to the content registry
//! - `sync:broadcast_complete` - the authority finished a manifest broadcast
//!
//! ## Subscriber isolation
//!
//! Every handler runs independently. A handler that returns an error or panics
//! is logged and counted in the [`EmitReport`], and the remaining handlers still
//! receive the event.
//!
//! ```rust,no_run
//! use loader_event_system::{EventSystem, Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Ping { value: u32 }
//!
//! # async fn demo() -> Result<(), loader_event_system::EventError> {
//! let events = EventSystem::new();
//! events.on("demo", "ping", |event: Ping| {
//!     println!("got {}", event.value);
//!     Ok(())
//! }).await?;
//! events.emit("demo", "ping", &Ping { value: 7 }).await?;
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod system;

pub use events::{panic_message, Event, EventError, EventHandler, FnHandler};
pub use system::{EmitReport, EventSystem, EventSystemStats};

pub use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
pub use std::sync::Arc;

/// Creates a shared event system instance.
pub fn create_event_system() -> Arc<EventSystem> {
    Arc::new(EventSystem::new())
}
