//! Event payloads, handlers and the bus error type.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::any::Any;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, warn};

/// A value that can travel over the bus.
///
/// The payload is encoded once per emission and decoded separately by each
/// handler, so every handler owns its copy.
pub trait Event: Send + Sync + Debug + 'static {
    /// Type label used in handler names and diagnostics.
    fn event_type() -> &'static str
    where
        Self: Sized;

    fn to_payload(&self) -> Result<Vec<u8>, EventError>;

    fn from_payload(payload: &[u8]) -> Result<Self, EventError>
    where
        Self: Sized;
}

/// Every serde type is an event, carried as JSON.
impl<T> Event for T
where
    T: Serialize + DeserializeOwned + Send + Sync + Debug + 'static,
{
    fn event_type() -> &'static str {
        std::any::type_name::<T>()
    }

    fn to_payload(&self) -> Result<Vec<u8>, EventError> {
        serde_json::to_vec(self).map_err(|e| {
            error!("🔴 Could not encode {} event {:?}: {}", Self::event_type(), self, e);
            EventError::Serialization(e)
        })
    }

    fn from_payload(payload: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(payload).map_err(EventError::Deserialization)
    }
}

/// Something registered under a `namespace:event` key.
///
/// [`EventSystem::on`](crate::EventSystem::on) covers the common case of a
/// plain closure; implement this directly for handlers that need their own
/// state or decoding.
#[async_trait]
pub trait EventHandler: Send + Sync + Debug + 'static {
    async fn handle(&self, payload: &[u8]) -> Result<(), EventError>;

    /// Name used by [`EventSystem::off`](crate::EventSystem::off) to find
    /// the handler again.
    fn name(&self) -> &str;
}

/// Decodes the payload as `T` and calls a synchronous closure with it.
pub struct FnHandler<T, F> {
    name: String,
    callback: F,
    _event: PhantomData<fn(T)>,
}

impl<T, F> FnHandler<T, F>
where
    T: Event,
    F: Fn(T) -> Result<(), EventError> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, callback: F) -> Self {
        Self {
            name: name.into(),
            callback,
            _event: PhantomData,
        }
    }
}

impl<T, F> Debug for FnHandler<T, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<T, F> EventHandler for FnHandler<T, F>
where
    T: Event,
    F: Fn(T) -> Result<(), EventError> + Send + Sync + 'static,
{
    async fn handle(&self, payload: &[u8]) -> Result<(), EventError> {
        // A payload of some other shape under the same key is skipped.
        let event = match T::from_payload(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!("🟡 Handler '{}' skipped a payload it cannot read as {}: {}", self.name, T::event_type(), e);
                return Ok(());
            }
        };

        catch_unwind(AssertUnwindSafe(|| (self.callback)(event)))
            .unwrap_or_else(|panic| Err(EventError::HandlerPanicked(panic_message(panic.as_ref()))))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    match (payload.downcast_ref::<&str>(), payload.downcast_ref::<String>()) {
        (Some(message), _) => (*message).to_string(),
        (None, Some(message)) => message.clone(),
        (None, None) => "non-string panic payload".to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Deserialization error: {0}")]
    Deserialization(serde_json::Error),
    /// The handler reported a failure of its own
    #[error("Handler execution error: {0}")]
    HandlerExecution(String),
    #[error("Handler panicked: {0}")]
    HandlerPanicked(String),
}
