//! Error types for the bundle system.

use loader_event_system::EventError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BundleSystemError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Bundle format error: {0}")]
    FormatError(String),

    #[error("Bundle classification error: {0}")]
    ClassificationError(String),

    #[error("Bundle not found: {0}")]
    BundleNotFound(String),

    #[error("Event system error: {0}")]
    EventSystemError(String),

    #[error("Group callback error: {0}")]
    CallbackError(String),
}

impl From<EventError> for BundleSystemError {
    fn from(error: EventError) -> Self {
        BundleSystemError::EventSystemError(error.to_string())
    }
}
