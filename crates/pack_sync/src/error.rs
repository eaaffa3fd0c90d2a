//! Error types for pack synchronisation.

use crate::wire::PeerId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Not connected to a session")]
    NotInSession,

    #[error("Only the session authority can broadcast packs")]
    NotAuthority,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),

    #[error("Failed to apply packs: {0}")]
    Apply(String),
}
