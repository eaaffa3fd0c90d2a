//! Messages exchanged between session peers.

use crate::error::SyncError;
use content_registry::LevelPack;
use serde::{Deserialize, Serialize};

/// Session-scoped identity of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

pub const SYNC_PACKS_CODE: u8 = 200;
pub const PACKS_APPLIED_ACK_CODE: u8 = 201;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireMessage {
    /// Authority to every other peer.
    SyncPacks { send_id: String, packs: Vec<LevelPack> },
    /// Follower to the authority once the packs have been applied.
    PacksAppliedAck { send_id: String, responder_id: PeerId },
}

impl WireMessage {
    pub fn code(&self) -> u8 {
        match self {
            WireMessage::SyncPacks { .. } => SYNC_PACKS_CODE,
            WireMessage::PacksAppliedAck { .. } => PACKS_APPLIED_ACK_CODE,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, SyncError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SyncError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
