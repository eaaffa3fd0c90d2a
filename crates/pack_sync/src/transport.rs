//! The seams between the sync channel and its host: the session transport,
//! local pack application and group readiness.

use crate::error::SyncError;
use crate::wire::PeerId;
use async_trait::async_trait;
use bundle_system::BundleRegistry;
use content_registry::{ContentRegistry, LevelPack};

/// A payload received from another peer.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: PeerId,
    pub payload: Vec<u8>,
}

/// Reliable, ordered-per-sender delivery between the members of one session.
/// Nothing is cached for peers that join later.
#[async_trait]
pub trait SessionTransport: Send + Sync + std::fmt::Debug {
    fn local_id(&self) -> PeerId;

    fn in_session(&self) -> bool;

    /// The current authority, if the session has one.
    fn authority(&self) -> Option<PeerId>;

    fn is_authority(&self) -> bool {
        self.authority() == Some(self.local_id())
    }

    /// Members including the local peer.
    fn member_count(&self) -> usize;

    /// Sends to every member except the local peer. Returns how many were reached.
    async fn send_to_others(&self, payload: Vec<u8>) -> Result<usize, SyncError>;

    async fn send_to(&self, peer: PeerId, payload: Vec<u8>) -> Result<(), SyncError>;
}

/// Applies received packs to the local session.
#[async_trait]
pub trait PackApplier: Send + Sync {
    async fn apply(&self, packs: &[LevelPack]) -> Result<(), SyncError>;
}

/// Answers whether a bundle group is fully loaded locally.
pub trait GroupReadiness: Send + Sync {
    fn is_group_loaded(&self, group_name: &str) -> bool;
}

#[async_trait]
impl PackApplier for ContentRegistry {
    async fn apply(&self, packs: &[LevelPack]) -> Result<(), SyncError> {
        self.add_packs(packs);
        Ok(())
    }
}

impl GroupReadiness for BundleRegistry {
    fn is_group_loaded(&self, group_name: &str) -> bool {
        BundleRegistry::is_group_loaded(self, group_name)
    }
}
