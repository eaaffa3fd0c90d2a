//! # Pack Sync
//!
//! Keeps every peer of a session on the same level packs. The session
//! authority broadcasts its pack collection; followers wait for the bundle
//! groups those packs need, apply them and acknowledge. See
//! [`PackSyncChannel`] for the protocol.

pub mod channel;
pub mod error;
pub mod events;
pub mod local;
pub mod transport;
pub mod wire;

#[cfg(test)]
mod tests;

pub use channel::{BroadcastOutcome, InboundOutcome, PackSyncChannel, SyncSettings};
pub use error::SyncError;
pub use events::{BroadcastCompleteEvent, BROADCAST_COMPLETE, SYNC_NAMESPACE};
pub use local::{LocalPeer, LocalSession};
pub use transport::{Envelope, GroupReadiness, PackApplier, SessionTransport};
pub use wire::{PeerId, WireMessage, PACKS_APPLIED_ACK_CODE, SYNC_PACKS_CODE};
