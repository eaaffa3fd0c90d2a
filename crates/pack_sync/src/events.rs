//! Events published by the sync channel.

use serde::{Deserialize, Serialize};

pub const SYNC_NAMESPACE: &str = "sync";
pub const BROADCAST_COMPLETE: &str = "broadcast_complete";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastCompleteEvent {
    pub send_id: String,
    pub expected_acks: usize,
    pub acknowledged: usize,
    pub confirmed: bool,
}
