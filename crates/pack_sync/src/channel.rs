//! Reliable pack broadcast with acknowledgements.
//!
//! The authority sends its packs to every other member under a fresh send id
//! and, when asked to, polls until every follower has acknowledged that id or
//! the ack timeout passes. A follower waits (bounded) for the groups the
//! packs need, applies them, and acknowledges even when the wait timed out.
//! Acks for any other send id, and acks arriving at a peer that is no longer
//! the authority, are dropped.

use crate::error::SyncError;
use crate::events::{BroadcastCompleteEvent, BROADCAST_COMPLETE, SYNC_NAMESPACE};
use crate::transport::{Envelope, GroupReadiness, PackApplier, SessionTransport};
use crate::wire::{PeerId, WireMessage};
use content_registry::LevelPack;
use loader_event_system::EventSystem;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Timing for ack collection and group readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub ack_timeout: Duration,
    pub ack_poll_interval: Duration,
    pub group_ready_timeout: Duration,
    pub group_ready_poll_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(12),
            ack_poll_interval: Duration::from_millis(150),
            group_ready_timeout: Duration::from_secs(10),
            group_ready_poll_interval: Duration::from_millis(250),
        }
    }
}

/// Result of one broadcast. `confirmed` is false when the ack wait timed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub send_id: String,
    pub expected_acks: usize,
    pub acknowledged: usize,
    pub confirmed: bool,
}

/// What handling one inbound payload amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Packs were applied and acknowledged. `groups_ready` is false when the
    /// group wait timed out first.
    Applied { send_id: String, groups_ready: bool },
    AckRecorded { acknowledged: usize, expected: usize },
    AckDiscarded,
    Ignored,
}

#[derive(Debug, Default)]
struct AckRound {
    send_id: Option<String>,
    expected: usize,
    received: HashSet<PeerId>,
}

pub struct PackSyncChannel {
    transport: Arc<dyn SessionTransport>,
    applier: Arc<dyn PackApplier>,
    readiness: Arc<dyn GroupReadiness>,
    events: Arc<EventSystem>,
    settings: SyncSettings,
    round: Mutex<AckRound>,
}

impl std::fmt::Debug for PackSyncChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackSyncChannel")
            .field("transport", &self.transport)
            .field("settings", &self.settings)
            .finish()
    }
}

impl PackSyncChannel {
    pub fn new(
        transport: Arc<dyn SessionTransport>,
        applier: Arc<dyn PackApplier>,
        readiness: Arc<dyn GroupReadiness>,
        events: Arc<EventSystem>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            transport,
            applier,
            readiness,
            events,
            settings,
            round: Mutex::new(AckRound::default()),
        }
    }

    pub fn local_id(&self) -> PeerId {
        self.transport.local_id()
    }

    fn round(&self) -> MutexGuard<'_, AckRound> {
        self.round.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acks received so far for the current round.
    pub fn acknowledged(&self) -> usize {
        self.round().received.len()
    }

    /// Sends `packs` to every other member. Fails without sending when this
    /// peer is not in a session or not its authority. With `wait_for_acks`
    /// the call resolves once every follower has acknowledged or the ack
    /// timeout passes; without it, it resolves as confirmed right away.
    pub async fn broadcast(&self, packs: &[LevelPack], wait_for_acks: bool) -> Result<BroadcastOutcome, SyncError> {
        if !self.transport.in_session() {
            warn!("⚠️ Cannot broadcast packs: not in a session");
            return Err(SyncError::NotInSession);
        }
        if !self.transport.is_authority() {
            warn!("⚠️ Cannot broadcast packs: {} is not the authority", self.local_id());
            return Err(SyncError::NotAuthority);
        }

        let send_id = Uuid::new_v4().to_string();
        let expected = self.transport.member_count().saturating_sub(1);
        {
            let mut round = self.round();
            round.send_id = Some(send_id.clone());
            round.expected = expected;
            round.received.clear();
        }

        let message = WireMessage::SyncPacks {
            send_id: send_id.clone(),
            packs: packs.to_vec(),
        };
        let reached = self.transport.send_to_others(message.encode()?).await?;
        info!(
            "📡 Broadcast {} pack(s) as {} to {} peer(s), expecting {} ack(s)",
            packs.len(),
            send_id,
            reached,
            expected
        );

        let outcome = if wait_for_acks {
            self.await_acks(send_id, expected).await
        } else {
            BroadcastOutcome {
                send_id,
                expected_acks: expected,
                acknowledged: self.acknowledged(),
                confirmed: true,
            }
        };

        if outcome.confirmed {
            info!("✅ Broadcast {} confirmed ({}/{})", outcome.send_id, outcome.acknowledged, expected);
        } else {
            warn!(
                "⚠️ Broadcast {} timed out with {}/{} ack(s)",
                outcome.send_id, outcome.acknowledged, expected
            );
        }
        self.publish(&outcome).await;
        Ok(outcome)
    }

    async fn await_acks(&self, send_id: String, expected: usize) -> BroadcastOutcome {
        let deadline = Instant::now() + self.settings.ack_timeout;
        loop {
            let acknowledged = self.acknowledged();
            if acknowledged >= expected {
                return BroadcastOutcome {
                    send_id,
                    expected_acks: expected,
                    acknowledged,
                    confirmed: true,
                };
            }
            if Instant::now() >= deadline {
                return BroadcastOutcome {
                    send_id,
                    expected_acks: expected,
                    acknowledged,
                    confirmed: false,
                };
            }
            tokio::time::sleep(self.settings.ack_poll_interval).await;
        }
    }

    /// Handles one payload from `from`. Malformed payloads are dropped.
    pub async fn handle_inbound(&self, from: PeerId, payload: &[u8]) -> InboundOutcome {
        match WireMessage::decode(payload) {
            Ok(WireMessage::SyncPacks { send_id, packs }) => self.on_sync_packs(from, send_id, packs).await,
            Ok(WireMessage::PacksAppliedAck { send_id, responder_id }) => self.on_ack(&send_id, responder_id),
            Err(e) => {
                warn!("⚠️ Dropping malformed payload from {}: {}", from, e);
                InboundOutcome::Ignored
            }
        }
    }

    async fn on_sync_packs(&self, from: PeerId, send_id: String, packs: Vec<LevelPack>) -> InboundOutcome {
        if packs.is_empty() {
            warn!("⚠️ Ignoring empty pack sync {} from {}", send_id, from);
            return InboundOutcome::Ignored;
        }

        let groups_ready = self.wait_for_groups(&packs).await;
        match self.applier.apply(&packs).await {
            Ok(()) => info!("📥 Applied {} pack(s) from sync {}", packs.len(), send_id),
            Err(e) => error!("❌ Failed to apply packs from sync {}: {}", send_id, e),
        }

        self.acknowledge(&send_id).await;
        InboundOutcome::Applied { send_id, groups_ready }
    }

    /// Polls until every group the packs need is loaded. False on timeout.
    async fn wait_for_groups(&self, packs: &[LevelPack]) -> bool {
        let mut required: Vec<&str> = packs.iter().filter_map(LevelPack::required_group).collect();
        required.sort_unstable();
        required.dedup();
        if required.is_empty() {
            return true;
        }

        let deadline = Instant::now() + self.settings.group_ready_timeout;
        loop {
            let missing: Vec<&str> = required
                .iter()
                .copied()
                .filter(|group| !self.readiness.is_group_loaded(group))
                .collect();
            if missing.is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                warn!("⚠️ Groups still not loaded, applying anyway: {}", missing.join(", "));
                return false;
            }
            tokio::time::sleep(self.settings.group_ready_poll_interval).await;
        }
    }

    async fn acknowledge(&self, send_id: &str) {
        let Some(authority) = self.transport.authority() else {
            warn!("⚠️ No authority to acknowledge sync {} to", send_id);
            return;
        };
        let ack = WireMessage::PacksAppliedAck {
            send_id: send_id.to_string(),
            responder_id: self.local_id(),
        };
        let sent = match ack.encode() {
            Ok(bytes) => self.transport.send_to(authority, bytes).await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            error!("❌ Failed to acknowledge sync {} to {}: {}", send_id, authority, e);
        }
    }

    fn on_ack(&self, send_id: &str, responder: PeerId) -> InboundOutcome {
        if !self.transport.is_authority() {
            debug!("Ignoring ack from {}: not the authority", responder);
            return InboundOutcome::AckDiscarded;
        }

        let mut round = self.round();
        let current = round
            .send_id
            .as_deref()
            .is_some_and(|current| current.eq_ignore_ascii_case(send_id));
        if !current {
            debug!("Ignoring stale ack {} from {}", send_id, responder);
            return InboundOutcome::AckDiscarded;
        }
        if !round.received.insert(responder) {
            debug!("Duplicate ack from {}", responder);
        }
        info!("🤝 Ack from {} ({}/{})", responder, round.received.len(), round.expected);
        InboundOutcome::AckRecorded {
            acknowledged: round.received.len(),
            expected: round.expected,
        }
    }

    /// Handles every envelope from `inbox` until it closes. Each envelope
    /// runs on its own task so a follower waiting for groups does not hold up
    /// acks.
    pub async fn run(self: Arc<Self>, mut inbox: mpsc::UnboundedReceiver<Envelope>) {
        while let Some(envelope) = inbox.recv().await {
            let channel = Arc::clone(&self);
            tokio::spawn(async move {
                channel.handle_inbound(envelope.from, &envelope.payload).await;
            });
        }
        debug!("Inbox of {} closed", self.local_id());
    }

    async fn publish(&self, outcome: &BroadcastOutcome) {
        let event = BroadcastCompleteEvent {
            send_id: outcome.send_id.clone(),
            expected_acks: outcome.expected_acks,
            acknowledged: outcome.acknowledged,
            confirmed: outcome.confirmed,
        };
        if let Err(e) = self.events.emit(SYNC_NAMESPACE, BROADCAST_COMPLETE, &event).await {
            error!("❌ Failed to publish {}:{}: {}", SYNC_NAMESPACE, BROADCAST_COMPLETE, e);
        }
    }
}
