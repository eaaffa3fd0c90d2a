//! Protocol scenarios over an in-process session, on tokio's paused clock.

use crate::channel::{InboundOutcome, PackSyncChannel, SyncSettings};
use crate::error::SyncError;
use crate::events::{BroadcastCompleteEvent, BROADCAST_COMPLETE, SYNC_NAMESPACE};
use crate::local::{LocalPeer, LocalSession};
use crate::transport::{Envelope, GroupReadiness, PackApplier, SessionTransport};
use crate::wire::{PeerId, WireMessage};
use async_trait::async_trait;
use content_registry::LevelPack;
use loader_event_system::EventSystem;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Default)]
struct RecordingApplier {
    applied: Mutex<Vec<Vec<LevelPack>>>,
    fail: bool,
}

#[async_trait]
impl PackApplier for RecordingApplier {
    async fn apply(&self, packs: &[LevelPack]) -> Result<(), SyncError> {
        self.applied.lock().unwrap().push(packs.to_vec());
        if self.fail {
            return Err(SyncError::Apply("scene missing".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct LoadedGroups {
    loaded: Mutex<HashSet<String>>,
}

impl LoadedGroups {
    fn mark_loaded(&self, group: &str) {
        self.loaded.lock().unwrap().insert(group.to_lowercase());
    }
}

impl GroupReadiness for LoadedGroups {
    fn is_group_loaded(&self, group_name: &str) -> bool {
        self.loaded.lock().unwrap().contains(&group_name.to_lowercase())
    }
}

struct Peer {
    transport: Arc<LocalPeer>,
    inbox: mpsc::UnboundedReceiver<Envelope>,
    channel: Arc<PackSyncChannel>,
    applier: Arc<RecordingApplier>,
    groups: Arc<LoadedGroups>,
}

fn join(session: &LocalSession, applier: RecordingApplier) -> Peer {
    let (transport, inbox) = session.join();
    let applier = Arc::new(applier);
    let groups = Arc::new(LoadedGroups::default());
    let channel = Arc::new(PackSyncChannel::new(
        transport.clone(),
        applier.clone(),
        groups.clone(),
        Arc::new(EventSystem::new()),
        SyncSettings::default(),
    ));
    Peer {
        transport,
        inbox,
        channel,
        applier,
        groups,
    }
}

fn pack(name: &str, group: &str) -> LevelPack {
    LevelPack {
        pack_name: name.to_string(),
        id: format!("{}-id", name),
        group_name: group.to_string(),
        ..Default::default()
    }
}

fn ack(send_id: &str, responder: PeerId) -> Vec<u8> {
    WireMessage::PacksAppliedAck {
        send_id: send_id.to_string(),
        responder_id: responder,
    }
    .encode()
    .unwrap()
}

async fn next_send_id(inbox: &mut mpsc::UnboundedReceiver<Envelope>) -> String {
    let envelope = inbox.recv().await.unwrap();
    match WireMessage::decode(&envelope.payload).unwrap() {
        WireMessage::SyncPacks { send_id, .. } => send_id,
        other => panic!("expected a pack sync, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn followers_apply_and_acknowledge_over_a_live_session() {
    let session = LocalSession::new();
    let host = join(&session, RecordingApplier::default());
    let followers = vec![join(&session, RecordingApplier::default()), join(&session, RecordingApplier::default())];

    let completions = Arc::new(Mutex::new(Vec::new()));
    let events = Arc::new(EventSystem::new());
    let sink = completions.clone();
    events
        .on(SYNC_NAMESPACE, BROADCAST_COMPLETE, move |event: BroadcastCompleteEvent| {
            sink.lock().unwrap().push(event);
            Ok(())
        })
        .await
        .unwrap();
    let host_channel = Arc::new(PackSyncChannel::new(
        host.transport.clone(),
        host.applier.clone(),
        host.groups.clone(),
        events,
        SyncSettings::default(),
    ));

    tokio::spawn(host_channel.clone().run(host.inbox));
    let mut appliers = Vec::new();
    for follower in followers {
        appliers.push(follower.applier.clone());
        tokio::spawn(follower.channel.clone().run(follower.inbox));
    }

    let packs = vec![pack("Forest_1", ""), pack("Forest_2", "")];
    let outcome = host_channel.broadcast(&packs, true).await.unwrap();

    assert!(outcome.confirmed);
    assert_eq!((outcome.acknowledged, outcome.expected_acks), (2, 2));
    for applier in appliers {
        assert_eq!(applier.applied.lock().unwrap().as_slice(), &[packs.clone()]);
    }
    assert!(host.applier.applied.lock().unwrap().is_empty());

    let completions = completions.lock().unwrap();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].send_id, outcome.send_id);
    assert!(completions[0].confirmed);
}

#[tokio::test(start_paused = true)]
async fn acks_arriving_in_time_confirm_the_broadcast() {
    let session = LocalSession::new();
    let host = join(&session, RecordingApplier::default());
    let mut first = join(&session, RecordingApplier::default());
    let second = join(&session, RecordingApplier::default());

    let started = Instant::now();
    let channel = host.channel.clone();
    let broadcast = tokio::spawn(async move { channel.broadcast(&[pack("p", "")], true).await });
    let send_id = next_send_id(&mut first.inbox).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    host.channel
        .handle_inbound(first.transport.local_id(), &ack(&send_id, first.transport.local_id()))
        .await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    host.channel
        .handle_inbound(second.transport.local_id(), &ack(&send_id, second.transport.local_id()))
        .await;

    let outcome = broadcast.await.unwrap().unwrap();
    assert!(outcome.confirmed);
    assert_eq!(outcome.acknowledged, 2);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn missing_acks_time_out_as_a_soft_failure() {
    let session = LocalSession::new();
    let host = join(&session, RecordingApplier::default());
    let mut first = join(&session, RecordingApplier::default());
    let _silent = join(&session, RecordingApplier::default());

    let started = Instant::now();
    let channel = host.channel.clone();
    let broadcast = tokio::spawn(async move { channel.broadcast(&[pack("p", "")], true).await });
    let send_id = next_send_id(&mut first.inbox).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    host.channel
        .handle_inbound(first.transport.local_id(), &ack(&send_id, first.transport.local_id()))
        .await;

    let outcome = broadcast.await.unwrap().unwrap();
    assert!(!outcome.confirmed);
    assert_eq!((outcome.acknowledged, outcome.expected_acks), (1, 2));
    assert!(started.elapsed() >= Duration::from_secs(12));
}

#[tokio::test(start_paused = true)]
async fn stale_and_duplicate_acks_do_not_count() {
    let session = LocalSession::new();
    let host = join(&session, RecordingApplier::default());
    let mut follower = join(&session, RecordingApplier::default());
    let newcomer = PeerId(42);

    host.channel.broadcast(&[pack("p", "")], false).await.unwrap();
    let old_id = next_send_id(&mut follower.inbox).await;
    let outcome = host.channel.broadcast(&[pack("p", "")], false).await.unwrap();
    assert!(outcome.confirmed);
    assert_eq!(outcome.acknowledged, 0);

    assert_eq!(
        host.channel.handle_inbound(newcomer, &ack(&old_id, newcomer)).await,
        InboundOutcome::AckDiscarded
    );
    assert_eq!(host.channel.acknowledged(), 0);

    let current = outcome.send_id.to_uppercase();
    let responder = follower.transport.local_id();
    for _ in 0..2 {
        assert_eq!(
            host.channel.handle_inbound(responder, &ack(&current, responder)).await,
            InboundOutcome::AckRecorded {
                acknowledged: 1,
                expected: 1
            }
        );
    }
}

#[tokio::test(start_paused = true)]
async fn only_the_authority_in_a_session_may_broadcast() {
    let session = LocalSession::new();
    let host = join(&session, RecordingApplier::default());
    let mut follower = join(&session, RecordingApplier::default());

    let denied = follower.channel.broadcast(&[pack("p", "")], true).await;
    assert!(matches!(denied, Err(SyncError::NotAuthority)));

    session.leave(follower.transport.local_id());
    let detached = follower.channel.broadcast(&[pack("p", "")], true).await;
    assert!(matches!(detached, Err(SyncError::NotInSession)));

    let mut host_inbox = host.inbox;
    assert!(host_inbox.try_recv().is_err());
    assert!(follower.inbox.try_recv().is_err());

    // Acks reaching a peer that is not the authority are dropped.
    let (other, _other_inbox) = session.join();
    session.set_authority(other.local_id());
    let from = PeerId(7);
    assert_eq!(
        host.channel.handle_inbound(from, &ack("anything", from)).await,
        InboundOutcome::AckDiscarded
    );
}

#[tokio::test(start_paused = true)]
async fn follower_waits_for_required_groups_before_applying() {
    let session = LocalSession::new();
    let mut host = join(&session, RecordingApplier::default());
    let follower = join(&session, RecordingApplier::default());

    let groups = follower.groups.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        groups.mark_loaded("forest_a");
    });

    let payload = WireMessage::SyncPacks {
        send_id: "round-1".into(),
        packs: vec![pack("a", "Forest_A"), pack("free", "")],
    }
    .encode()
    .unwrap();
    let started = Instant::now();
    let outcome = follower.channel.handle_inbound(host.transport.local_id(), &payload).await;

    assert_eq!(
        outcome,
        InboundOutcome::Applied {
            send_id: "round-1".into(),
            groups_ready: true
        }
    );
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(follower.applier.applied.lock().unwrap().len(), 1);

    let reply = host.inbox.recv().await.unwrap();
    assert_eq!(reply.from, follower.transport.local_id());
    assert_eq!(
        WireMessage::decode(&reply.payload).unwrap(),
        WireMessage::PacksAppliedAck {
            send_id: "round-1".into(),
            responder_id: follower.transport.local_id()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn follower_applies_and_acks_even_when_groups_never_load() {
    let session = LocalSession::new();
    let mut host = join(&session, RecordingApplier::default());
    let follower = join(
        &session,
        RecordingApplier {
            fail: true,
            ..Default::default()
        },
    );

    let payload = WireMessage::SyncPacks {
        send_id: "round-2".into(),
        packs: vec![pack("a", "Never")],
    }
    .encode()
    .unwrap();
    let started = Instant::now();
    let outcome = follower.channel.handle_inbound(host.transport.local_id(), &payload).await;

    assert_eq!(
        outcome,
        InboundOutcome::Applied {
            send_id: "round-2".into(),
            groups_ready: false
        }
    );
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(10) && waited < Duration::from_secs(11));
    assert_eq!(follower.applier.applied.lock().unwrap().len(), 1);
    assert!(host.inbox.recv().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn packs_without_groups_apply_immediately() {
    let session = LocalSession::new();
    let host = join(&session, RecordingApplier::default());
    let follower = join(&session, RecordingApplier::default());

    let payload = WireMessage::SyncPacks {
        send_id: "round-3".into(),
        packs: vec![pack("free", "")],
    }
    .encode()
    .unwrap();
    let started = Instant::now();
    follower.channel.handle_inbound(host.transport.local_id(), &payload).await;
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn empty_and_malformed_payloads_are_ignored() {
    let session = LocalSession::new();
    let mut host = join(&session, RecordingApplier::default());
    let follower = join(&session, RecordingApplier::default());
    let from = host.transport.local_id();

    let empty = WireMessage::SyncPacks {
        send_id: "round-4".into(),
        packs: Vec::new(),
    }
    .encode()
    .unwrap();
    assert_eq!(follower.channel.handle_inbound(from, &empty).await, InboundOutcome::Ignored);
    assert_eq!(follower.channel.handle_inbound(from, b"{not json").await, InboundOutcome::Ignored);

    assert!(follower.applier.applied.lock().unwrap().is_empty());
    assert!(host.inbox.try_recv().is_err());
}
