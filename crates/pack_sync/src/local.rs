//! An in-process session hub. Every peer gets an unbounded inbox, so
//! delivery is reliable and ordered per sender.

use crate::error::SyncError;
use crate::transport::{Envelope, SessionTransport};
use crate::wire::PeerId;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct SessionInner {
    peers: DashMap<PeerId, mpsc::UnboundedSender<Envelope>>,
    authority: Mutex<Option<PeerId>>,
    next_id: AtomicU32,
}

impl SessionInner {
    fn authority(&self) -> Option<PeerId> {
        *self.authority.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_authority(&self, peer: Option<PeerId>) {
        *self.authority.lock().unwrap_or_else(PoisonError::into_inner) = peer;
    }
}

/// A session shared by the peers created from it. The first peer to join
/// becomes the authority; when the authority leaves, the lowest remaining id
/// takes over.
#[derive(Debug, Clone, Default)]
pub struct LocalSession {
    inner: Arc<SessionInner>,
}

impl LocalSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self) -> (Arc<LocalPeer>, mpsc::UnboundedReceiver<Envelope>) {
        let id = PeerId(self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let (sender, inbox) = mpsc::unbounded_channel();
        self.inner.peers.insert(id, sender);
        {
            let mut authority = self.inner.authority.lock().unwrap_or_else(PoisonError::into_inner);
            if authority.is_none() {
                *authority = Some(id);
            }
        }
        info!("🔗 {} joined the session ({} member(s))", id, self.inner.peers.len());

        let peer = Arc::new(LocalPeer {
            id,
            session: self.inner.clone(),
        });
        (peer, inbox)
    }

    pub fn leave(&self, peer: PeerId) {
        if self.inner.peers.remove(&peer).is_none() {
            return;
        }
        if self.inner.authority() == Some(peer) {
            let next = self.inner.peers.iter().map(|entry| *entry.key()).min();
            self.inner.set_authority(next);
            if let Some(next) = next {
                info!("👑 Authority moved from {} to {}", peer, next);
            }
        }
        info!("🔌 {} left the session", peer);
    }

    pub fn set_authority(&self, peer: PeerId) {
        if self.inner.peers.contains_key(&peer) {
            self.inner.set_authority(Some(peer));
        }
    }

    pub fn authority(&self) -> Option<PeerId> {
        self.inner.authority()
    }

    pub fn member_count(&self) -> usize {
        self.inner.peers.len()
    }
}

#[derive(Debug)]
pub struct LocalPeer {
    id: PeerId,
    session: Arc<SessionInner>,
}

#[async_trait]
impl SessionTransport for LocalPeer {
    fn local_id(&self) -> PeerId {
        self.id
    }

    fn in_session(&self) -> bool {
        self.session.peers.contains_key(&self.id)
    }

    fn authority(&self) -> Option<PeerId> {
        self.session.authority()
    }

    fn member_count(&self) -> usize {
        self.session.peers.len()
    }

    async fn send_to_others(&self, payload: Vec<u8>) -> Result<usize, SyncError> {
        if !self.in_session() {
            return Err(SyncError::NotInSession);
        }
        let targets: Vec<(PeerId, mpsc::UnboundedSender<Envelope>)> = self
            .session
            .peers
            .iter()
            .filter(|entry| *entry.key() != self.id)
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut reached = 0;
        for (peer, sender) in targets {
            let envelope = Envelope {
                from: self.id,
                payload: payload.clone(),
            };
            if sender.send(envelope).is_ok() {
                reached += 1;
            } else {
                debug!("Inbox of {} is closed", peer);
            }
        }
        Ok(reached)
    }

    async fn send_to(&self, peer: PeerId, payload: Vec<u8>) -> Result<(), SyncError> {
        let sender = self
            .session
            .peers
            .get(&peer)
            .map(|entry| entry.value().clone())
            .ok_or(SyncError::UnknownPeer(peer))?;
        sender
            .send(Envelope { from: self.id, payload })
            .map_err(|_| SyncError::Transport(format!("inbox of {} is closed", peer)))
    }
}
