//! Wiring of the loader's long-lived services.

use crate::config::AppConfig;
use crate::readiness::OnDemandGroups;
use bundle_system::{BundleRegistry, FsBundleBackend};
use content_registry::ContentRegistry;
use loader_event_system::{create_event_system, EventSystem};
use pack_sync::{LocalSession, PackSyncChannel, PeerId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A simulated follower with its own pack collection.
pub struct Follower {
    pub channel: Arc<PackSyncChannel>,
    pub content: Arc<ContentRegistry>,
}

/// Everything one loader process runs: the bundle and content registries,
/// and the pack sync channel of the local peer plus any simulated followers
/// sharing its in-process session.
pub struct LoaderServices {
    pub events: Arc<EventSystem>,
    pub bundles: Arc<BundleRegistry>,
    pub content: Arc<ContentRegistry>,
    pub session: LocalSession,
    pub sync: Arc<PackSyncChannel>,
    pub followers: Vec<Follower>,
    tasks: Vec<JoinHandle<()>>,
}

impl LoaderServices {
    /// Builds the services and starts an inbox task per peer. The local peer
    /// joins first and so holds authority.
    pub fn start(config: &AppConfig, simulated_peers: usize) -> Self {
        let events = create_event_system();
        let bundles = Arc::new(BundleRegistry::new(Arc::new(FsBundleBackend::new()), events.clone()));
        let content = Arc::new(ContentRegistry::new(events.clone(), config.loader.enable_customs));
        let readiness = Arc::new(OnDemandGroups::new(bundles.clone()));
        let settings = config.sync_settings();
        let session = LocalSession::new();
        let mut tasks = Vec::new();

        let (transport, inbox) = session.join();
        let sync = Arc::new(PackSyncChannel::new(
            transport,
            content.clone(),
            readiness.clone(),
            events.clone(),
            settings,
        ));
        tasks.push(tokio::spawn(sync.clone().run(inbox)));

        let mut followers = Vec::with_capacity(simulated_peers);
        for _ in 0..simulated_peers {
            let (transport, inbox) = session.join();
            let follower_content = Arc::new(ContentRegistry::new(events.clone(), config.loader.enable_customs));
            let channel = Arc::new(PackSyncChannel::new(
                transport,
                follower_content.clone(),
                readiness.clone(),
                events.clone(),
                settings,
            ));
            tasks.push(tokio::spawn(channel.clone().run(inbox)));
            debug!("👥 Simulated follower {} joined", channel.local_id());
            followers.push(Follower {
                channel,
                content: follower_content,
            });
        }

        info!(
            "📡 Session ready: {} member(s), authority {}",
            session.member_count(),
            sync.local_id()
        );

        Self {
            events,
            bundles,
            content,
            session,
            sync,
            followers,
            tasks,
        }
    }

    pub fn local_id(&self) -> PeerId {
        self.sync.local_id()
    }

    /// Leaves the session with every peer and stops the inbox tasks.
    pub fn shutdown(&mut self) {
        for follower in &self.followers {
            self.session.leave(follower.channel.local_id());
        }
        self.session.leave(self.sync.local_id());
        for task in self.tasks.drain(..) {
            task.abort();
        }
        info!("🔌 Left the session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_registry::LevelPack;

    fn pack(name: &str) -> LevelPack {
        LevelPack {
            pack_name: name.to_string(),
            ..LevelPack::default()
        }
    }

    #[tokio::test]
    async fn followers_receive_the_authority_broadcast() {
        let mut services = LoaderServices::start(&AppConfig::default(), 2);
        assert_eq!(services.session.member_count(), 3);
        assert_eq!(services.session.authority(), Some(services.local_id()));

        let packs = vec![pack("Forest_1"), pack("Forest_2")];
        services.content.add_packs(&packs);
        let outcome = services.sync.broadcast(&services.content.packs(), true).await.unwrap();
        assert!(outcome.confirmed);
        assert_eq!(outcome.acknowledged, 2);

        for follower in &services.followers {
            assert_eq!(follower.content.packs(), packs);
        }

        services.shutdown();
        assert_eq!(services.session.member_count(), 0);
    }

    #[tokio::test]
    async fn a_lone_authority_confirms_immediately() {
        let mut services = LoaderServices::start(&AppConfig::default(), 0);
        let outcome = services.sync.broadcast(&[pack("Solo")], true).await.unwrap();
        assert!(outcome.confirmed);
        assert_eq!(outcome.expected_acks, 0);
        services.shutdown();
    }
}
