//! Arena service
//!
//! Explicitly constructed owner of the hub, the stage controller, the
//! result engine and the intake and reveal workflows. Handlers receive a
//! reference to it; nothing is reached through process globals.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::config::ArenaConfig;
use crate::error::ArenaResult;
use crate::hub::{
    BroadcastHub, ChannelSubscriber, CountdownCallback, SharedBroadcastHub, Subscriber,
    SubscriberId,
};
use crate::results::ResultEngine;
use crate::reveal::RevealWorkflow;
use crate::stage::{SharedStageController, StageController};
use crate::state::{ClassId, MemoryStore, SharedContestStore};
use crate::submissions::SubmissionDesk;

pub struct ArenaService {
    config: ArenaConfig,
    store: SharedContestStore,
    hub: SharedBroadcastHub,
    controller: SharedStageController,
    engine: Arc<ResultEngine>,
    desk: SubmissionDesk,
    reveal: RevealWorkflow,
}

impl ArenaService {
    pub fn new(config: ArenaConfig, store: SharedContestStore) -> Self {
        let hub = BroadcastHub::with_tick(config.tick_interval()).shared();
        let controller = StageController::new(Arc::clone(&store), Arc::clone(&hub)).shared();
        let engine = Arc::new(ResultEngine::new(Arc::clone(&store)));
        let desk = SubmissionDesk::new(Arc::clone(&store), Arc::clone(&hub));
        let reveal = RevealWorkflow::new(
            Arc::clone(&controller),
            Arc::clone(&engine),
            Arc::clone(&hub),
        );
        info!(
            tick_ms = config.tick_interval_ms,
            default_countdown_secs = config.default_countdown_secs,
            "Arena service started"
        );
        Self {
            config,
            store,
            hub,
            controller,
            engine,
            desk,
            reveal,
        }
    }

    /// Build a service over a [`MemoryStore`], loaded from the configured
    /// snapshot when one is set.
    pub async fn from_config(config: ArenaConfig) -> ArenaResult<Self> {
        let store = match &config.snapshot_path {
            Some(path) => MemoryStore::load(path).await?,
            None => MemoryStore::new(),
        };
        Ok(Self::new(config, store.shared()))
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedContestStore {
        &self.store
    }

    pub fn hub(&self) -> &SharedBroadcastHub {
        &self.hub
    }

    pub fn controller(&self) -> &StageController {
        &self.controller
    }

    pub fn engine(&self) -> &ResultEngine {
        &self.engine
    }

    pub fn desk(&self) -> &SubmissionDesk {
        &self.desk
    }

    pub fn reveal(&self) -> &RevealWorkflow {
        &self.reveal
    }

    /// Attach an in-process subscriber sized from config.
    pub fn subscribe(&self, class_id: Option<ClassId>) -> (SubscriberId, mpsc::Receiver<String>) {
        let (subscriber, receiver) = ChannelSubscriber::new(self.config.subscriber_buffer);
        let id = subscriber.id();
        self.hub.connect(subscriber, class_id);
        (id, receiver)
    }

    /// Start a class countdown, falling back to the configured length.
    pub fn start_countdown(
        &self,
        class_id: ClassId,
        duration_secs: Option<u64>,
        on_complete: Option<CountdownCallback>,
    ) {
        let secs = duration_secs.unwrap_or(self.config.default_countdown_secs);
        self.hub.start_countdown(class_id, secs, on_complete);
    }

    /// Stop every countdown and drop every subscriber.
    pub fn shutdown(&self) {
        self.hub.shutdown();
        info!("Arena service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Contest, ContestStage};

    #[tokio::test]
    async fn test_service_wires_components() {
        let store = MemoryStore::new().shared();
        store.put_contest(Contest::new(1, 7, "Motion", "Blue", "Red")).await;
        let service = ArenaService::new(ArenaConfig::default(), store);

        let (_id, mut rx) = service.subscribe(Some(7));
        service
            .controller()
            .set_stage(7, ContestStage::PreVoting, Some(1))
            .await
            .unwrap();
        assert!(rx.try_recv().unwrap().contains("debate_update"));
        assert_eq!(service.hub().subscriber_count(Some(7)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_countdown_and_shutdown() {
        let config = ArenaConfig {
            default_countdown_secs: 45,
            ..ArenaConfig::default()
        };
        let service = ArenaService::new(config, MemoryStore::new().shared());
        service.start_countdown(3, None, None);
        assert_eq!(service.hub().get_countdown(3), Some(45));

        let (_id, _rx) = service.subscribe(None);
        service.shutdown();
        assert_eq!(service.hub().get_countdown(3), None);
        assert_eq!(service.hub().subscriber_count(None), 0);
    }

    #[tokio::test]
    async fn test_from_config_loads_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arena.json");
        let seed = MemoryStore::new();
        seed.put_contest(Contest::new(4, 2, "Motion", "A", "B")).await;
        seed.save(&path).await.unwrap();

        let config = ArenaConfig {
            snapshot_path: Some(path),
            ..ArenaConfig::default()
        };
        let service = ArenaService::from_config(config).await.unwrap();
        assert!(service.store().get_contest(4).await.unwrap().is_some());
    }
}
