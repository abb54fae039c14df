//! Reveal behavior when the result calculation fails.
//!
//! The stage commit must stand even if computing the result does not.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arena::state::{Debater, JudgeScore, RosterCounts, VoteRecord, VoteTally};
use arena::{
    ArenaError, ArenaResult, BroadcastHub, ChannelSubscriber, ClassId, Contest, ContestId,
    ContestStage, ContestStore, MemoryStore, ResultEngine, RevealWorkflow, StageController,
    StageState, UserId,
};
use async_trait::async_trait;

/// Memory store whose score reads can be switched to fail.
struct FlakyStore {
    inner: MemoryStore,
    fail_scores: AtomicBool,
}

#[async_trait]
impl ContestStore for FlakyStore {
    async fn load_stage(&self, class_id: ClassId) -> ArenaResult<Option<StageState>> {
        self.inner.load_stage(class_id).await
    }

    async fn save_stage(&self, state: &StageState) -> ArenaResult<()> {
        self.inner.save_stage(state).await
    }

    async fn get_contest(&self, contest_id: ContestId) -> ArenaResult<Option<Contest>> {
        self.inner.get_contest(contest_id).await
    }

    async fn latest_contest(&self, class_id: ClassId) -> ArenaResult<Option<Contest>> {
        self.inner.latest_contest(class_id).await
    }

    async fn get_debater(&self, debater_id: UserId) -> ArenaResult<Option<Debater>> {
        self.inner.get_debater(debater_id).await
    }

    async fn roster_counts(&self, class_id: ClassId) -> ArenaResult<RosterCounts> {
        self.inner.roster_counts(class_id).await
    }

    async fn vote_tally(&self, contest_id: ContestId) -> ArenaResult<VoteTally> {
        self.inner.vote_tally(contest_id).await
    }

    async fn judge_scores(&self, contest_id: ContestId) -> ArenaResult<Vec<JudgeScore>> {
        if self.fail_scores.load(Ordering::SeqCst) {
            return Err(ArenaError::Store("scores table unavailable".into()));
        }
        self.inner.judge_scores(contest_id).await
    }

    async fn insert_vote(&self, vote: VoteRecord) -> ArenaResult<()> {
        self.inner.insert_vote(vote).await
    }

    async fn insert_score(&self, score: JudgeScore) -> ArenaResult<()> {
        self.inner.insert_score(score).await
    }

    async fn delete_class(&self, class_id: ClassId) -> ArenaResult<()> {
        self.inner.delete_class(class_id).await
    }
}

#[tokio::test]
async fn test_calculation_failure_keeps_reveal_commit() {
    let inner = MemoryStore::new();
    inner.put_contest(Contest::new(1, 7, "Motion", "Blue", "Red")).await;
    let store = Arc::new(FlakyStore {
        inner,
        fail_scores: AtomicBool::new(false),
    });
    let hub = BroadcastHub::new().shared();
    let controller = StageController::new(store.clone(), hub.clone()).shared();
    let engine = Arc::new(ResultEngine::new(store.clone()));
    let reveal = RevealWorkflow::new(controller.clone(), engine, hub.clone());

    controller
        .set_stage(7, ContestStage::ResultsSealed, Some(1))
        .await
        .unwrap();
    let (room, mut room_rx) = ChannelSubscriber::new(16);
    hub.connect(room, Some(7));

    store.fail_scores.store(true, Ordering::SeqCst);
    let outcome = reveal.reveal(7).await.unwrap();
    assert!(outcome.result.is_none());
    assert_eq!(outcome.state.current_stage, ContestStage::ResultsRevealed);

    let stored = store.load_stage(7).await.unwrap().unwrap();
    assert_eq!(stored.current_stage, ContestStage::ResultsRevealed);
    assert!(stored.results_revealed);

    let mut kinds = Vec::new();
    while let Ok(text) = room_rx.try_recv() {
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        kinds.push(value["type"].as_str().unwrap().to_string());
    }
    assert!(!kinds.iter().any(|k| k == "results_reveal"));
    assert!(kinds.iter().any(|k| k == "STATE_UPDATE"));

    // The read path recovers once the store does.
    assert!(reveal.results(1).await.is_err());
    store.fail_scores.store(false, Ordering::SeqCst);
    let result = reveal.results(1).await.unwrap();
    assert_eq!(result.contest_id, 1);
}

#[tokio::test]
async fn test_deleted_class_starts_over() {
    let store = MemoryStore::new().shared();
    store.put_contest(Contest::new(1, 7, "Motion", "Blue", "Red")).await;
    let hub = BroadcastHub::new().shared();
    let controller = StageController::new(store.clone(), hub);
    controller
        .set_stage(7, ContestStage::ResultsSealed, Some(1))
        .await
        .unwrap();

    store.delete_class(7).await.unwrap();
    assert!(!controller.can_reveal(7).await.unwrap());
    assert!(store.get_contest(1).await.unwrap().is_none());
    let state = controller.get_state(7).await.unwrap();
    assert_eq!(state.current_stage, ContestStage::Idle);
}
