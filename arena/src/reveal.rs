//! Results reveal
//!
//! Committing RESULTS_REVEALED and computing the result are separate steps.
//! Once the stage flip is committed it stands; if the calculation then
//! fails the `results_reveal` broadcast is skipped and the result can be
//! fetched later through [`RevealWorkflow::results`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::ArenaResult;
use crate::hub::{HubMessage, SharedBroadcastHub};
use crate::results::{ContestResult, ResultEngine};
use crate::stage::StageController;
use crate::state::{ClassId, ContestId, StageState};

/// What a reveal committed and, if calculation succeeded, what it showed
#[derive(Debug, Clone, Serialize)]
pub struct RevealOutcome {
    pub state: StageState,
    pub contest_id: ContestId,
    pub result: Option<ContestResult>,
}

pub struct RevealWorkflow {
    controller: Arc<StageController>,
    engine: Arc<ResultEngine>,
    hub: SharedBroadcastHub,
}

impl RevealWorkflow {
    pub fn new(
        controller: Arc<StageController>,
        engine: Arc<ResultEngine>,
        hub: SharedBroadcastHub,
    ) -> Self {
        Self {
            controller,
            engine,
            hub,
        }
    }

    /// Reveal a sealed class's results.
    ///
    /// Fails without side effects unless the class is sealed with every
    /// channel closed and a contest can be resolved.
    pub async fn reveal(&self, class_id: ClassId) -> ArenaResult<RevealOutcome> {
        let (state, contest_id) = self.controller.commit_reveal(class_id).await?;
        self.controller.publish_state_update(&state).await;

        let result = match self.engine.calculate_contest_result(contest_id).await {
            Ok(result) => {
                let report = self
                    .hub
                    .broadcast_to_class(class_id, &HubMessage::results_reveal(class_id, &result))
                    .await;
                info!(
                    class_id,
                    contest_id,
                    winner = %result.winning_team,
                    delivered = report.delivered,
                    "Results broadcast"
                );
                Some(result)
            }
            Err(e) => {
                warn!(
                    class_id,
                    contest_id,
                    code = e.code(),
                    "Result calculation failed after reveal: {}",
                    e
                );
                None
            }
        };

        Ok(RevealOutcome {
            state,
            contest_id,
            result,
        })
    }

    /// Read path for a contest's result, independent of the stage.
    pub async fn results(&self, contest_id: ContestId) -> ArenaResult<ContestResult> {
        self.engine.calculate_contest_result(contest_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{BroadcastHub, ChannelSubscriber};
    use crate::results::Winner;
    use crate::state::{Contest, ContestStage, ContestStore, MemoryStore, TeamSide, VotePhase, VoteRecord};
    use serde_json::Value;

    async fn workflow(store: Arc<MemoryStore>) -> (SharedBroadcastHub, Arc<StageController>, RevealWorkflow) {
        let hub = BroadcastHub::new().shared();
        let controller = StageController::new(store.clone(), hub.clone()).shared();
        let engine = Arc::new(ResultEngine::new(store));
        let reveal = RevealWorkflow::new(controller.clone(), engine, hub.clone());
        (hub, controller, reveal)
    }

    #[tokio::test]
    async fn test_reveal_requires_sealed_stage() {
        let store = MemoryStore::new().shared();
        store.put_contest(Contest::new(1, 7, "Motion", "Blue", "Red")).await;
        let (_hub, controller, reveal) = workflow(store.clone()).await;

        controller
            .set_stage(7, ContestStage::PostVoting, Some(1))
            .await
            .unwrap();
        let err = reveal.reveal(7).await.unwrap_err();
        assert_eq!(err.code(), "REVEAL_NOT_READY");
        let state = store.load_stage(7).await.unwrap().unwrap();
        assert_eq!(state.current_stage, ContestStage::PostVoting);
    }

    #[tokio::test]
    async fn test_reveal_broadcasts_state_then_results() {
        let store = MemoryStore::new().shared();
        store.put_contest(Contest::new(1, 7, "Motion", "Blue", "Red")).await;
        store
            .insert_vote(VoteRecord::new(1, 1, TeamSide::Pro, VotePhase::PostDebate))
            .await
            .unwrap();
        let (hub, controller, reveal) = workflow(store).await;
        controller
            .set_stage(7, ContestStage::ResultsSealed, Some(1))
            .await
            .unwrap();

        let (sub, mut rx) = ChannelSubscriber::new(8);
        hub.connect(sub, Some(7));
        let outcome = reveal.reveal(7).await.unwrap();
        assert_eq!(outcome.contest_id, 1);
        assert_eq!(outcome.result.as_ref().unwrap().winning_team, Winner::Pro);

        let mut kinds = Vec::new();
        while let Ok(text) = rx.try_recv() {
            let value: Value = serde_json::from_str(&text).unwrap();
            kinds.push(value["type"].as_str().unwrap().to_string());
        }
        assert_eq!(kinds, vec!["debate_update", "STATE_UPDATE", "results_reveal"]);

        // The class is no longer sealed, so a second reveal is refused.
        assert_eq!(reveal.reveal(7).await.unwrap_err().code(), "REVEAL_NOT_READY");
    }
}
