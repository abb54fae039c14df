//! Stage controller
//!
//! Owns the per-class stage row and its channel flags. Every
//! read-modify-write of a row happens under that class's lock, and the
//! resulting `debate_update` is published before the lock is released so
//! subscribers see commits in order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::snapshot::{DebateProgress, DebateSnapshot, StateUpdate};
use crate::error::{ArenaError, ArenaResult};
use crate::hub::SharedBroadcastHub;
use crate::state::{ClassId, Contest, ContestId, ContestStage, SharedContestStore, StageState};

/// Shared reference to StageController
pub type SharedStageController = Arc<StageController>;

pub struct StageController {
    store: SharedContestStore,
    hub: SharedBroadcastHub,
    locks: Mutex<HashMap<ClassId, Arc<AsyncMutex<()>>>>,
}

impl StageController {
    pub fn new(store: SharedContestStore, hub: SharedBroadcastHub) -> Self {
        Self {
            store,
            hub,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create a shared reference to this controller
    pub fn shared(self) -> SharedStageController {
        Arc::new(self)
    }

    fn class_lock(&self, class_id: ClassId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(class_id).or_default())
    }

    async fn load_or_create(&self, class_id: ClassId) -> ArenaResult<StageState> {
        match self.store.load_stage(class_id).await? {
            Some(state) => Ok(state),
            None => {
                let state = StageState::new(class_id);
                self.store.save_stage(&state).await?;
                debug!(class_id, "Stage row created");
                Ok(state)
            }
        }
    }

    async fn require_contest(&self, contest_id: ContestId) -> ArenaResult<Contest> {
        self.store
            .get_contest(contest_id)
            .await?
            .ok_or_else(|| ArenaError::not_found("contest", contest_id))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current stage row, created as IDLE on first access.
    pub async fn get_state(&self, class_id: ClassId) -> ArenaResult<StageState> {
        let lock = self.class_lock(class_id);
        let _guard = lock.lock().await;
        self.load_or_create(class_id).await
    }

    /// Sealed with every channel closed. A class without a row cannot reveal.
    pub async fn can_reveal(&self, class_id: ClassId) -> ArenaResult<bool> {
        Ok(self
            .store
            .load_stage(class_id)
            .await?
            .is_some_and(|state| state.can_reveal()))
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Move a class to `stage`, optionally switching the active contest.
    ///
    /// Any stage may follow any other. Reapplying the current stage is
    /// legal and re-derives the same flags. An unknown contest id fails
    /// before anything is written.
    pub async fn set_stage(
        &self,
        class_id: ClassId,
        stage: ContestStage,
        contest_id: Option<ContestId>,
    ) -> ArenaResult<StageState> {
        let lock = self.class_lock(class_id);
        let _guard = lock.lock().await;

        if let Some(id) = contest_id {
            self.require_contest(id).await?;
        }
        let mut state = self.load_or_create(class_id).await?;
        let from = state.current_stage;
        state.apply_stage(stage, contest_id, Utc::now().timestamp_millis());
        self.store.save_stage(&state).await?;

        info!(
            class_id,
            from = %from,
            to = %stage,
            contest_id = ?state.contest_id,
            "Stage changed"
        );
        self.publish_debate_update(&state).await;
        Ok(state)
    }

    /// [`set_stage`](Self::set_stage) from a wire name such as `"PRE_VOTING"`.
    pub async fn set_stage_named(
        &self,
        class_id: ClassId,
        stage: &str,
        contest_id: Option<ContestId>,
    ) -> ArenaResult<StageState> {
        let stage: ContestStage = stage.parse()?;
        self.set_stage(class_id, stage, contest_id).await
    }

    /// Return a class to IDLE with no active contest, stopping its countdown.
    pub async fn reset(&self, class_id: ClassId) -> ArenaResult<StageState> {
        let lock = self.class_lock(class_id);
        let _guard = lock.lock().await;

        let mut state = self.load_or_create(class_id).await?;
        state.reset(Utc::now().timestamp_millis());
        self.store.save_stage(&state).await?;
        let stopped = self.hub.stop_countdown(class_id);

        info!(class_id, countdown_stopped = stopped, "Stage reset");
        self.hub
            .broadcast_to_class(class_id, &DebateSnapshot::new(&state, None, None).to_message())
            .await;
        self.hub
            .broadcast_to_class(class_id, &StateUpdate::new(&state, None).to_message())
            .await;
        Ok(state)
    }

    /// Atomically check the reveal gate and commit RESULTS_REVEALED.
    ///
    /// The contest revealed is the active one if it still exists, else the
    /// class's most recent contest. Returns the committed row and that contest id.
    pub async fn commit_reveal(&self, class_id: ClassId) -> ArenaResult<(StageState, ContestId)> {
        let lock = self.class_lock(class_id);
        let _guard = lock.lock().await;

        let mut state = self.load_or_create(class_id).await?;
        if !state.can_reveal() {
            return Err(ArenaError::RevealNotReady {
                class_id,
                stage: state.current_stage,
            });
        }
        let active = match state.contest_id {
            Some(id) => self.store.get_contest(id).await?,
            None => None,
        };
        let contest_id = match active {
            Some(contest) => contest.id,
            None => {
                self.store
                    .latest_contest(class_id)
                    .await?
                    .ok_or_else(|| ArenaError::not_found("contest for class", class_id))?
                    .id
            }
        };

        state.apply_stage(
            ContestStage::ResultsRevealed,
            Some(contest_id),
            Utc::now().timestamp_millis(),
        );
        self.store.save_stage(&state).await?;

        info!(class_id, contest_id, "Results revealed");
        self.publish_debate_update(&state).await;
        Ok((state, contest_id))
    }

    // =========================================================================
    // Publishing
    // =========================================================================

    /// Build the stage snapshot for a committed row.
    pub async fn snapshot(&self, state: &StageState) -> ArenaResult<DebateSnapshot> {
        let Some(contest_id) = state.contest_id else {
            return Ok(DebateSnapshot::new(state, None, None));
        };
        let Some(contest) = self.store.get_contest(contest_id).await? else {
            return Ok(DebateSnapshot::new(state, None, None));
        };
        let tally = self.store.vote_tally(contest_id).await?;
        let scores = self.store.judge_scores(contest_id).await?;
        let roster = self.store.roster_counts(state.class_id).await?;
        let progress = DebateProgress::compute(contest_id, &tally, &scores, roster);
        Ok(DebateSnapshot::new(state, Some(&contest), Some(progress)))
    }

    // The row is already committed; a failure here only costs the broadcast.
    async fn publish_debate_update(&self, state: &StageState) {
        match self.snapshot(state).await {
            Ok(snapshot) => {
                self.hub
                    .broadcast_to_class(state.class_id, &snapshot.to_message())
                    .await;
            }
            Err(e) => {
                warn!(class_id = state.class_id, "Skipping debate_update: {}", e);
            }
        }
    }

    /// Publish a `STATE_UPDATE` carrying the class's live countdown.
    pub async fn publish_state_update(&self, state: &StageState) {
        let countdown = self.hub.get_countdown(state.class_id);
        self.hub
            .broadcast_to_class(
                state.class_id,
                &StateUpdate::new(state, countdown).to_message(),
            )
            .await;
    }
}
