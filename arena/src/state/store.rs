//! Contest store collaborator
//!
//! The core only talks to persistence through [`ContestStore`]. Uniqueness
//! of votes and scores is enforced here, before a record is created.
//! [`MemoryStore`] is the in-process implementation, with JSON snapshot
//! load/save for fixtures and the CLI.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::types::*;
use crate::error::{ArenaError, ArenaResult};

/// Shared reference to a contest store
pub type SharedContestStore = Arc<dyn ContestStore>;

/// Persistence interface consumed by the arena core.
#[async_trait]
pub trait ContestStore: Send + Sync {
    /// Stage row for a class, if one has been created.
    async fn load_stage(&self, class_id: ClassId) -> ArenaResult<Option<StageState>>;

    /// Insert or replace the stage row for `state.class_id`.
    async fn save_stage(&self, state: &StageState) -> ArenaResult<()>;

    async fn get_contest(&self, contest_id: ContestId) -> ArenaResult<Option<Contest>>;

    /// Most recently created contest of a class.
    async fn latest_contest(&self, class_id: ClassId) -> ArenaResult<Option<Contest>>;

    async fn get_debater(&self, debater_id: UserId) -> ArenaResult<Option<Debater>>;

    async fn roster_counts(&self, class_id: ClassId) -> ArenaResult<RosterCounts>;

    /// Vote counts by side and phase.
    async fn vote_tally(&self, contest_id: ContestId) -> ArenaResult<VoteTally>;

    async fn judge_scores(&self, contest_id: ContestId) -> ArenaResult<Vec<JudgeScore>>;

    /// Store a vote; `Conflict` if the voter already voted in this phase.
    async fn insert_vote(&self, vote: VoteRecord) -> ArenaResult<()>;

    /// Store a score; `Conflict` if the judge already scored this debater.
    async fn insert_score(&self, score: JudgeScore) -> ArenaResult<()>;

    /// Delete a class and everything hanging off it.
    async fn delete_class(&self, class_id: ClassId) -> ArenaResult<()>;
}

/// Serializable content of a [`MemoryStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub contests: Vec<Contest>,
    #[serde(default)]
    pub debaters: Vec<Debater>,
    /// Roster sizes keyed by class id.
    #[serde(default)]
    pub rosters: HashMap<ClassId, RosterCounts>,
    #[serde(default)]
    pub votes: Vec<VoteRecord>,
    #[serde(default)]
    pub scores: Vec<JudgeScore>,
    #[serde(default)]
    pub stages: Vec<StageState>,
}

#[derive(Default)]
struct Tables {
    stages: HashMap<ClassId, StageState>,
    contests: HashMap<ContestId, Contest>,
    debaters: HashMap<UserId, Debater>,
    rosters: HashMap<ClassId, RosterCounts>,
    votes: Vec<VoteRecord>,
    vote_keys: HashSet<(ContestId, UserId, VotePhase)>,
    scores: Vec<JudgeScore>,
    score_keys: HashSet<(ContestId, UserId, UserId)>,
}

impl Tables {
    fn push_vote(&mut self, vote: VoteRecord) -> ArenaResult<()> {
        let key = (vote.contest_id, vote.voter_id, vote.vote_phase);
        if !self.vote_keys.insert(key) {
            return Err(ArenaError::Conflict(format!(
                "voter {} already voted in {} for contest {}",
                vote.voter_id, vote.vote_phase, vote.contest_id
            )));
        }
        self.votes.push(vote);
        Ok(())
    }

    fn push_score(&mut self, score: JudgeScore) -> ArenaResult<()> {
        let key = (score.contest_id, score.judge_id, score.debater_id);
        if !self.score_keys.insert(key) {
            return Err(ArenaError::Conflict(format!(
                "judge {} already scored debater {} for contest {}",
                score.judge_id, score.debater_id, score.contest_id
            )));
        }
        self.scores.push(score);
        Ok(())
    }
}

/// In-memory contest store
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Build a store from a snapshot, enforcing the same uniqueness rules
    /// as live inserts.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> ArenaResult<Self> {
        let mut tables = Tables {
            rosters: snapshot.rosters,
            ..Tables::default()
        };
        for contest in snapshot.contests {
            tables.contests.insert(contest.id, contest);
        }
        for debater in snapshot.debaters {
            tables.debaters.insert(debater.id, debater);
        }
        for state in snapshot.stages {
            tables.stages.insert(state.class_id, state);
        }
        for vote in snapshot.votes {
            tables.push_vote(vote)?;
        }
        for score in snapshot.scores {
            score.sheet.validate()?;
            if (score.total_score - score.sheet.total()).abs() > 1e-9 {
                return Err(ArenaError::Validation(format!(
                    "judge {} total for debater {} is {}, sheet sums to {}",
                    score.judge_id,
                    score.debater_id,
                    score.total_score,
                    score.sheet.total()
                )));
            }
            tables.push_score(score)?;
        }
        Ok(Self {
            tables: RwLock::new(tables),
        })
    }

    /// Load a JSON snapshot from disk.
    pub async fn load(path: impl AsRef<Path>) -> ArenaResult<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ArenaError::Store(format!("read {}: {e}", path.display())))?;
        let snapshot: StoreSnapshot = serde_json::from_str(&raw)
            .map_err(|e| ArenaError::Store(format!("parse {}: {e}", path.display())))?;
        debug!(
            path = %path.display(),
            contests = snapshot.contests.len(),
            votes = snapshot.votes.len(),
            scores = snapshot.scores.len(),
            "Snapshot loaded"
        );
        Self::from_snapshot(snapshot)
    }

    /// Current content as a snapshot.
    pub async fn snapshot(&self) -> StoreSnapshot {
        let tables = self.tables.read().await;
        let mut contests: Vec<Contest> = tables.contests.values().cloned().collect();
        contests.sort_by_key(|c| c.id);
        let mut debaters: Vec<Debater> = tables.debaters.values().cloned().collect();
        debaters.sort_by_key(|d| d.id);
        let mut stages: Vec<StageState> = tables.stages.values().cloned().collect();
        stages.sort_by_key(|s| s.class_id);
        StoreSnapshot {
            contests,
            debaters,
            rosters: tables.rosters.clone(),
            votes: tables.votes.clone(),
            scores: tables.scores.clone(),
            stages,
        }
    }

    /// Write the current content as pretty JSON.
    pub async fn save(&self, path: impl AsRef<Path>) -> ArenaResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.snapshot().await)
            .map_err(|e| ArenaError::Store(e.to_string()))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| ArenaError::Store(format!("write {}: {e}", path.display())))
    }

    // =========================================================================
    // Roster and contest setup
    // =========================================================================

    pub async fn put_contest(&self, contest: Contest) {
        self.tables.write().await.contests.insert(contest.id, contest);
    }

    pub async fn put_debater(&self, debater: Debater) {
        self.tables.write().await.debaters.insert(debater.id, debater);
    }

    pub async fn set_roster(&self, class_id: ClassId, counts: RosterCounts) {
        self.tables.write().await.rosters.insert(class_id, counts);
    }
}

#[async_trait]
impl ContestStore for MemoryStore {
    async fn load_stage(&self, class_id: ClassId) -> ArenaResult<Option<StageState>> {
        Ok(self.tables.read().await.stages.get(&class_id).cloned())
    }

    async fn save_stage(&self, state: &StageState) -> ArenaResult<()> {
        self.tables
            .write()
            .await
            .stages
            .insert(state.class_id, state.clone());
        Ok(())
    }

    async fn get_contest(&self, contest_id: ContestId) -> ArenaResult<Option<Contest>> {
        Ok(self.tables.read().await.contests.get(&contest_id).cloned())
    }

    async fn latest_contest(&self, class_id: ClassId) -> ArenaResult<Option<Contest>> {
        let tables = self.tables.read().await;
        Ok(tables
            .contests
            .values()
            .filter(|c| c.class_id == class_id)
            .max_by_key(|c| (c.created_at, c.id))
            .cloned())
    }

    async fn get_debater(&self, debater_id: UserId) -> ArenaResult<Option<Debater>> {
        Ok(self.tables.read().await.debaters.get(&debater_id).cloned())
    }

    async fn roster_counts(&self, class_id: ClassId) -> ArenaResult<RosterCounts> {
        Ok(self
            .tables
            .read()
            .await
            .rosters
            .get(&class_id)
            .copied()
            .unwrap_or_default())
    }

    async fn vote_tally(&self, contest_id: ContestId) -> ArenaResult<VoteTally> {
        let tables = self.tables.read().await;
        let mut tally = VoteTally::default();
        for vote in tables.votes.iter().filter(|v| v.contest_id == contest_id) {
            tally.record(vote.team_side, vote.vote_phase);
        }
        Ok(tally)
    }

    async fn judge_scores(&self, contest_id: ContestId) -> ArenaResult<Vec<JudgeScore>> {
        Ok(self
            .tables
            .read()
            .await
            .scores
            .iter()
            .filter(|s| s.contest_id == contest_id)
            .cloned()
            .collect())
    }

    async fn insert_vote(&self, vote: VoteRecord) -> ArenaResult<()> {
        self.tables.write().await.push_vote(vote)
    }

    async fn insert_score(&self, score: JudgeScore) -> ArenaResult<()> {
        self.tables.write().await.push_score(score)
    }

    async fn delete_class(&self, class_id: ClassId) -> ArenaResult<()> {
        let mut tables = self.tables.write().await;
        let contest_ids: HashSet<ContestId> = tables
            .contests
            .values()
            .filter(|c| c.class_id == class_id)
            .map(|c| c.id)
            .collect();

        tables.stages.remove(&class_id);
        tables.rosters.remove(&class_id);
        tables.contests.retain(|id, _| !contest_ids.contains(id));
        tables.debaters.retain(|_, d| d.class_id != class_id);
        tables.votes.retain(|v| !contest_ids.contains(&v.contest_id));
        tables
            .vote_keys
            .retain(|(contest_id, _, _)| !contest_ids.contains(contest_id));
        tables.scores.retain(|s| !contest_ids.contains(&s.contest_id));
        tables
            .score_keys
            .retain(|(contest_id, _, _)| !contest_ids.contains(contest_id));

        debug!(class_id, contests = contest_ids.len(), "Class deleted");
        Ok(())
    }
}
