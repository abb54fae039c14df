//! Contest state: the per-class stage row, the records the result engine
//! aggregates over, and the store collaborator that persists them.
//!
//! # Usage
//!
//! ```ignore
//! use arena::state::{Contest, ContestStore, MemoryStore, StageState};
//!
//! let store = MemoryStore::new().shared();
//! store.put_contest(Contest::new(1, 7, "Motion", "Blue", "Red")).await;
//! store.save_stage(&StageState::new(7)).await?;
//! ```

pub mod store;
pub mod types;

pub use store::{ContestStore, MemoryStore, SharedContestStore, StoreSnapshot};
pub use types::{
    Channel, ChannelFlags, ClassId, Contest, ContestId, ContestStage, Debater, JudgeScore,
    RosterCounts, ScoreSheet, StageState, TeamSide, UserId, VotePhase, VoteRecord, VoteTally,
    SCORE_BOUNDS,
};
