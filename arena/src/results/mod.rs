//! Result calculation for debate contests
//!
//! Swing votes and growth rates per side, the cascading team verdict,
//! and competition-ranked debater standings. Nothing here is cached;
//! every call recomputes from the stored records.

pub mod engine;
pub mod types;

pub use engine::{
    assign_ranks, average_scores, pick_winner, swing_votes, vote_statistics, DebaterAverages,
    ResultEngine,
};
pub use types::{
    ContestResult, DebaterRanking, GrowthRate, SideTally, SwingVotes, VoteStatistics, Winner,
};
