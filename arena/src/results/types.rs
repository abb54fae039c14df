//! Result types. Derived on demand, never persisted.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::state::{ContestId, TeamSide, UserId};

/// Swing as a percentage of the pre-debate count.
///
/// `Unbounded` stands for growth from zero pre-debate votes; it compares
/// above every finite value and equal to itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum GrowthRate {
    Finite(f64),
    Unbounded,
}

impl GrowthRate {
    pub fn from_counts(pre: u64, swing: i64) -> Self {
        if pre > 0 {
            Self::Finite(swing as f64 / pre as f64 * 100.0)
        } else if swing > 0 {
            Self::Unbounded
        } else {
            Self::Finite(0.0)
        }
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Unbounded, Self::Unbounded) => Ordering::Equal,
            (Self::Unbounded, Self::Finite(_)) => Ordering::Greater,
            (Self::Finite(_), Self::Unbounded) => Ordering::Less,
            (Self::Finite(a), Self::Finite(b)) => a.total_cmp(b),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }
}

impl std::fmt::Display for GrowthRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Finite(rate) => write!(f, "{rate:.1}%"),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Pre/post vote analysis for one side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideTally {
    pub team_side: TeamSide,
    pub team_name: String,
    pub pre_debate_votes: u64,
    pub post_debate_votes: u64,
    /// Post minus pre; negative when the side lost votes.
    pub swing_vote: i64,
    pub growth_rate: GrowthRate,
}

impl SideTally {
    pub fn new(team_side: TeamSide, team_name: impl Into<String>, pre: u64, post: u64) -> Self {
        let swing_vote = post as i64 - pre as i64;
        Self {
            team_side,
            team_name: team_name.into(),
            pre_debate_votes: pre,
            post_debate_votes: post,
            swing_vote,
            growth_rate: GrowthRate::from_counts(pre, swing_vote),
        }
    }
}

/// Swing analysis for both sides of a contest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingVotes {
    pub pro: SideTally,
    pub con: SideTally,
}

/// Team verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Pro,
    Con,
    Tie,
}

impl Winner {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pro => "pro",
            Self::Con => "con",
            Self::Tie => "tie",
        }
    }
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vote counts by phase and side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteStatistics {
    pub total_pre_votes: u64,
    pub total_post_votes: u64,
    pub pro_pre_votes: u64,
    pub pro_post_votes: u64,
    pub pro_swing_vote: i64,
    pub con_pre_votes: u64,
    pub con_post_votes: u64,
    pub con_swing_vote: i64,
    pub total_votes_cast: u64,
}

/// One ranked debater. Averages are rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebaterRanking {
    pub debater_id: UserId,
    pub debater_name: String,
    pub team_side: Option<TeamSide>,
    pub final_score: f64,
    pub logical_reasoning_avg: f64,
    pub debate_skills_avg: f64,
    /// Number of judge sheets averaged.
    pub judge_count: usize,
    pub rank: u32,
}

impl DebaterRanking {
    /// The tie-break triple.
    pub fn criteria(&self) -> (f64, f64, f64) {
        (
            self.final_score,
            self.logical_reasoning_avg,
            self.debate_skills_avg,
        )
    }
}

/// Full result snapshot for one contest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestResult {
    pub contest_id: ContestId,
    pub winning_team: Winner,
    pub pro_team_swing: i64,
    pub con_team_swing: i64,
    pub total_votes_cast: u64,
    pub debater_rankings: Vec<DebaterRanking>,
    /// Always `[pro, con]`.
    pub vote_analysis: Vec<SideTally>,
}
