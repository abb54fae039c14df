//! Payloads published on stage changes

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::hub::{HubMessage, MessageKind};
use crate::state::{
    ChannelFlags, ClassId, Contest, ContestId, ContestStage, JudgeScore, RosterCounts,
    StageState, UserId, VotePhase, VoteTally,
};

/// Contest fields shown on displays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestSummary {
    pub id: ContestId,
    pub topic: String,
    pub pro_team_name: String,
    pub con_team_name: String,
}

impl From<&Contest> for ContestSummary {
    fn from(contest: &Contest) -> Self {
        Self {
            id: contest.id,
            topic: contest.topic.clone(),
            pro_team_name: contest.pro_team_name.clone(),
            con_team_name: contest.con_team_name.clone(),
        }
    }
}

/// Submitted out of expected, with an integer percentage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCount {
    pub submitted: u64,
    pub total: u64,
    pub percentage: u64,
}

impl ProgressCount {
    pub fn new(submitted: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            submitted.saturating_mul(100) / total
        };
        Self {
            submitted,
            total,
            percentage,
        }
    }
}

/// Submission progress for the active contest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateProgress {
    pub contest_id: ContestId,
    pub pre_voting_progress: ProgressCount,
    pub post_voting_progress: ProgressCount,
    pub judge_scoring_progress: ProgressCount,
}

impl DebateProgress {
    /// Votes count against the audience size. A judge counts once they have
    /// a sheet for every debater on the roster; a judge who has scored only
    /// some debaters is not counted yet, so the bar reaches 100% only when
    /// scoring is actually finished.
    pub fn compute(
        contest_id: ContestId,
        tally: &VoteTally,
        scores: &[JudgeScore],
        roster: RosterCounts,
    ) -> Self {
        let mut sheets: HashMap<UserId, u64> = HashMap::new();
        for score in scores.iter().filter(|s| s.contest_id == contest_id) {
            *sheets.entry(score.judge_id).or_default() += 1;
        }
        let needed = roster.debaters.max(1);
        let judges_done = sheets.values().filter(|&&n| n >= needed).count() as u64;

        Self {
            contest_id,
            pre_voting_progress: ProgressCount::new(
                tally.phase_total(VotePhase::PreDebate),
                roster.audience,
            ),
            post_voting_progress: ProgressCount::new(
                tally.phase_total(VotePhase::PostDebate),
                roster.audience,
            ),
            judge_scoring_progress: ProgressCount::new(judges_done, roster.judges),
        }
    }
}

/// Body of a `debate_update` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateSnapshot {
    pub stage: ContestStage,
    pub contest: Option<ContestSummary>,
    pub class_id: ClassId,
    pub voting_enabled: ChannelFlags,
    pub results_revealed: bool,
    pub progress: Option<DebateProgress>,
    pub update_time: i64,
}

impl DebateSnapshot {
    pub fn new(
        state: &StageState,
        contest: Option<&Contest>,
        progress: Option<DebateProgress>,
    ) -> Self {
        Self {
            stage: state.current_stage,
            contest: contest.map(ContestSummary::from),
            class_id: state.class_id,
            voting_enabled: state.channels(),
            results_revealed: state.results_revealed,
            progress,
            update_time: state.update_time_ms,
        }
    }

    pub fn to_message(&self) -> HubMessage {
        HubMessage::new(MessageKind::DebateUpdate, self)
    }
}

/// Body of a `STATE_UPDATE` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub class_id: ClassId,
    pub current_stage: ContestStage,
    pub contest_id: Option<ContestId>,
    pub update_time: i64,
    /// Remaining countdown seconds, if one is running
    pub countdown: Option<u64>,
}

impl StateUpdate {
    pub fn new(state: &StageState, countdown: Option<u64>) -> Self {
        Self {
            class_id: state.class_id,
            current_stage: state.current_stage,
            contest_id: state.contest_id,
            update_time: state.update_time_ms,
            countdown,
        }
    }

    pub fn to_message(&self) -> HubMessage {
        HubMessage::new(MessageKind::StateUpdate, self)
    }
}
