//! Core types for contest state
//!
//! These types are persisted by the [`ContestStore`](super::ContestStore)
//! collaborator and describe the per-class stage row plus the vote and
//! score records the result engine aggregates over.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, ArenaResult};

/// Identifier of a class (one independent contest room)
pub type ClassId = i64;

/// Identifier of a contest
pub type ContestId = i64;

/// Identifier of a user (voter, judge or debater)
pub type UserId = i64;

/// Stage of a class's contest.
///
/// The legacy variants predate the debate format and behave like `Idle`
/// for channel gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContestStage {
    /// Nothing running.
    Idle,
    /// Audience casts pre-debate votes.
    PreVoting,
    /// Debaters are on stage; no channel open.
    DebateInProgress,
    /// Audience casts post-debate votes.
    PostVoting,
    /// Judges submit score sheets.
    JudgeScoring,
    /// Every channel closed, results hidden.
    ResultsSealed,
    /// Results visible to everyone.
    ResultsRevealed,
    Presentation,
    QnaSnatch,
    QnaInput,
    ScoringTeacher,
    ScoringStudent,
    Finished,
}

impl ContestStage {
    /// Every recognized stage, debate stages first.
    pub const ALL: [ContestStage; 13] = [
        Self::Idle,
        Self::PreVoting,
        Self::DebateInProgress,
        Self::PostVoting,
        Self::JudgeScoring,
        Self::ResultsSealed,
        Self::ResultsRevealed,
        Self::Presentation,
        Self::QnaSnatch,
        Self::QnaInput,
        Self::ScoringTeacher,
        Self::ScoringStudent,
        Self::Finished,
    ];

    /// Wire name of the stage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::PreVoting => "PRE_VOTING",
            Self::DebateInProgress => "DEBATE_IN_PROGRESS",
            Self::PostVoting => "POST_VOTING",
            Self::JudgeScoring => "JUDGE_SCORING",
            Self::ResultsSealed => "RESULTS_SEALED",
            Self::ResultsRevealed => "RESULTS_REVEALED",
            Self::Presentation => "PRESENTATION",
            Self::QnaSnatch => "QNA_SNATCH",
            Self::QnaInput => "QNA_INPUT",
            Self::ScoringTeacher => "SCORING_TEACHER",
            Self::ScoringStudent => "SCORING_STUDENT",
            Self::Finished => "FINISHED",
        }
    }

    /// Whether this stage is left over from the presentation format.
    pub fn is_legacy(self) -> bool {
        matches!(
            self,
            Self::Presentation
                | Self::QnaSnatch
                | Self::QnaInput
                | Self::ScoringTeacher
                | Self::ScoringStudent
                | Self::Finished
        )
    }
}

impl std::fmt::Display for ContestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContestStage {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ArenaError::InvalidStage(s.to_string()))
    }
}

/// One of the three submission channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    PreVoting,
    PostVoting,
    JudgeScoring,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreVoting => "pre_voting",
            Self::PostVoting => "post_voting",
            Self::JudgeScoring => "judge_scoring",
        }
    }
}

/// Channel gating flags. At most one is open at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFlags {
    pub pre_voting: bool,
    pub post_voting: bool,
    pub judge_scoring: bool,
}

impl ChannelFlags {
    /// All channels closed.
    pub const CLOSED: ChannelFlags = ChannelFlags {
        pre_voting: false,
        post_voting: false,
        judge_scoring: false,
    };

    /// Flags implied by a stage. Total over every variant.
    pub fn for_stage(stage: ContestStage) -> Self {
        match stage {
            ContestStage::PreVoting => Self {
                pre_voting: true,
                ..Self::CLOSED
            },
            ContestStage::PostVoting => Self {
                post_voting: true,
                ..Self::CLOSED
            },
            ContestStage::JudgeScoring => Self {
                judge_scoring: true,
                ..Self::CLOSED
            },
            _ => Self::CLOSED,
        }
    }

    pub fn is_open(&self, channel: Channel) -> bool {
        match channel {
            Channel::PreVoting => self.pre_voting,
            Channel::PostVoting => self.post_voting,
            Channel::JudgeScoring => self.judge_scoring,
        }
    }

    pub fn open_count(&self) -> usize {
        [self.pre_voting, self.post_voting, self.judge_scoring]
            .iter()
            .filter(|open| **open)
            .count()
    }

    pub fn all_closed(&self) -> bool {
        self.open_count() == 0
    }
}

/// Per-class stage row. Unique by `class_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageState {
    pub class_id: ClassId,
    pub current_stage: ContestStage,
    pub contest_id: Option<ContestId>,
    pub pre_voting_enabled: bool,
    pub post_voting_enabled: bool,
    pub judge_scoring_enabled: bool,
    pub results_revealed: bool,
    /// Milliseconds since epoch, strictly increasing per class.
    pub update_time_ms: i64,
}

impl StageState {
    /// Default row created on first access.
    pub fn new(class_id: ClassId) -> Self {
        Self {
            class_id,
            current_stage: ContestStage::Idle,
            contest_id: None,
            pre_voting_enabled: false,
            post_voting_enabled: false,
            judge_scoring_enabled: false,
            results_revealed: false,
            update_time_ms: Utc::now().timestamp_millis(),
        }
    }

    pub fn channels(&self) -> ChannelFlags {
        ChannelFlags {
            pre_voting: self.pre_voting_enabled,
            post_voting: self.post_voting_enabled,
            judge_scoring: self.judge_scoring_enabled,
        }
    }

    fn set_channels(&mut self, flags: ChannelFlags) {
        self.pre_voting_enabled = flags.pre_voting;
        self.post_voting_enabled = flags.post_voting;
        self.judge_scoring_enabled = flags.judge_scoring;
    }

    /// Move to `stage`, re-deriving the channel flags.
    ///
    /// `contest_id` replaces the active contest only when given. The
    /// revealed flag is written by the two results stages and left alone
    /// by every other stage.
    pub fn apply_stage(&mut self, stage: ContestStage, contest_id: Option<ContestId>, now_ms: i64) {
        self.current_stage = stage;
        if let Some(id) = contest_id {
            self.contest_id = Some(id);
        }
        self.set_channels(ChannelFlags::for_stage(stage));
        match stage {
            ContestStage::ResultsSealed => self.results_revealed = false,
            ContestStage::ResultsRevealed => self.results_revealed = true,
            _ => {}
        }
        self.stamp(now_ms);
    }

    /// Back to a fresh IDLE row, keeping the class id.
    pub fn reset(&mut self, now_ms: i64) {
        self.current_stage = ContestStage::Idle;
        self.contest_id = None;
        self.set_channels(ChannelFlags::CLOSED);
        self.results_revealed = false;
        self.stamp(now_ms);
    }

    fn stamp(&mut self, now_ms: i64) {
        self.update_time_ms = now_ms.max(self.update_time_ms.saturating_add(1));
    }

    /// Sealed with every channel closed.
    pub fn can_reveal(&self) -> bool {
        self.current_stage == ContestStage::ResultsSealed && self.channels().all_closed()
    }
}

/// Side of the motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamSide {
    Pro,
    Con,
}

impl TeamSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pro => "pro",
            Self::Con => "con",
        }
    }
}

impl std::fmt::Display for TeamSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeamSide {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pro" => Ok(Self::Pro),
            "con" => Ok(Self::Con),
            other => Err(ArenaError::Validation(format!("invalid team side: {other}"))),
        }
    }
}

/// When a vote was cast relative to the debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotePhase {
    PreDebate,
    PostDebate,
}

impl VotePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreDebate => "pre_debate",
            Self::PostDebate => "post_debate",
        }
    }

    /// Channel that must be open to accept a vote in this phase.
    pub fn channel(self) -> Channel {
        match self {
            Self::PreDebate => Channel::PreVoting,
            Self::PostDebate => Channel::PostVoting,
        }
    }
}

impl std::fmt::Display for VotePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VotePhase {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre_debate" => Ok(Self::PreDebate),
            "post_debate" => Ok(Self::PostDebate),
            other => Err(ArenaError::Validation(format!("invalid vote phase: {other}"))),
        }
    }
}

/// A debate contest. Immutable once votes or scores reference it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub id: ContestId,
    pub class_id: ClassId,
    pub topic: String,
    #[serde(default)]
    pub pro_topic: Option<String>,
    #[serde(default)]
    pub con_topic: Option<String>,
    pub pro_team_name: String,
    pub con_team_name: String,
    pub created_at: DateTime<Utc>,
}

impl Contest {
    pub fn new(
        id: ContestId,
        class_id: ClassId,
        topic: impl Into<String>,
        pro_team_name: impl Into<String>,
        con_team_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            class_id,
            topic: topic.into(),
            pro_topic: None,
            con_topic: None,
            pro_team_name: pro_team_name.into(),
            con_team_name: con_team_name.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_sub_topics(mut self, pro: impl Into<String>, con: impl Into<String>) -> Self {
        self.pro_topic = Some(pro.into());
        self.con_topic = Some(con.into());
        self
    }

    pub fn team_name(&self, side: TeamSide) -> &str {
        match side {
            TeamSide::Pro => &self.pro_team_name,
            TeamSide::Con => &self.con_team_name,
        }
    }
}

/// Roster entry for a debater, used to label rankings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debater {
    pub id: UserId,
    pub class_id: ClassId,
    pub name: String,
    #[serde(default)]
    pub team_side: Option<TeamSide>,
}

/// Roster sizes for one class, used as progress denominators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterCounts {
    pub audience: u64,
    pub judges: u64,
    pub debaters: u64,
}

/// One audience vote. At most one per (contest, voter, phase).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub contest_id: ContestId,
    pub voter_id: UserId,
    pub team_side: TeamSide,
    pub vote_phase: VotePhase,
    pub created_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn new(
        contest_id: ContestId,
        voter_id: UserId,
        team_side: TeamSide,
        vote_phase: VotePhase,
    ) -> Self {
        Self {
            contest_id,
            voter_id,
            team_side,
            vote_phase,
            created_at: Utc::now(),
        }
    }
}

/// Vote counts for one contest, split by side and phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub pro_pre: u64,
    pub pro_post: u64,
    pub con_pre: u64,
    pub con_post: u64,
}

impl VoteTally {
    pub fn record(&mut self, side: TeamSide, phase: VotePhase) {
        let slot = match (side, phase) {
            (TeamSide::Pro, VotePhase::PreDebate) => &mut self.pro_pre,
            (TeamSide::Pro, VotePhase::PostDebate) => &mut self.pro_post,
            (TeamSide::Con, VotePhase::PreDebate) => &mut self.con_pre,
            (TeamSide::Con, VotePhase::PostDebate) => &mut self.con_post,
        };
        *slot += 1;
    }

    pub fn count(&self, side: TeamSide, phase: VotePhase) -> u64 {
        match (side, phase) {
            (TeamSide::Pro, VotePhase::PreDebate) => self.pro_pre,
            (TeamSide::Pro, VotePhase::PostDebate) => self.pro_post,
            (TeamSide::Con, VotePhase::PreDebate) => self.con_pre,
            (TeamSide::Con, VotePhase::PostDebate) => self.con_post,
        }
    }

    pub fn phase_total(&self, phase: VotePhase) -> u64 {
        self.count(TeamSide::Pro, phase) + self.count(TeamSide::Con, phase)
    }

    /// Pre plus post votes across both sides.
    pub fn total(&self) -> u64 {
        self.pro_pre + self.pro_post + self.con_pre + self.con_post
    }
}

/// Upper bound of each score sheet criterion, in sheet order.
pub const SCORE_BOUNDS: [(&str, f64); 6] = [
    ("language_expression", 20.0),
    ("logical_reasoning", 20.0),
    ("debate_skills", 20.0),
    ("quick_response", 15.0),
    ("overall_awareness", 15.0),
    ("general_impression", 10.0),
];

/// The six criteria a judge scores a debater on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSheet {
    pub language_expression: f64,
    pub logical_reasoning: f64,
    pub debate_skills: f64,
    pub quick_response: f64,
    pub overall_awareness: f64,
    pub general_impression: f64,
}

impl ScoreSheet {
    fn values(&self) -> [f64; 6] {
        [
            self.language_expression,
            self.logical_reasoning,
            self.debate_skills,
            self.quick_response,
            self.overall_awareness,
            self.general_impression,
        ]
    }

    /// Reject any criterion outside `[0, max]`.
    pub fn validate(&self) -> ArenaResult<()> {
        for ((name, max), value) in SCORE_BOUNDS.iter().zip(self.values()) {
            if !value.is_finite() || value < 0.0 || value > *max {
                return Err(ArenaError::Validation(format!(
                    "{name} must be within [0, {max}], got {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn total(&self) -> f64 {
        self.values().iter().sum()
    }
}

/// A judge's sheet for one debater. Never edited once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeScore {
    pub contest_id: ContestId,
    pub judge_id: UserId,
    pub debater_id: UserId,
    #[serde(flatten)]
    pub sheet: ScoreSheet,
    pub total_score: f64,
    pub created_at: DateTime<Utc>,
}

impl JudgeScore {
    /// Validate the sheet and derive the total.
    pub fn new(
        contest_id: ContestId,
        judge_id: UserId,
        debater_id: UserId,
        sheet: ScoreSheet,
    ) -> ArenaResult<Self> {
        sheet.validate()?;
        Ok(Self {
            contest_id,
            judge_id,
            debater_id,
            sheet,
            total_score: sheet.total(),
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(values: [f64; 6]) -> ScoreSheet {
        ScoreSheet {
            language_expression: values[0],
            logical_reasoning: values[1],
            debate_skills: values[2],
            quick_response: values[3],
            overall_awareness: values[4],
            general_impression: values[5],
        }
    }

    #[test]
    fn test_stage_round_trips_through_wire_name() {
        for stage in ContestStage::ALL {
            assert_eq!(stage.as_str().parse::<ContestStage>().unwrap(), stage);
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage.as_str()));
        }
    }

    #[test]
    fn test_unknown_stage_is_rejected() {
        let err = "VOTING".parse::<ContestStage>().unwrap_err();
        assert_eq!(err, ArenaError::InvalidStage("VOTING".to_string()));
        assert!("pre_voting".parse::<ContestStage>().is_err());
    }

    #[test]
    fn test_flag_mapping_is_exclusive() {
        for stage in ContestStage::ALL {
            let flags = ChannelFlags::for_stage(stage);
            let expected_open = matches!(
                stage,
                ContestStage::PreVoting | ContestStage::PostVoting | ContestStage::JudgeScoring
            );
            assert_eq!(flags.open_count(), usize::from(expected_open), "{stage}");
        }
        assert!(ChannelFlags::for_stage(ContestStage::PostVoting).is_open(Channel::PostVoting));
        assert!(ChannelFlags::for_stage(ContestStage::QnaSnatch).all_closed());
    }

    #[test]
    fn test_apply_stage_revealed_flag() {
        let mut state = StageState::new(1);
        state.apply_stage(ContestStage::ResultsRevealed, Some(9), 10);
        assert!(state.results_revealed);
        assert_eq!(state.contest_id, Some(9));

        // Idle leaves the revealed flag alone.
        state.apply_stage(ContestStage::Idle, None, 11);
        assert!(state.results_revealed);
        assert_eq!(state.contest_id, Some(9));

        state.apply_stage(ContestStage::ResultsSealed, None, 12);
        assert!(!state.results_revealed);
    }

    #[test]
    fn test_update_time_strictly_increases() {
        let mut state = StageState::new(1);
        let first = state.update_time_ms;
        state.apply_stage(ContestStage::PreVoting, None, 0);
        assert_eq!(state.update_time_ms, first + 1);
        state.apply_stage(ContestStage::PreVoting, None, first + 500);
        assert_eq!(state.update_time_ms, first + 500);
    }

    #[test]
    fn test_can_reveal_requires_sealed_stage() {
        let mut state = StageState::new(2);
        assert!(!state.can_reveal());
        state.apply_stage(ContestStage::ResultsSealed, None, 1);
        assert!(state.can_reveal());
        state.judge_scoring_enabled = true;
        assert!(!state.can_reveal());
    }

    #[test]
    fn test_side_and_phase_literals() {
        assert_eq!("pro".parse::<TeamSide>().unwrap(), TeamSide::Pro);
        assert_eq!(
            "post_debate".parse::<VotePhase>().unwrap(),
            VotePhase::PostDebate
        );
        assert!(matches!(
            "PRO".parse::<TeamSide>(),
            Err(ArenaError::Validation(_))
        ));
        assert!("during".parse::<VotePhase>().is_err());
    }

    #[test]
    fn test_vote_tally_totals() {
        let mut tally = VoteTally::default();
        tally.record(TeamSide::Pro, VotePhase::PreDebate);
        tally.record(TeamSide::Pro, VotePhase::PostDebate);
        tally.record(TeamSide::Con, VotePhase::PostDebate);
        assert_eq!(tally.phase_total(VotePhase::PostDebate), 2);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn test_score_sheet_bounds() {
        let full = sheet([20.0, 20.0, 20.0, 15.0, 15.0, 10.0]);
        assert!(full.validate().is_ok());
        assert_eq!(full.total(), 100.0);

        let over = sheet([20.0, 20.0, 20.0, 15.0, 15.5, 10.0]);
        let err = over.validate().unwrap_err();
        assert!(err.to_string().contains("overall_awareness"));

        assert!(sheet([-1.0, 0.0, 0.0, 0.0, 0.0, 0.0]).validate().is_err());
        assert!(sheet([f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0])
            .validate()
            .is_err());
    }

    #[test]
    fn test_judge_score_derives_total() {
        let score = JudgeScore::new(1, 2, 3, sheet([18.0, 17.0, 16.0, 12.0, 11.0, 8.0])).unwrap();
        assert_eq!(score.total_score, 82.0);

        let json = serde_json::to_value(&score).unwrap();
        assert_eq!(json["logical_reasoning"], 17.0);
        assert_eq!(json["total_score"], 82.0);
    }
}
