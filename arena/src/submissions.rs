//! Vote and score intake
//!
//! Submissions are parsed and bounds-checked, matched to a contest, gated
//! by the class's channel flags and only then stored. A stored vote or
//! score is never replaced.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ArenaError, ArenaResult};
use crate::hub::{HubMessage, SharedBroadcastHub};
use crate::state::{
    Channel, Contest, ContestId, JudgeScore, ScoreSheet, SharedContestStore, StageState,
    TeamSide, UserId, VotePhase, VoteRecord,
};

/// Raw audience vote as received from a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteSubmission {
    pub contest_id: ContestId,
    pub voter_id: UserId,
    pub team_side: String,
    pub vote_phase: String,
}

/// Raw judge sheet as received from a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub contest_id: ContestId,
    pub judge_id: UserId,
    pub debater_id: UserId,
    #[serde(flatten)]
    pub sheet: ScoreSheet,
}

/// Acknowledgement for an accepted vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub contest_id: ContestId,
    pub team_side: TeamSide,
    pub vote_phase: VotePhase,
    pub total_votes: u64,
}

pub struct SubmissionDesk {
    store: SharedContestStore,
    hub: SharedBroadcastHub,
}

impl SubmissionDesk {
    pub fn new(store: SharedContestStore, hub: SharedBroadcastHub) -> Self {
        Self { store, hub }
    }

    async fn contest(&self, contest_id: ContestId) -> ArenaResult<Contest> {
        self.store
            .get_contest(contest_id)
            .await?
            .ok_or_else(|| ArenaError::not_found("contest", contest_id))
    }

    async fn require_open(&self, contest: &Contest, channel: Channel) -> ArenaResult<()> {
        let open = self
            .store
            .load_stage(contest.class_id)
            .await?
            .as_ref()
            .map(StageState::channels)
            .is_some_and(|flags| flags.is_open(channel));
        if open {
            Ok(())
        } else {
            Err(ArenaError::ChannelClosed {
                channel: channel.as_str(),
            })
        }
    }

    /// Record one audience vote and publish the new total to venue screens.
    pub async fn submit_vote(&self, submission: VoteSubmission) -> ArenaResult<VoteReceipt> {
        let team_side: TeamSide = submission.team_side.parse()?;
        let vote_phase: VotePhase = submission.vote_phase.parse()?;
        let contest = self.contest(submission.contest_id).await?;
        self.require_open(&contest, vote_phase.channel()).await?;

        self.store
            .insert_vote(VoteRecord::new(
                contest.id,
                submission.voter_id,
                team_side,
                vote_phase,
            ))
            .await?;

        let total_votes = self.store.vote_tally(contest.id).await?.total();
        debug!(
            contest_id = contest.id,
            voter_id = submission.voter_id,
            phase = %vote_phase,
            total_votes,
            "Vote recorded"
        );
        // In-room clients must not see running totals before reveal.
        self.hub
            .broadcast_global_only(&HubMessage::vote_progress(
                contest.class_id,
                contest.id,
                total_votes,
            ))
            .await;

        Ok(VoteReceipt {
            contest_id: contest.id,
            team_side,
            vote_phase,
            total_votes,
        })
    }

    /// Record one judge sheet for one debater.
    pub async fn submit_score(&self, submission: ScoreSubmission) -> ArenaResult<JudgeScore> {
        submission.sheet.validate()?;
        let contest = self.contest(submission.contest_id).await?;
        let debater = self
            .store
            .get_debater(submission.debater_id)
            .await?
            .filter(|d| d.class_id == contest.class_id)
            .ok_or_else(|| ArenaError::not_found("debater", submission.debater_id))?;
        self.require_open(&contest, Channel::JudgeScoring).await?;

        let score = JudgeScore::new(
            contest.id,
            submission.judge_id,
            debater.id,
            submission.sheet,
        )?;
        self.store.insert_score(score.clone()).await?;

        info!(
            contest_id = contest.id,
            judge_id = score.judge_id,
            debater_id = score.debater_id,
            total = score.total_score,
            "Score recorded"
        );
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{BroadcastHub, ChannelSubscriber};
    use crate::stage::StageController;
    use crate::state::{ContestStage, ContestStore, Debater, MemoryStore};
    use std::sync::Arc;

    struct Fixture {
        store: Arc<MemoryStore>,
        hub: SharedBroadcastHub,
        controller: StageController,
        desk: SubmissionDesk,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new().shared();
        store.put_contest(Contest::new(1, 7, "Motion", "Blue", "Red")).await;
        store
            .put_debater(Debater {
                id: 100,
                class_id: 7,
                name: "Ada".into(),
                team_side: Some(TeamSide::Pro),
            })
            .await;
        store
            .put_debater(Debater {
                id: 200,
                class_id: 8,
                name: "Other class".into(),
                team_side: None,
            })
            .await;
        let hub = BroadcastHub::new().shared();
        Fixture {
            controller: StageController::new(store.clone(), hub.clone()),
            desk: SubmissionDesk::new(store.clone(), hub.clone()),
            store,
            hub,
        }
    }

    fn vote(voter: UserId, side: &str, phase: &str) -> VoteSubmission {
        VoteSubmission {
            contest_id: 1,
            voter_id: voter,
            team_side: side.into(),
            vote_phase: phase.into(),
        }
    }

    fn score(judge: UserId, debater: UserId, logical: f64) -> ScoreSubmission {
        ScoreSubmission {
            contest_id: 1,
            judge_id: judge,
            debater_id: debater,
            sheet: ScoreSheet {
                language_expression: 16.0,
                logical_reasoning: logical,
                debate_skills: 14.0,
                quick_response: 12.0,
                overall_awareness: 11.0,
                general_impression: 8.0,
            },
        }
    }

    #[tokio::test]
    async fn test_vote_requires_open_channel() {
        let f = fixture().await;
        let err = f.desk.submit_vote(vote(1, "pro", "pre_debate")).await.unwrap_err();
        assert_eq!(
            err,
            ArenaError::ChannelClosed {
                channel: "pre_voting"
            }
        );

        f.controller
            .set_stage(7, ContestStage::PreVoting, Some(1))
            .await
            .unwrap();
        let receipt = f.desk.submit_vote(vote(1, "pro", "pre_debate")).await.unwrap();
        assert_eq!(receipt.total_votes, 1);

        // Post-debate votes stay closed during pre-voting.
        let err = f.desk.submit_vote(vote(1, "con", "post_debate")).await.unwrap_err();
        assert_eq!(err.code(), "CHANNEL_CLOSED");
    }

    #[tokio::test]
    async fn test_vote_validation_order() {
        let f = fixture().await;
        let err = f.desk.submit_vote(vote(1, "left", "pre_debate")).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
        let err = f.desk.submit_vote(vote(1, "pro", "halftime")).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION");

        let mut unknown = vote(1, "pro", "pre_debate");
        unknown.contest_id = 42;
        let err = f.desk.submit_vote(unknown).await.unwrap_err();
        assert_eq!(err, ArenaError::not_found("contest", 42));
    }

    #[tokio::test]
    async fn test_duplicate_vote_conflicts() {
        let f = fixture().await;
        f.controller
            .set_stage(7, ContestStage::PreVoting, Some(1))
            .await
            .unwrap();
        f.desk.submit_vote(vote(1, "pro", "pre_debate")).await.unwrap();
        let err = f.desk.submit_vote(vote(1, "con", "pre_debate")).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        let tally = f.store.vote_tally(1).await.unwrap();
        assert_eq!(tally.pro_pre, 1);
        assert_eq!(tally.con_pre, 0);
    }

    #[tokio::test]
    async fn test_vote_progress_is_global_only() {
        let f = fixture().await;
        let (in_room, mut in_room_rx) = ChannelSubscriber::new(8);
        let (screen, mut screen_rx) = ChannelSubscriber::new(8);
        f.controller
            .set_stage(7, ContestStage::PreVoting, Some(1))
            .await
            .unwrap();
        f.hub.connect(in_room, Some(7));
        f.hub.connect(screen, None);

        f.desk.submit_vote(vote(1, "pro", "pre_debate")).await.unwrap();
        f.desk.submit_vote(vote(2, "con", "pre_debate")).await.unwrap();

        assert!(in_room_rx.try_recv().is_err());
        let _first = screen_rx.try_recv().unwrap();
        let second: serde_json::Value =
            serde_json::from_str(&screen_rx.try_recv().unwrap()).unwrap();
        assert_eq!(second["type"], "vote_progress");
        assert_eq!(second["data"]["total_votes"], 2);
    }

    #[tokio::test]
    async fn test_score_intake() {
        let f = fixture().await;
        let err = f.desk.submit_score(score(10, 100, 18.0)).await.unwrap_err();
        assert_eq!(err.code(), "CHANNEL_CLOSED");

        f.controller
            .set_stage(7, ContestStage::JudgeScoring, Some(1))
            .await
            .unwrap();
        let stored = f.desk.submit_score(score(10, 100, 18.0)).await.unwrap();
        assert_eq!(stored.total_score, 79.0);

        let err = f.desk.submit_score(score(10, 100, 5.0)).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
        let scores = f.store.judge_scores(1).await.unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].sheet.logical_reasoning, 18.0);
    }

    #[tokio::test]
    async fn test_score_rejects_bad_sheet_and_foreign_debater() {
        let f = fixture().await;
        f.controller
            .set_stage(7, ContestStage::JudgeScoring, Some(1))
            .await
            .unwrap();

        let err = f.desk.submit_score(score(10, 100, 21.0)).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
        let err = f.desk.submit_score(score(10, 200, 18.0)).await.unwrap_err();
        assert_eq!(err, ArenaError::not_found("debater", 200));
        assert!(f.store.judge_scores(1).await.unwrap().is_empty());
    }
}
