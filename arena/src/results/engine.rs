//! Result engine for debate contests
//!
//! Read-only aggregation over vote and score records: swing votes, the
//! team verdict and the debater ranking. The calculations themselves are
//! plain functions over aggregates; [`ResultEngine`] only fetches them.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::{debug, info};

use super::types::*;
use crate::error::{ArenaError, ArenaResult};
use crate::state::{
    Contest, ContestId, JudgeScore, SharedContestStore, TeamSide, UserId, VotePhase, VoteTally,
};

/// Compare two sides with the cascading tie-break: swing, then growth
/// rate, then post-debate votes.
pub fn pick_winner(pro: &SideTally, con: &SideTally) -> Winner {
    let ordering = pro
        .swing_vote
        .cmp(&con.swing_vote)
        .then_with(|| pro.growth_rate.compare(&con.growth_rate))
        .then_with(|| pro.post_debate_votes.cmp(&con.post_debate_votes));

    match ordering {
        Ordering::Greater => Winner::Pro,
        Ordering::Less => Winner::Con,
        Ordering::Equal => Winner::Tie,
    }
}

/// Both sides' swing analysis from a tally.
pub fn swing_votes(contest: &Contest, tally: &VoteTally) -> SwingVotes {
    let side = |side: TeamSide| {
        SideTally::new(
            side,
            contest.team_name(side),
            tally.count(side, VotePhase::PreDebate),
            tally.count(side, VotePhase::PostDebate),
        )
    };
    SwingVotes {
        pro: side(TeamSide::Pro),
        con: side(TeamSide::Con),
    }
}

pub fn vote_statistics(tally: &VoteTally) -> VoteStatistics {
    VoteStatistics {
        total_pre_votes: tally.phase_total(VotePhase::PreDebate),
        total_post_votes: tally.phase_total(VotePhase::PostDebate),
        pro_pre_votes: tally.pro_pre,
        pro_post_votes: tally.pro_post,
        pro_swing_vote: tally.pro_post as i64 - tally.pro_pre as i64,
        con_pre_votes: tally.con_pre,
        con_post_votes: tally.con_post,
        con_swing_vote: tally.con_post as i64 - tally.con_pre as i64,
        total_votes_cast: tally.total(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Per-debater averages over every judge sheet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebaterAverages {
    pub debater_id: UserId,
    pub final_score: f64,
    pub logical_reasoning_avg: f64,
    pub debate_skills_avg: f64,
    pub judge_count: usize,
}

/// Average total, logical reasoning and debate skills per debater,
/// rounded to two decimals. Ordered by debater id.
pub fn average_scores(scores: &[JudgeScore]) -> Vec<DebaterAverages> {
    let mut sums: BTreeMap<UserId, (f64, f64, f64, usize)> = BTreeMap::new();
    for score in scores {
        let entry = sums.entry(score.debater_id).or_insert((0.0, 0.0, 0.0, 0));
        entry.0 += score.total_score;
        entry.1 += score.sheet.logical_reasoning;
        entry.2 += score.sheet.debate_skills;
        entry.3 += 1;
    }

    sums.into_iter()
        .map(|(debater_id, (total, logical, skills, count))| {
            let n = count as f64;
            DebaterAverages {
                debater_id,
                final_score: round2(total / n),
                logical_reasoning_avg: round2(logical / n),
                debate_skills_avg: round2(skills / n),
                judge_count: count,
            }
        })
        .collect()
}

/// Sort descending by (final, logical, debate skills) and assign
/// competition ranks: equal triples share a rank and the next distinct
/// triple takes its 1-based position (1, 1, 3).
pub fn assign_ranks(rankings: &mut [DebaterRanking]) {
    rankings.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then_with(|| b.logical_reasoning_avg.total_cmp(&a.logical_reasoning_avg))
            .then_with(|| b.debate_skills_avg.total_cmp(&a.debate_skills_avg))
            .then_with(|| a.debater_id.cmp(&b.debater_id))
    });

    let mut rank = 1;
    for i in 0..rankings.len() {
        if i > 0 && rankings[i].criteria() != rankings[i - 1].criteria() {
            rank = i as u32 + 1;
        }
        rankings[i].rank = rank;
    }
}

/// Result engine over a contest store
pub struct ResultEngine {
    store: SharedContestStore,
}

impl ResultEngine {
    /// Create a new result engine
    pub fn new(store: SharedContestStore) -> Self {
        Self { store }
    }

    async fn contest(&self, contest_id: ContestId) -> ArenaResult<Contest> {
        self.store
            .get_contest(contest_id)
            .await?
            .ok_or_else(|| ArenaError::not_found("contest", contest_id))
    }

    pub async fn calculate_swing_votes(&self, contest_id: ContestId) -> ArenaResult<SwingVotes> {
        let contest = self.contest(contest_id).await?;
        let tally = self.store.vote_tally(contest_id).await?;
        Ok(swing_votes(&contest, &tally))
    }

    pub async fn determine_winner(&self, contest_id: ContestId) -> ArenaResult<Winner> {
        let swing = self.calculate_swing_votes(contest_id).await?;
        Ok(pick_winner(&swing.pro, &swing.con))
    }

    pub async fn vote_statistics(&self, contest_id: ContestId) -> ArenaResult<VoteStatistics> {
        self.contest(contest_id).await?;
        let tally = self.store.vote_tally(contest_id).await?;
        Ok(vote_statistics(&tally))
    }

    pub async fn calculate_debater_rankings(
        &self,
        contest_id: ContestId,
    ) -> ArenaResult<Vec<DebaterRanking>> {
        self.contest(contest_id).await?;
        self.rankings_for(contest_id).await
    }

    async fn rankings_for(&self, contest_id: ContestId) -> ArenaResult<Vec<DebaterRanking>> {
        let scores = self.store.judge_scores(contest_id).await?;
        let averages = average_scores(&scores);

        // Sheets for debaters missing from the roster are left out.
        let mut rankings = Vec::with_capacity(averages.len());
        for avg in averages {
            let Some(debater) = self.store.get_debater(avg.debater_id).await? else {
                debug!(contest_id, debater_id = avg.debater_id, "Unranked: not on roster");
                continue;
            };
            rankings.push(DebaterRanking {
                debater_id: avg.debater_id,
                debater_name: debater.name,
                team_side: debater.team_side,
                final_score: avg.final_score,
                logical_reasoning_avg: avg.logical_reasoning_avg,
                debate_skills_avg: avg.debate_skills_avg,
                judge_count: avg.judge_count,
                rank: 0,
            });
        }
        assign_ranks(&mut rankings);

        debug!(
            contest_id,
            sheets = scores.len(),
            debaters = rankings.len(),
            "Debater rankings calculated"
        );
        Ok(rankings)
    }

    /// Compose the full result. The contest is resolved once and one
    /// tally feeds both the swing analysis and the vote count.
    pub async fn calculate_contest_result(
        &self,
        contest_id: ContestId,
    ) -> ArenaResult<ContestResult> {
        let contest = self.contest(contest_id).await?;
        let tally = self.store.vote_tally(contest_id).await?;
        let swing = swing_votes(&contest, &tally);
        let winning_team = pick_winner(&swing.pro, &swing.con);
        let debater_rankings = self.rankings_for(contest_id).await?;

        info!(
            contest_id,
            winner = %winning_team,
            pro_swing = swing.pro.swing_vote,
            con_swing = swing.con.swing_vote,
            "Contest result calculated"
        );

        Ok(ContestResult {
            contest_id,
            winning_team,
            pro_team_swing: swing.pro.swing_vote,
            con_team_swing: swing.con.swing_vote,
            total_votes_cast: tally.total(),
            debater_rankings,
            vote_analysis: vec![swing.pro, swing.con],
        })
    }
}
