//! Leaderboard ranking.
//!
//! Every pass ranks a contest from scratch: entries are ordered by roster
//! total (descending), then by join time (earlier wins), then by entry ID,
//! and numbered 1..N. Ranks are never adjusted incrementally.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{
    Contest, ContestBoard, ContestId, EntryId, LeaderboardRow, LeaderboardSnapshot, RosterBook,
    RosterId, UnitOfWork, UserId,
};
use crate::error::GatewayError;

/// An entry eligible for ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankCandidate {
    /// Contest entry.
    pub entry_id: EntryId,
    /// Roster behind the entry.
    pub roster_id: RosterId,
    /// Roster owner.
    pub owner_id: UserId,
    /// Current roster total.
    pub total_points: f64,
    /// Entry timestamp.
    pub joined_at: DateTime<Utc>,
}

fn leaderboard_order(a: &RankCandidate, b: &RankCandidate) -> Ordering {
    b.total_points
        .total_cmp(&a.total_points)
        .then_with(|| a.joined_at.cmp(&b.joined_at))
        .then_with(|| a.entry_id.cmp(&b.entry_id))
}

/// Orders candidates and assigns contiguous ranks starting at 1.
#[must_use]
pub fn rank_entries(mut candidates: Vec<RankCandidate>) -> Vec<LeaderboardRow> {
    candidates.sort_by(leaderboard_order);
    candidates
        .into_iter()
        .zip(1_u32..)
        .map(|(c, rank)| LeaderboardRow {
            rank,
            entry_id: c.entry_id,
            roster_id: c.roster_id,
            owner_id: c.owner_id,
            total_points: c.total_points,
            joined_at: c.joined_at,
        })
        .collect()
}

/// Result of one ranking pass.
#[derive(Debug, Clone)]
pub struct RankOutcome {
    /// Published snapshot.
    pub snapshot: Arc<LeaderboardSnapshot>,
    /// Committed contest state, ranks included.
    pub contest: Contest,
}

/// Ranks contests and publishes their snapshots.
#[derive(Debug, Clone)]
pub struct LeaderboardRanker {
    contests: Arc<ContestBoard>,
    rosters: Arc<RosterBook>,
}

impl LeaderboardRanker {
    /// Creates a ranker over `contests`, reading totals from `rosters`.
    #[must_use]
    pub fn new(contests: Arc<ContestBoard>, rosters: Arc<RosterBook>) -> Self {
        Self { contests, rosters }
    }

    /// Recomputes the contest's ranks and publishes a new snapshot.
    ///
    /// Returns `Ok(None)` without touching the contest when it is already
    /// finalized and `include_finalized` is `false`. Entries whose roster
    /// is missing are skipped and left unranked.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ContestNotFound`] for an unknown contest.
    pub async fn rank(
        &self,
        contest_id: ContestId,
        include_finalized: bool,
    ) -> Result<Option<RankOutcome>, GatewayError> {
        let handle = self.contests.get(contest_id).await?;
        let mut unit = UnitOfWork::begin(handle, "contest_ranking").await;
        if unit.is_finalized && !include_finalized {
            return Ok(None);
        }

        let mut candidates = Vec::with_capacity(unit.entries.len());
        let mut skipped = 0;
        for entry in &unit.entries {
            match self.rosters.get(entry.roster_id).await {
                Ok(roster) => candidates.push(RankCandidate {
                    entry_id: entry.id,
                    roster_id: entry.roster_id,
                    owner_id: entry.owner_id,
                    total_points: roster.read().await.total_points,
                    joined_at: entry.joined_at,
                }),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        %contest_id,
                        entry_id = %entry.id,
                        error = %e,
                        "skipping entry with missing roster"
                    );
                }
            }
        }

        let rows = rank_entries(candidates);
        let ranks: HashMap<EntryId, u32> = rows.iter().map(|r| (r.entry_id, r.rank)).collect();
        for entry in &mut unit.entries {
            entry.rank = ranks.get(&entry.id).copied();
        }
        unit.leaderboard_sequence = unit.leaderboard_sequence.saturating_add(1);

        let snapshot = Arc::new(LeaderboardSnapshot {
            contest_id,
            match_id: unit.match_id,
            sequence: unit.leaderboard_sequence,
            rows,
            skipped_entries: skipped,
            generated_at: Utc::now(),
        });
        let contest = (*unit).clone();
        unit.commit();
        self.contests.publish(Arc::clone(&snapshot)).await;

        tracing::debug!(
            %contest_id,
            sequence = snapshot.sequence,
            ranked = snapshot.rows.len(),
            skipped,
            "contest ranked"
        );
        Ok(Some(RankOutcome { snapshot, contest }))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{MatchId, NewContest, NewRoster, PlayerId, Roster};
    use chrono::Duration;

    fn candidate(total_points: f64, joined_offset_secs: i64) -> RankCandidate {
        RankCandidate {
            entry_id: EntryId::new(),
            roster_id: RosterId::new(),
            owner_id: UserId::new(),
            total_points,
            joined_at: Utc::now() + Duration::seconds(joined_offset_secs),
        }
    }

    #[test]
    fn ranks_are_contiguous_from_one() {
        let rows = rank_entries(vec![
            candidate(5.0, 0),
            candidate(9.0, 1),
            candidate(1.0, 2),
            candidate(9.0, 3),
        ]);
        let ranks: Vec<u32> = rows.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        let totals: Vec<f64> = rows.iter().map(|r| r.total_points).collect();
        assert_eq!(totals, vec![9.0, 9.0, 5.0, 1.0]);
    }

    #[test]
    fn ties_go_to_the_earlier_entry_every_time() {
        let early = candidate(7.0, 0);
        let late = candidate(7.0, 60);
        for _ in 0..5 {
            let rows = rank_entries(vec![late.clone(), early.clone()]);
            assert_eq!(rows.first().map(|r| r.entry_id), Some(early.entry_id));
            assert_eq!(rows.get(1).map(|r| r.entry_id), Some(late.entry_id));
        }
    }

    #[test]
    fn empty_contest_ranks_nothing() {
        assert!(rank_entries(Vec::new()).is_empty());
    }

    struct Fixture {
        contests: Arc<ContestBoard>,
        rosters: Arc<RosterBook>,
        ranker: LeaderboardRanker,
        contest_id: ContestId,
        match_id: MatchId,
    }

    async fn fixture() -> Fixture {
        let contests = Arc::new(ContestBoard::new());
        let rosters = Arc::new(RosterBook::new());
        let match_id = MatchId::new();
        let Ok(contest) = Contest::new(NewContest {
            match_id,
            prize_pool: 100.0,
            prize_distribution: vec![],
        }) else {
            panic!("valid contest");
        };
        let contest_id = contest.id;
        let Ok(_) = contests.insert(contest).await else {
            panic!("insert failed");
        };
        let ranker = LeaderboardRanker::new(Arc::clone(&contests), Arc::clone(&rosters));
        Fixture {
            contests,
            rosters,
            ranker,
            contest_id,
            match_id,
        }
    }

    async fn enter_with_total(f: &Fixture, total_points: f64) -> RosterId {
        let a = PlayerId::new();
        let b = PlayerId::new();
        let Ok(mut roster) = Roster::new(NewRoster {
            owner_id: UserId::new(),
            match_id: f.match_id,
            captain_player_id: a,
            vice_captain_player_id: b,
            members: vec![a, b],
        }) else {
            panic!("valid roster");
        };
        roster.total_points = total_points;
        let roster_id = roster.id;
        let owner_id = roster.owner_id;
        let Ok(_) = f.rosters.insert(roster).await else {
            panic!("insert failed");
        };
        let Ok(handle) = f.contests.get(f.contest_id).await else {
            panic!("contest exists");
        };
        let Ok(_) = handle.write().await.enter(roster_id, owner_id) else {
            panic!("enter failed");
        };
        roster_id
    }

    #[tokio::test]
    async fn zero_entries_is_a_valid_pass() {
        let f = fixture().await;
        let Ok(Some(outcome)) = f.ranker.rank(f.contest_id, false).await else {
            panic!("rank should succeed");
        };
        assert!(outcome.snapshot.rows.is_empty());
        assert_eq!(outcome.snapshot.sequence, 1);
    }

    #[tokio::test]
    async fn missing_roster_is_skipped() {
        let f = fixture().await;
        let kept = enter_with_total(&f, 3.0).await;
        let gone = RosterId::new();
        let Ok(handle) = f.contests.get(f.contest_id).await else {
            panic!("contest exists");
        };
        let Ok(_) = handle.write().await.enter(gone, UserId::new()) else {
            panic!("enter failed");
        };

        let Ok(Some(outcome)) = f.ranker.rank(f.contest_id, false).await else {
            panic!("rank should succeed");
        };
        assert_eq!(outcome.snapshot.skipped_entries, 1);
        assert_eq!(outcome.snapshot.rows.len(), 1);
        assert_eq!(outcome.snapshot.rows.first().map(|r| r.roster_id), Some(kept));
        assert_eq!(outcome.snapshot.rows.first().map(|r| r.rank), Some(1));
        let unranked = outcome.contest.entries.iter().find(|e| e.roster_id == gone);
        assert_eq!(unranked.map(|e| e.rank), Some(None));
    }

    #[tokio::test]
    async fn each_pass_publishes_a_newer_snapshot() {
        let f = fixture().await;
        enter_with_total(&f, 1.0).await;
        for expected in 1..=3 {
            let Ok(Some(_)) = f.ranker.rank(f.contest_id, false).await else {
                panic!("rank should succeed");
            };
            let Ok(published) = f.contests.leaderboard(f.contest_id).await else {
                panic!("published");
            };
            assert_eq!(published.sequence, expected);
        }
    }

    #[tokio::test]
    async fn finalized_contest_is_left_alone_unless_included() {
        let f = fixture().await;
        let Ok(handle) = f.contests.get(f.contest_id).await else {
            panic!("contest exists");
        };
        handle.write().await.is_finalized = true;

        let Ok(None) = f.ranker.rank(f.contest_id, false).await else {
            panic!("finalized contest should be skipped");
        };
        let Ok(Some(_)) = f.ranker.rank(f.contest_id, true).await else {
            panic!("forced rank should run");
        };
    }

    #[tokio::test]
    async fn concurrent_passes_keep_ranks_consistent() {
        let f = fixture().await;
        for total in [4.0, 2.0, 9.0, 2.0, 7.0] {
            enter_with_total(&f, total).await;
        }
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let ranker = f.ranker.clone();
            let contest_id = f.contest_id;
            tasks.push(tokio::spawn(async move { ranker.rank(contest_id, false).await }));
        }
        for task in tasks {
            let Ok(Ok(Some(_))) = task.await else {
                panic!("rank task failed");
            };
        }

        let Ok(contest) = f.contests.snapshot(f.contest_id).await else {
            panic!("contest exists");
        };
        assert_eq!(contest.leaderboard_sequence, 8);
        let mut ranks: Vec<u32> = contest.entries.iter().filter_map(|e| e.rank).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
        let Ok(published) = f.contests.leaderboard(f.contest_id).await else {
            panic!("published");
        };
        assert_eq!(published.sequence, 8);
    }
}
