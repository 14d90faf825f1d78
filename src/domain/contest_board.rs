//! Contest storage with a match index and published leaderboards.
//!
//! Each contest sits behind its own write lock, which serializes ranking,
//! entry and settlement writes for that contest. Published snapshots live
//! in a separate map: a reader only ever waits for the pointer swap, never
//! for a ranking pass in progress.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::contest::Contest;
use super::leaderboard::LeaderboardSnapshot;
use super::registry::Registry;
use super::{ContestId, MatchId};
use crate::error::GatewayError;

/// Contests keyed by ID plus their latest published leaderboards.
#[derive(Debug)]
pub struct ContestBoard {
    contests: Registry<ContestId, Contest>,
    by_match: RwLock<HashMap<MatchId, BTreeSet<ContestId>>>,
    published: RwLock<HashMap<ContestId, Arc<LeaderboardSnapshot>>>,
}

impl ContestBoard {
    /// Creates an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self {
            contests: Registry::new(GatewayError::ContestNotFound),
            by_match: RwLock::new(HashMap::new()),
            published: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a contest and publishes an empty leaderboard for it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AlreadyExists`] on a duplicate contest ID.
    pub async fn insert(&self, contest: Contest) -> Result<Arc<RwLock<Contest>>, GatewayError> {
        let contest_id = contest.id;
        let match_id = contest.match_id;
        let handle = self.contests.insert(contest_id, contest).await?;
        self.index(contest_id, match_id).await;
        self.published.write().await.insert(
            contest_id,
            Arc::new(LeaderboardSnapshot::empty(contest_id, match_id)),
        );
        Ok(handle)
    }

    /// Inserts or replaces a contest loaded from storage.
    pub async fn upsert(&self, contest: Contest) {
        let contest_id = contest.id;
        let match_id = contest.match_id;
        let mut empty = LeaderboardSnapshot::empty(contest_id, match_id);
        empty.sequence = contest.leaderboard_sequence;
        self.contests.upsert(contest_id, contest).await;
        self.index(contest_id, match_id).await;
        self.published
            .write()
            .await
            .entry(contest_id)
            .or_insert_with(|| Arc::new(empty));
    }

    async fn index(&self, contest_id: ContestId, match_id: MatchId) {
        self.by_match
            .write()
            .await
            .entry(match_id)
            .or_default()
            .insert(contest_id);
    }

    /// Returns the contest handle behind its per-contest lock.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ContestNotFound`] for an unknown ID.
    pub async fn get(&self, contest_id: ContestId) -> Result<Arc<RwLock<Contest>>, GatewayError> {
        self.contests.get(contest_id).await
    }

    /// Returns a copy of the contest's current state.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ContestNotFound`] for an unknown ID.
    pub async fn snapshot(&self, contest_id: ContestId) -> Result<Contest, GatewayError> {
        let handle = self.contests.get(contest_id).await?;
        let contest = handle.read().await.clone();
        Ok(contest)
    }

    /// Returns the IDs of every contest built on `match_id`.
    pub async fn contests_for_match(&self, match_id: MatchId) -> Vec<ContestId> {
        self.by_match
            .read()
            .await
            .get(&match_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Publishes a snapshot if it is newer than the one already published.
    /// Returns `true` if it replaced the previous snapshot.
    pub async fn publish(&self, snapshot: Arc<LeaderboardSnapshot>) -> bool {
        let mut published = self.published.write().await;
        match published.get(&snapshot.contest_id) {
            Some(current) if current.sequence >= snapshot.sequence => false,
            _ => {
                published.insert(snapshot.contest_id, snapshot);
                true
            }
        }
    }

    /// Returns the latest published leaderboard.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ContestNotFound`] for an unknown contest.
    pub async fn leaderboard(
        &self,
        contest_id: ContestId,
    ) -> Result<Arc<LeaderboardSnapshot>, GatewayError> {
        self.published
            .read()
            .await
            .get(&contest_id)
            .cloned()
            .ok_or(GatewayError::ContestNotFound(contest_id))
    }
}

impl Default for ContestBoard {
    fn default() -> Self {
        Self::new()
    }
}
