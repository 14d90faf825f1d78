//! Published leaderboard snapshots and per-viewer views of them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{ContestId, EntryId, MatchId, RosterId, UserId};

/// One ranked line of a leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LeaderboardRow {
    /// Rank, 1-based and contiguous.
    pub rank: u32,
    /// Contest entry.
    pub entry_id: EntryId,
    /// Roster behind the entry.
    pub roster_id: RosterId,
    /// Roster owner.
    pub owner_id: UserId,
    /// Roster total at ranking time.
    pub total_points: f64,
    /// Entry timestamp (tie-break key).
    pub joined_at: DateTime<Utc>,
}

/// Full ranking of a contest produced by one ranking pass.
///
/// Snapshots are immutable and shared behind `Arc`; a newer pass produces
/// a new snapshot with a higher `sequence`.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardSnapshot {
    /// Contest ranked.
    pub contest_id: ContestId,
    /// Match the contest belongs to.
    pub match_id: MatchId,
    /// Ranking pass counter; strictly increasing per contest.
    pub sequence: u64,
    /// Every ranked entry in rank order.
    pub rows: Vec<LeaderboardRow>,
    /// Entries skipped because their roster is missing.
    pub skipped_entries: usize,
    /// Time the pass completed.
    pub generated_at: DateTime<Utc>,
}

/// A viewer's own standing.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ViewerStanding {
    /// Viewer's best-ranked entry.
    pub entry_id: EntryId,
    /// Rank of that entry.
    pub rank: u32,
    /// Points of that entry.
    pub total_points: f64,
}

/// Top-N slice of a snapshot, optionally with the viewer's standing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardView {
    /// Contest ranked.
    pub contest_id: ContestId,
    /// Snapshot sequence the view was cut from.
    pub sequence: u64,
    /// Number of ranked entries in the full snapshot.
    pub total_entries: usize,
    /// Top-N rows.
    pub entries: Vec<LeaderboardRow>,
    /// Viewer standing, when a viewer with a ranked entry was given.
    pub viewer: Option<ViewerStanding>,
    /// Snapshot generation time.
    pub generated_at: DateTime<Utc>,
}

impl LeaderboardSnapshot {
    /// Returns an empty snapshot (sequence 0) for a contest that has not
    /// been ranked yet.
    #[must_use]
    pub fn empty(contest_id: ContestId, match_id: MatchId) -> Self {
        Self {
            contest_id,
            match_id,
            sequence: 0,
            rows: Vec::new(),
            skipped_entries: 0,
            generated_at: Utc::now(),
        }
    }

    /// Returns the viewer's best-ranked row, if any.
    #[must_use]
    pub fn standing_of(&self, viewer: UserId) -> Option<ViewerStanding> {
        self.rows
            .iter()
            .find(|row| row.owner_id == viewer)
            .map(|row| ViewerStanding {
                entry_id: row.entry_id,
                rank: row.rank,
                total_points: row.total_points,
            })
    }

    /// Cuts a view with the top `top_n` rows and the viewer's standing.
    #[must_use]
    pub fn view(&self, top_n: usize, viewer: Option<UserId>) -> LeaderboardView {
        LeaderboardView {
            contest_id: self.contest_id,
            sequence: self.sequence,
            total_entries: self.rows.len(),
            entries: self.rows.iter().take(top_n).cloned().collect(),
            viewer: viewer.and_then(|v| self.standing_of(v)),
            generated_at: self.generated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(rank: u32, owner_id: UserId, total_points: f64) -> LeaderboardRow {
        LeaderboardRow {
            rank,
            entry_id: EntryId::new(),
            roster_id: RosterId::new(),
            owner_id,
            total_points,
            joined_at: Utc::now(),
        }
    }

    #[test]
    fn view_truncates_and_finds_viewer_outside_top_n() {
        let viewer = UserId::new();
        let mut snapshot = LeaderboardSnapshot::empty(ContestId::new(), MatchId::new());
        snapshot.sequence = 4;
        snapshot.rows = vec![
            row(1, UserId::new(), 30.0),
            row(2, UserId::new(), 20.0),
            row(3, viewer, 10.0),
        ];

        let view = snapshot.view(2, Some(viewer));
        assert_eq!(view.entries.len(), 2);
        assert_eq!(view.total_entries, 3);
        assert_eq!(view.sequence, 4);
        assert_eq!(view.viewer.map(|s| s.rank), Some(3));
    }

    #[test]
    fn unknown_viewer_has_no_standing() {
        let snapshot = LeaderboardSnapshot::empty(ContestId::new(), MatchId::new());
        let view = snapshot.view(10, Some(UserId::new()));
        assert!(view.viewer.is_none());
        assert!(view.entries.is_empty());
    }
}
