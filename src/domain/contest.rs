//! Contests, their entries and prize tables.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ContestId, EntryId, MatchId, RosterId, UserId};
use crate::error::GatewayError;

/// Prize table used when a contest carries none: 50% to rank 1, 30% to
/// rank 2. The remaining 20% is retained by the house.
pub static DEFAULT_PRIZE_DISTRIBUTION: [PrizeTier; 2] = [
    PrizeTier {
        rank: 1,
        percentage: 50.0,
    },
    PrizeTier {
        rank: 2,
        percentage: 30.0,
    },
];

/// Lifecycle status of a contest. One-way: `upcoming → live → completed`,
/// or `→ cancelled` from `upcoming`/`live`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContestStatus {
    /// Accepting entries.
    Upcoming,
    /// Match in play.
    Live,
    /// Match finished; eligible for settlement.
    Completed,
    /// Called off.
    Cancelled,
}

impl ContestStatus {
    /// Returns `true` if `to` follows `self` in the one-way progression.
    #[must_use]
    pub const fn can_advance_to(self, to: ContestStatus) -> bool {
        matches!(
            (self, to),
            (Self::Upcoming, Self::Live)
                | (Self::Upcoming, Self::Cancelled)
                | (Self::Live, Self::Completed)
                | (Self::Live, Self::Cancelled)
        )
    }

    /// Returns the status as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Live => "live",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ContestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContestStatus {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(Self::Upcoming),
            "live" => Ok(Self::Live),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(GatewayError::InvalidRequest(format!(
                "unknown contest status: {other}"
            ))),
        }
    }
}

/// Share of the prize pool paid to one rank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PrizeTier {
    /// Rank paid by this tier (1-based).
    pub rank: u32,
    /// Percentage of the pool, in `(0, 100]`.
    pub percentage: f64,
}

/// Validates a prize table.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if a rank is zero or repeated,
/// a percentage is outside `(0, 100]`, or the percentages sum past 100.
pub fn validate_distribution(tiers: &[PrizeTier]) -> Result<(), GatewayError> {
    let mut ranks = HashSet::with_capacity(tiers.len());
    let mut total = 0.0;
    for tier in tiers {
        if tier.rank == 0 {
            return Err(GatewayError::InvalidRequest(
                "prize ranks start at 1".to_string(),
            ));
        }
        if !ranks.insert(tier.rank) {
            return Err(GatewayError::InvalidRequest(format!(
                "rank {} listed twice in prize distribution",
                tier.rank
            )));
        }
        if !(tier.percentage > 0.0 && tier.percentage <= 100.0) {
            return Err(GatewayError::InvalidRequest(format!(
                "percentage for rank {} must be in (0, 100]",
                tier.rank
            )));
        }
        total += tier.percentage;
    }
    if total > 100.0 + 1e-9 {
        return Err(GatewayError::InvalidRequest(format!(
            "prize distribution sums to {total}%"
        )));
    }
    Ok(())
}

/// A roster entered into a contest.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContestEntry {
    /// Entry identifier.
    pub id: EntryId,
    /// Contest entered.
    pub contest_id: ContestId,
    /// Roster entered.
    pub roster_id: RosterId,
    /// Roster owner (prize recipient).
    pub owner_id: UserId,
    /// Current rank; `None` until the first ranking pass or while the
    /// roster is missing.
    pub rank: Option<u32>,
    /// Entry timestamp; earlier entries win ties.
    pub joined_at: DateTime<Utc>,
}

/// Outcome of one prize credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Credited by this settlement run.
    Credited,
    /// The wallet had already applied this credit.
    AlreadyCredited,
    /// The credit failed.
    Failed {
        /// Wallet error message.
        reason: String,
    },
}

/// One prize line of a settlement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Payout {
    /// Winning entry.
    pub entry_id: EntryId,
    /// Winning roster.
    pub roster_id: RosterId,
    /// Credited user.
    pub owner_id: UserId,
    /// Rank paid.
    pub rank: u32,
    /// Percentage of the pool.
    pub percentage: f64,
    /// Amount credited.
    pub amount: f64,
    /// Credit outcome.
    pub outcome: PayoutStatus,
}

/// Immutable result of settling one contest.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettlementRecord {
    /// Contest settled.
    pub contest_id: ContestId,
    /// Match the contest belongs to.
    pub match_id: MatchId,
    /// Pool at settlement time.
    pub prize_pool: f64,
    /// Prize lines, in rank order.
    pub payouts: Vec<Payout>,
    /// Sum of successfully credited amounts.
    pub total_paid: f64,
    /// Pool share not assigned to any paid rank.
    pub house_retained: f64,
    /// Settlement timestamp.
    pub settled_at: DateTime<Utc>,
}

/// A pool of roster entries competing for a prize tied to one match.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Contest {
    /// Contest identifier.
    pub id: ContestId,
    /// Match the contest is built on.
    pub match_id: MatchId,
    /// Total prize pool.
    pub prize_pool: f64,
    /// Explicit prize table; empty means [`DEFAULT_PRIZE_DISTRIBUTION`].
    pub prize_distribution: Vec<PrizeTier>,
    /// Lifecycle status.
    pub status: ContestStatus,
    /// Set exactly once, by settlement.
    pub is_finalized: bool,
    /// Entries in join order.
    pub entries: Vec<ContestEntry>,
    /// Number of completed ranking passes.
    pub leaderboard_sequence: u64,
    /// Settlement result once finalized.
    pub settlement: Option<SettlementRecord>,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
}

/// Input for registering a contest.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewContest {
    /// Match the contest is built on.
    pub match_id: MatchId,
    /// Total prize pool.
    pub prize_pool: f64,
    /// Optional explicit prize table.
    #[serde(default)]
    pub prize_distribution: Vec<PrizeTier>,
}

impl Contest {
    /// Validates `input` and creates an empty `upcoming` contest.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a negative or
    /// non-finite pool or an invalid prize table.
    pub fn new(input: NewContest) -> Result<Self, GatewayError> {
        if !(input.prize_pool.is_finite() && input.prize_pool >= 0.0) {
            return Err(GatewayError::InvalidRequest(
                "prize_pool must be a non-negative number".to_string(),
            ));
        }
        validate_distribution(&input.prize_distribution)?;
        let mut prize_distribution = input.prize_distribution;
        prize_distribution.sort_by_key(|t| t.rank);
        Ok(Self {
            id: ContestId::new(),
            match_id: input.match_id,
            prize_pool: input.prize_pool,
            prize_distribution,
            status: ContestStatus::Upcoming,
            is_finalized: false,
            entries: Vec::new(),
            leaderboard_sequence: 0,
            settlement: None,
            created_at: Utc::now(),
        })
    }

    /// Returns the prize table in effect.
    #[must_use]
    pub fn effective_distribution(&self) -> &[PrizeTier] {
        if self.prize_distribution.is_empty() {
            &DEFAULT_PRIZE_DISTRIBUTION
        } else {
            &self.prize_distribution
        }
    }

    /// Enters a roster and returns the new entry.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] unless the contest is
    /// `upcoming`, and [`GatewayError::AlreadyExists`] if the roster is
    /// already entered.
    pub fn enter(&mut self, roster_id: RosterId, owner_id: UserId) -> Result<ContestEntry, GatewayError> {
        if self.status != ContestStatus::Upcoming {
            return Err(GatewayError::InvalidRequest(format!(
                "contest {} is {} and no longer accepts entries",
                self.id, self.status
            )));
        }
        if self.entries.iter().any(|e| e.roster_id == roster_id) {
            return Err(GatewayError::AlreadyExists(format!(
                "roster {roster_id} in contest {}",
                self.id
            )));
        }
        let entry = ContestEntry {
            id: EntryId::new(),
            contest_id: self.id,
            roster_id,
            owner_id,
            rank: None,
            joined_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Moves the contest forward. Returns `false` (and changes nothing) if
    /// `to` does not follow the current status.
    pub fn advance(&mut self, to: ContestStatus) -> bool {
        if self.status.can_advance_to(to) {
            self.status = to;
            true
        } else {
            false
        }
    }

    /// Returns the ranked entries in rank order.
    #[must_use]
    pub fn ranked_entries(&self) -> Vec<&ContestEntry> {
        let mut ranked: Vec<&ContestEntry> = self.entries.iter().filter(|e| e.rank.is_some()).collect();
        ranked.sort_by_key(|e| e.rank);
        ranked
    }

    /// Returns the owners of every entry, deduplicated, in join order.
    #[must_use]
    pub fn participant_ids(&self) -> Vec<UserId> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| seen.insert(e.owner_id))
            .map(|e| e.owner_id)
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn contest(prize_distribution: Vec<PrizeTier>) -> Contest {
        let Ok(contest) = Contest::new(NewContest {
            match_id: MatchId::new(),
            prize_pool: 1000.0,
            prize_distribution,
        }) else {
            panic!("valid contest");
        };
        contest
    }

    #[test]
    fn default_distribution_pays_top_two() {
        let c = contest(vec![]);
        let tiers = c.effective_distribution();
        assert_eq!(tiers.len(), 2);
        assert_eq!(tiers.first().map(|t| t.rank), Some(1));
        assert_eq!(tiers.get(1).map(|t| t.percentage), Some(30.0));
    }

    #[test]
    fn explicit_distribution_is_sorted_by_rank() {
        let c = contest(vec![
            PrizeTier {
                rank: 2,
                percentage: 20.0,
            },
            PrizeTier {
                rank: 1,
                percentage: 70.0,
            },
        ]);
        let ranks: Vec<u32> = c.effective_distribution().iter().map(|t| t.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
    }

    #[test]
    fn invalid_distributions_are_rejected() {
        let over = [
            PrizeTier {
                rank: 1,
                percentage: 80.0,
            },
            PrizeTier {
                rank: 2,
                percentage: 30.0,
            },
        ];
        assert!(validate_distribution(&over).is_err());
        let dup = [
            PrizeTier {
                rank: 1,
                percentage: 10.0,
            },
            PrizeTier {
                rank: 1,
                percentage: 10.0,
            },
        ];
        assert!(validate_distribution(&dup).is_err());
        let zero_rank = [PrizeTier {
            rank: 0,
            percentage: 10.0,
        }];
        assert!(validate_distribution(&zero_rank).is_err());
        let zero_pct = [PrizeTier {
            rank: 1,
            percentage: 0.0,
        }];
        assert!(validate_distribution(&zero_pct).is_err());
    }

    #[test]
    fn enter_rejects_duplicates_and_closed_contests() {
        let mut c = contest(vec![]);
        let roster = RosterId::new();
        assert!(c.enter(roster, UserId::new()).is_ok());
        assert!(matches!(
            c.enter(roster, UserId::new()),
            Err(GatewayError::AlreadyExists(_))
        ));

        assert!(c.advance(ContestStatus::Live));
        assert!(c.enter(RosterId::new(), UserId::new()).is_err());
    }

    #[test]
    fn status_progression_is_one_way() {
        let mut c = contest(vec![]);
        assert!(!c.advance(ContestStatus::Completed));
        assert!(c.advance(ContestStatus::Live));
        assert!(c.advance(ContestStatus::Completed));
        assert!(!c.advance(ContestStatus::Live));
        assert!(!c.advance(ContestStatus::Cancelled));
        assert_eq!(c.status, ContestStatus::Completed);
    }

    #[test]
    fn negative_pool_is_rejected() {
        let result = Contest::new(NewContest {
            match_id: MatchId::new(),
            prize_pool: -1.0,
            prize_distribution: vec![],
        });
        assert!(result.is_err());
    }
}
