//! Database row models and their conversion to domain types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::{
    Contest, ContestEntry, ContestId, EntryId, EventId, Match, MatchEvent, MatchId, Payout,
    PlayerId, PlayerPointEntry, PrizeTier, Roster, RosterId, SettlementRecord, TeamId, UserId,
};
use crate::error::GatewayError;

/// Everything read back at startup.
#[derive(Debug, Default)]
pub struct PersistedState {
    /// Every stored match.
    pub matches: Vec<Match>,
    /// Every stored match event.
    pub events: Vec<MatchEvent>,
    /// Every stored roster with its point entries.
    pub rosters: Vec<Roster>,
    /// Every stored contest with entries and settlement.
    pub contests: Vec<Contest>,
}

pub(crate) fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

pub(crate) fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u32(value: i32, field: &str) -> Result<u32, GatewayError> {
    u32::try_from(value)
        .map_err(|_| GatewayError::PersistenceError(format!("negative {field}: {value}")))
}

fn parse_status<T: std::str::FromStr<Err = GatewayError>>(raw: &str) -> Result<T, GatewayError> {
    raw.parse()
        .map_err(|e: GatewayError| GatewayError::PersistenceError(e.to_string()))
}

/// A row of the `matches` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MatchRow {
    /// Match ID.
    pub id: Uuid,
    /// Status string.
    pub status: String,
    /// Series length.
    pub best_of: i32,
    /// Scheduled lock time.
    pub lock_time: Option<DateTime<Utc>>,
    /// Winning team.
    pub winner_team_id: Option<Uuid>,
    /// Most valuable player.
    pub mvp_player_id: Option<Uuid>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl MatchRow {
    /// Converts the row into a [`Match`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] for an unreadable row.
    pub fn into_domain(self) -> Result<Match, GatewayError> {
        Ok(Match {
            id: MatchId::from_uuid(self.id),
            status: parse_status(&self.status)?,
            best_of: to_u32(self.best_of, "best_of")?,
            lock_time: self.lock_time,
            winner_team_id: self.winner_team_id.map(TeamId::from_uuid),
            mvp_player_id: self.mvp_player_id.map(PlayerId::from_uuid),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A row of the `match_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Event ID.
    pub id: Uuid,
    /// Match ID.
    pub match_id: Uuid,
    /// Credited player.
    pub player_id: Uuid,
    /// Action kind.
    pub event_type: String,
    /// Points awarded.
    pub points: f64,
    /// Round number.
    pub round_number: i32,
    /// Recording user.
    pub recorded_by: Uuid,
    /// Recording time.
    pub created_at: DateTime<Utc>,
    /// Last admin edit.
    pub edited_at: Option<DateTime<Utc>>,
}

impl EventRow {
    /// Converts the row into a [`MatchEvent`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] for an unreadable row.
    pub fn into_domain(self) -> Result<MatchEvent, GatewayError> {
        Ok(MatchEvent {
            id: EventId::from_uuid(self.id),
            match_id: MatchId::from_uuid(self.match_id),
            player_id: PlayerId::from_uuid(self.player_id),
            event_type: self.event_type,
            points: self.points,
            round_number: to_u32(self.round_number, "round_number")?,
            recorded_by: UserId::from_uuid(self.recorded_by),
            created_at: self.created_at,
            edited_at: self.edited_at,
        })
    }
}

/// A row of the `rosters` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RosterRow {
    /// Roster ID.
    pub id: Uuid,
    /// Owning user.
    pub owner_id: Uuid,
    /// Match ID.
    pub match_id: Uuid,
    /// Captain.
    pub captain_player_id: Uuid,
    /// Vice-captain.
    pub vice_captain_player_id: Uuid,
    /// Stored total.
    pub total_points: f64,
    /// Finalized flag.
    pub is_finalized: bool,
    /// Locked flag.
    pub is_locked: bool,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last recomputation.
    pub updated_at: DateTime<Utc>,
}

/// A row of the `player_point_entries` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PointEntryRow {
    /// Owning roster.
    pub roster_id: Uuid,
    /// Member.
    pub player_id: Uuid,
    /// Member order within the roster.
    pub position: i32,
    /// Base points last applied.
    pub base_points: f64,
    /// Points after the multiplier.
    pub points_earned: f64,
}

impl RosterRow {
    /// Builds a [`Roster`] from the row and its point entries. Roles are
    /// derived from the captaincy columns.
    #[must_use]
    pub fn into_domain(self, mut entries: Vec<PointEntryRow>) -> Roster {
        entries.sort_by_key(|e| e.position);
        let mut roster = Roster {
            id: RosterId::from_uuid(self.id),
            owner_id: UserId::from_uuid(self.owner_id),
            match_id: MatchId::from_uuid(self.match_id),
            captain_player_id: PlayerId::from_uuid(self.captain_player_id),
            vice_captain_player_id: PlayerId::from_uuid(self.vice_captain_player_id),
            entries: Vec::with_capacity(entries.len()),
            total_points: self.total_points,
            is_finalized: self.is_finalized,
            is_locked: self.is_locked,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        roster.entries = entries
            .into_iter()
            .map(|e| {
                let player_id = PlayerId::from_uuid(e.player_id);
                PlayerPointEntry {
                    player_id,
                    role: roster.role_of(player_id),
                    base_points: e.base_points,
                    points_earned: e.points_earned,
                }
            })
            .collect();
        roster
    }
}

/// A row of the `contests` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContestRow {
    /// Contest ID.
    pub id: Uuid,
    /// Match ID.
    pub match_id: Uuid,
    /// Prize pool.
    pub prize_pool: f64,
    /// Explicit prize table.
    pub prize_distribution: Json<Vec<PrizeTier>>,
    /// Status string.
    pub status: String,
    /// Finalized flag.
    pub is_finalized: bool,
    /// Ranking pass counter.
    pub leaderboard_sequence: i64,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// A row of the `contest_entries` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContestEntryRow {
    /// Entry ID.
    pub id: Uuid,
    /// Contest ID.
    pub contest_id: Uuid,
    /// Roster ID.
    pub roster_id: Uuid,
    /// Roster owner.
    pub owner_id: Uuid,
    /// Rank, if ranked.
    pub rank: Option<i32>,
    /// Entry time.
    pub joined_at: DateTime<Utc>,
}

/// A row of the `settlements` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SettlementRow {
    /// Contest ID.
    pub contest_id: Uuid,
    /// Match ID.
    pub match_id: Uuid,
    /// Pool at settlement time.
    pub prize_pool: f64,
    /// Prize lines.
    pub payouts: Json<Vec<Payout>>,
    /// Amount paid.
    pub total_paid: f64,
    /// Unassigned remainder.
    pub house_retained: f64,
    /// Settlement time.
    pub settled_at: DateTime<Utc>,
}

impl SettlementRow {
    /// Converts the row into a [`SettlementRecord`].
    #[must_use]
    pub fn into_domain(self) -> SettlementRecord {
        SettlementRecord {
            contest_id: ContestId::from_uuid(self.contest_id),
            match_id: MatchId::from_uuid(self.match_id),
            prize_pool: self.prize_pool,
            payouts: self.payouts.0,
            total_paid: self.total_paid,
            house_retained: self.house_retained,
            settled_at: self.settled_at,
        }
    }
}

impl ContestRow {
    /// Builds a [`Contest`] from the row, its entries and its settlement.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] for an unreadable row.
    pub fn into_domain(
        self,
        mut entries: Vec<ContestEntryRow>,
        settlement: Option<SettlementRow>,
    ) -> Result<Contest, GatewayError> {
        entries.sort_by_key(|e| e.joined_at);
        let entries = entries
            .into_iter()
            .map(|e| {
                Ok(ContestEntry {
                    id: EntryId::from_uuid(e.id),
                    contest_id: ContestId::from_uuid(e.contest_id),
                    roster_id: RosterId::from_uuid(e.roster_id),
                    owner_id: UserId::from_uuid(e.owner_id),
                    rank: e.rank.map(|r| to_u32(r, "rank")).transpose()?,
                    joined_at: e.joined_at,
                })
            })
            .collect::<Result<Vec<_>, GatewayError>>()?;
        Ok(Contest {
            id: ContestId::from_uuid(self.id),
            match_id: MatchId::from_uuid(self.match_id),
            prize_pool: self.prize_pool,
            prize_distribution: self.prize_distribution.0,
            status: parse_status(&self.status)?,
            is_finalized: self.is_finalized,
            entries,
            leaderboard_sequence: u64::try_from(self.leaderboard_sequence).unwrap_or(0),
            settlement: settlement.map(SettlementRow::into_domain),
            created_at: self.created_at,
        })
    }
}

/// Groups child rows by their parent key.
pub(crate) fn group_by<T>(rows: Vec<T>, key: impl Fn(&T) -> Uuid) -> HashMap<Uuid, Vec<T>> {
    let mut grouped: HashMap<Uuid, Vec<T>> = HashMap::new();
    for row in rows {
        grouped.entry(key(&row)).or_default().push(row);
    }
    grouped
}
