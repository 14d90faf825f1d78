//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;

use super::models::{
    ContestEntryRow, ContestRow, EventRow, MatchRow, PersistedState, PointEntryRow, RosterRow,
    SettlementRow, group_by, to_i32, to_i64,
};
use crate::config::GatewayConfig;
use crate::domain::{Contest, EventId, Match, MatchEvent, Roster};
use crate::error::GatewayError;

/// PostgreSQL-backed persistence layer using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool from the configuration and applies pending
    /// migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] if the database is
    /// unreachable or a migration fails.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        tracing::info!("persistence connected, migrations applied");
        Ok(Self::new(pool))
    }

    /// Upserts a match.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn save_match(&self, m: &Match) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO matches \
                (id, status, best_of, lock_time, winner_team_id, mvp_player_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET \
                status = EXCLUDED.status, \
                lock_time = EXCLUDED.lock_time, \
                winner_team_id = EXCLUDED.winner_team_id, \
                mvp_player_id = EXCLUDED.mvp_player_id, \
                updated_at = EXCLUDED.updated_at",
        )
        .bind(*m.id.as_uuid())
        .bind(m.status.as_str())
        .bind(to_i32(m.best_of))
        .bind(m.lock_time)
        .bind(m.winner_team_id.map(uuid::Uuid::from))
        .bind(m.mvp_player_id.map(uuid::Uuid::from))
        .bind(m.created_at)
        .bind(m.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        Ok(())
    }

    /// Upserts a match event. Amendments overwrite the stored row.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn save_event(&self, event: &MatchEvent) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO match_events \
                (id, match_id, player_id, event_type, points, round_number, recorded_by, created_at, edited_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET \
                event_type = EXCLUDED.event_type, \
                points = EXCLUDED.points, \
                round_number = EXCLUDED.round_number, \
                edited_at = EXCLUDED.edited_at",
        )
        .bind(*event.id.as_uuid())
        .bind(*event.match_id.as_uuid())
        .bind(*event.player_id.as_uuid())
        .bind(&event.event_type)
        .bind(event.points)
        .bind(to_i32(event.round_number))
        .bind(*event.recorded_by.as_uuid())
        .bind(event.created_at)
        .bind(event.edited_at)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        Ok(())
    }

    /// Deletes a match event.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn delete_event(&self, event_id: EventId) -> Result<(), GatewayError> {
        sqlx::query("DELETE FROM match_events WHERE id = $1")
            .bind(*event_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        Ok(())
    }

    /// Upserts a roster and its point entries in one transaction.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn save_roster(&self, roster: &Roster) -> Result<(), GatewayError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO rosters \
                (id, owner_id, match_id, captain_player_id, vice_captain_player_id, \
                 total_points, is_finalized, is_locked, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO UPDATE SET \
                total_points = EXCLUDED.total_points, \
                is_finalized = EXCLUDED.is_finalized, \
                is_locked = EXCLUDED.is_locked, \
                updated_at = EXCLUDED.updated_at",
        )
        .bind(*roster.id.as_uuid())
        .bind(*roster.owner_id.as_uuid())
        .bind(*roster.match_id.as_uuid())
        .bind(*roster.captain_player_id.as_uuid())
        .bind(*roster.vice_captain_player_id.as_uuid())
        .bind(roster.total_points)
        .bind(roster.is_finalized)
        .bind(roster.is_locked)
        .bind(roster.created_at)
        .bind(roster.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, entry) in (0_i32..).zip(&roster.entries) {
            sqlx::query(
                "INSERT INTO player_point_entries \
                    (roster_id, player_id, position, base_points, points_earned) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (roster_id, player_id) DO UPDATE SET \
                    base_points = EXCLUDED.base_points, \
                    points_earned = EXCLUDED.points_earned",
            )
            .bind(*roster.id.as_uuid())
            .bind(*entry.player_id.as_uuid())
            .bind(position)
            .bind(entry.base_points)
            .bind(entry.points_earned)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Upserts a contest, its entries and its settlement record in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn save_contest(&self, contest: &Contest) -> Result<(), GatewayError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO contests \
                (id, match_id, prize_pool, prize_distribution, status, is_finalized, \
                 leaderboard_sequence, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET \
                status = EXCLUDED.status, \
                is_finalized = EXCLUDED.is_finalized, \
                leaderboard_sequence = GREATEST(contests.leaderboard_sequence, EXCLUDED.leaderboard_sequence)",
        )
        .bind(*contest.id.as_uuid())
        .bind(*contest.match_id.as_uuid())
        .bind(contest.prize_pool)
        .bind(Json(&contest.prize_distribution))
        .bind(contest.status.as_str())
        .bind(contest.is_finalized)
        .bind(to_i64(contest.leaderboard_sequence))
        .bind(contest.created_at)
        .execute(&mut *tx)
        .await?;

        for entry in &contest.entries {
            sqlx::query(
                "INSERT INTO contest_entries (id, contest_id, roster_id, owner_id, rank, joined_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (id) DO UPDATE SET rank = EXCLUDED.rank",
            )
            .bind(*entry.id.as_uuid())
            .bind(*entry.contest_id.as_uuid())
            .bind(*entry.roster_id.as_uuid())
            .bind(*entry.owner_id.as_uuid())
            .bind(entry.rank.map(to_i32))
            .bind(entry.joined_at)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(record) = &contest.settlement {
            sqlx::query(
                "INSERT INTO settlements \
                    (contest_id, match_id, prize_pool, payouts, total_paid, house_retained, settled_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (contest_id) DO NOTHING",
            )
            .bind(*record.contest_id.as_uuid())
            .bind(*record.match_id.as_uuid())
            .bind(record.prize_pool)
            .bind(Json(&record.payouts))
            .bind(record.total_paid)
            .bind(record.house_retained)
            .bind(record.settled_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Reads every stored entity back for startup hydration.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure or
    /// an unreadable row.
    pub async fn load_state(&self) -> Result<PersistedState, GatewayError> {
        let matches = sqlx::query_as::<_, MatchRow>("SELECT * FROM matches")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(MatchRow::into_domain)
            .collect::<Result<Vec<_>, _>>()?;

        let events = sqlx::query_as::<_, EventRow>(
            "SELECT * FROM match_events ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(EventRow::into_domain)
        .collect::<Result<Vec<_>, _>>()?;

        let point_entries =
            sqlx::query_as::<_, PointEntryRow>("SELECT * FROM player_point_entries")
                .fetch_all(&self.pool)
                .await?;
        let mut entries_by_roster = group_by(point_entries, |e| e.roster_id);
        let rosters: Vec<Roster> = sqlx::query_as::<_, RosterRow>("SELECT * FROM rosters")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| {
                let entries = entries_by_roster.remove(&row.id).unwrap_or_default();
                row.into_domain(entries)
            })
            .collect();

        let contest_entries = sqlx::query_as::<_, ContestEntryRow>("SELECT * FROM contest_entries")
            .fetch_all(&self.pool)
            .await?;
        let mut entries_by_contest = group_by(contest_entries, |e| e.contest_id);
        let settlements = sqlx::query_as::<_, SettlementRow>("SELECT * FROM settlements")
            .fetch_all(&self.pool)
            .await?;
        let mut settlement_by_contest: std::collections::HashMap<_, _> =
            settlements.into_iter().map(|s| (s.contest_id, s)).collect();
        let contests = sqlx::query_as::<_, ContestRow>("SELECT * FROM contests")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| {
                let entries = entries_by_contest.remove(&row.id).unwrap_or_default();
                let settlement = settlement_by_contest.remove(&row.id);
                row.into_domain(entries, settlement)
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            matches = matches.len(),
            events = events.len(),
            rosters = rosters.len(),
            contests = contests.len(),
            "persisted state loaded"
        );
        Ok(PersistedState {
            matches,
            events,
            rosters,
            contests,
        })
    }
}
