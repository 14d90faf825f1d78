//! Fantasy rosters and their per-player point entries.
//!
//! A roster's `total_points` is always the sum of its
//! [`PlayerPointEntry::points_earned`] values; both are rewritten together
//! by [`Roster::apply_base_points`] followed by [`Roster::recompute_total`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{MatchId, PlayerId, RosterId, UserId};
use crate::error::GatewayError;

/// Multiplier applied to the captain's base points.
pub const CAPTAIN_MULTIPLIER: f64 = 2.0;

/// Multiplier applied to the vice-captain's base points.
pub const VICE_CAPTAIN_MULTIPLIER: f64 = 1.5;

/// A member's role within a roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RosterRole {
    /// Scores double.
    Captain,
    /// Scores one and a half times.
    ViceCaptain,
    /// Scores base points.
    Member,
}

impl RosterRole {
    /// Returns the fixed multiplier for this role.
    #[must_use]
    pub const fn multiplier(self) -> f64 {
        match self {
            Self::Captain => CAPTAIN_MULTIPLIER,
            Self::ViceCaptain => VICE_CAPTAIN_MULTIPLIER,
            Self::Member => 1.0,
        }
    }

    /// Applies this role's multiplier to `base_points`.
    #[must_use]
    pub fn apply(self, base_points: f64) -> f64 {
        base_points * self.multiplier()
    }
}

/// Points one roster earns from one member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlayerPointEntry {
    /// Member the entry belongs to.
    pub player_id: PlayerId,
    /// Member's role in the roster.
    pub role: RosterRole,
    /// Base points the entry was last computed from.
    pub base_points: f64,
    /// Base points after the role multiplier.
    pub points_earned: f64,
}

/// A user-assembled fantasy team entered for one match.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Roster {
    /// Roster identifier.
    pub id: RosterId,
    /// Owning user.
    pub owner_id: UserId,
    /// Match the roster is built for.
    pub match_id: MatchId,
    /// Captain (must be a member).
    pub captain_player_id: PlayerId,
    /// Vice-captain (must be a member, distinct from the captain).
    pub vice_captain_player_id: PlayerId,
    /// One point entry per member, in member order.
    pub entries: Vec<PlayerPointEntry>,
    /// Sum of every entry's `points_earned`.
    pub total_points: f64,
    /// Set once the match completes.
    pub is_finalized: bool,
    /// Set when the match goes live; blocks roster edits, not scoring.
    pub is_locked: bool,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last point recomputation.
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a roster.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewRoster {
    /// Owning user.
    pub owner_id: UserId,
    /// Match the roster is built for.
    pub match_id: MatchId,
    /// Captain.
    pub captain_player_id: PlayerId,
    /// Vice-captain.
    pub vice_captain_player_id: PlayerId,
    /// Members, including captain and vice-captain.
    pub members: Vec<PlayerId>,
}

impl Roster {
    /// Validates `input` and creates a roster with zeroed point entries.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if members are empty or
    /// duplicated, or if the captain and vice-captain are the same player or
    /// not members.
    pub fn new(input: NewRoster) -> Result<Self, GatewayError> {
        if input.members.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "roster must have at least one member".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(input.members.len());
        if let Some(dup) = input.members.iter().find(|p| !seen.insert(**p)) {
            return Err(GatewayError::InvalidRequest(format!(
                "player {dup} listed twice"
            )));
        }
        if input.captain_player_id == input.vice_captain_player_id {
            return Err(GatewayError::InvalidRequest(
                "captain and vice-captain must differ".to_string(),
            ));
        }
        for (label, player) in [
            ("captain", input.captain_player_id),
            ("vice-captain", input.vice_captain_player_id),
        ] {
            if !seen.contains(&player) {
                return Err(GatewayError::InvalidRequest(format!(
                    "{label} {player} is not a roster member"
                )));
            }
        }

        let now = Utc::now();
        let mut roster = Self {
            id: RosterId::new(),
            owner_id: input.owner_id,
            match_id: input.match_id,
            captain_player_id: input.captain_player_id,
            vice_captain_player_id: input.vice_captain_player_id,
            entries: Vec::with_capacity(input.members.len()),
            total_points: 0.0,
            is_finalized: false,
            is_locked: false,
            created_at: now,
            updated_at: now,
        };
        roster.entries = input
            .members
            .iter()
            .map(|&player_id| PlayerPointEntry {
                player_id,
                role: roster.role_of(player_id),
                base_points: 0.0,
                points_earned: 0.0,
            })
            .collect();
        Ok(roster)
    }

    /// Returns the role `player_id` holds. Non-members report
    /// [`RosterRole::Member`]; use [`Roster::contains`] to test membership.
    #[must_use]
    pub fn role_of(&self, player_id: PlayerId) -> RosterRole {
        if player_id == self.captain_player_id {
            RosterRole::Captain
        } else if player_id == self.vice_captain_player_id {
            RosterRole::ViceCaptain
        } else {
            RosterRole::Member
        }
    }

    /// Returns `true` if `player_id` is a member.
    #[must_use]
    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.entries.iter().any(|e| e.player_id == player_id)
    }

    /// Returns the members in roster order.
    pub fn members(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.entries.iter().map(|e| e.player_id)
    }

    /// Returns the point entry for `player_id`, if a member.
    #[must_use]
    pub fn entry(&self, player_id: PlayerId) -> Option<&PlayerPointEntry> {
        self.entries.iter().find(|e| e.player_id == player_id)
    }

    /// Rewrites the member's entry from fresh base points. Returns `false`
    /// if `player_id` is not a member.
    pub fn apply_base_points(&mut self, player_id: PlayerId, base_points: f64) -> bool {
        let role = self.role_of(player_id);
        let Some(entry) = self.entries.iter_mut().find(|e| e.player_id == player_id) else {
            return false;
        };
        entry.role = role;
        entry.base_points = base_points;
        entry.points_earned = role.apply(base_points);
        true
    }

    /// Recomputes `total_points` from the entries and returns it.
    pub fn recompute_total(&mut self) -> f64 {
        self.total_points = self.entries.iter().map(|e| e.points_earned).sum();
        self.updated_at = Utc::now();
        self.total_points
    }
}
