//! Domain facts published after state changes.
//!
//! Every committed change emits a [`DomainEvent`] through the
//! [`super::EventBus`]. The notification collaborator consumes
//! `contest_outcome_changed` to reach users; everything else is
//! informational.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ContestId, EventId, MatchId, MatchStatus, PlayerId, UserId};

/// Kind of admin correction applied to a match event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmendmentKind {
    /// Event values were edited.
    Edited,
    /// Event was deleted.
    Deleted,
}

/// Why a contest's outcome changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeReason {
    /// A manual full recompute re-ranked the contest.
    Recalculated,
    /// Prizes were distributed.
    Settled,
}

/// Domain event emitted after every committed state change.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A match event was recorded.
    EventRecorded {
        /// Match the event belongs to.
        match_id: MatchId,
        /// Recorded event.
        event_id: EventId,
        /// Credited player.
        player_id: PlayerId,
        /// Points awarded.
        points: f64,
        /// Recording timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A match event was edited or deleted by an admin.
    EventAmended {
        /// Match the event belongs to.
        match_id: MatchId,
        /// Amended event.
        event_id: EventId,
        /// Edit or delete.
        kind: AmendmentKind,
        /// Amendment timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A match changed lifecycle status.
    MatchStatusChanged {
        /// Match identifier.
        match_id: MatchId,
        /// Previous status.
        from: MatchStatus,
        /// New status.
        to: MatchStatus,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A contest was re-ranked.
    LeaderboardUpdated {
        /// Contest identifier.
        contest_id: ContestId,
        /// New snapshot sequence.
        sequence: u64,
        /// Number of ranked entries.
        ranked_entries: usize,
        /// Ranking timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A contest's outcome changed; the notification collaborator turns
    /// this into user-facing messages.
    ContestOutcomeChanged {
        /// Contest identifier.
        contest_id: ContestId,
        /// Users whose standing or balance changed.
        affected_user_ids: Vec<UserId>,
        /// What changed.
        reason: OutcomeReason,
        /// Timestamp of the change.
        timestamp: DateTime<Utc>,
    },

    /// A contest was settled.
    ContestSettled {
        /// Contest identifier.
        contest_id: ContestId,
        /// Winners credited by this settlement.
        winners_paid: usize,
        /// Amount credited by this settlement.
        total_paid: f64,
        /// Settlement timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Returns the contest this event concerns, if any.
    #[must_use]
    pub fn contest_id(&self) -> Option<ContestId> {
        match self {
            Self::LeaderboardUpdated { contest_id, .. }
            | Self::ContestOutcomeChanged { contest_id, .. }
            | Self::ContestSettled { contest_id, .. } => Some(*contest_id),
            Self::EventRecorded { .. }
            | Self::EventAmended { .. }
            | Self::MatchStatusChanged { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::EventRecorded { .. } => "event_recorded",
            Self::EventAmended { .. } => "event_amended",
            Self::MatchStatusChanged { .. } => "match_status_changed",
            Self::LeaderboardUpdated { .. } => "leaderboard_updated",
            Self::ContestOutcomeChanged { .. } => "contest_outcome_changed",
            Self::ContestSettled { .. } => "contest_settled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_changed_serializes_with_tag() {
        let contest_id = ContestId::new();
        let event = DomainEvent::ContestOutcomeChanged {
            contest_id,
            affected_user_ids: vec![UserId::new()],
            reason: OutcomeReason::Settled,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"event_type\":\"contest_outcome_changed\""));
        assert!(json.contains("\"reason\":\"settled\""));
        assert_eq!(event.contest_id(), Some(contest_id));
    }

    #[test]
    fn match_events_have_no_contest() {
        let event = DomainEvent::MatchStatusChanged {
            match_id: MatchId::new(),
            from: MatchStatus::Upcoming,
            to: MatchStatus::Live,
            timestamp: Utc::now(),
        };
        assert_eq!(event.event_type_str(), "match_status_changed");
        assert!(event.contest_id().is_none());
    }
}
