//! Match lifecycle state machine.
//!
//! A [`Match`] moves through [`MatchStatus`] values according to a fixed
//! transition table. The status gates every scoring operation: events are
//! accepted only while play is in progress, and prize settlement is
//! unlocked only once the match is `completed`.
//!
//! ```text
//! upcoming ──► live ──► completed
//!    │  ▲       │ ▲ ▲
//!    │  │       ▼ │ │
//!    │  │     paused┘
//!    ▼  │       │
//! postponed     ▼
//!    └──────► cancelled ◄── (upcoming, live, paused, postponed)
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{MatchId, PlayerId, TeamId};
use crate::error::GatewayError;

/// Lifecycle status of a real-world match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Scheduled, rosters still editable.
    Upcoming,
    /// In play; events are scored.
    Live,
    /// Temporarily halted; events may still be corrected.
    Paused,
    /// Rescheduled; returns to `upcoming` or is cancelled.
    Postponed,
    /// Finished. Terminal; unlocks settlement.
    Completed,
    /// Called off. Terminal.
    Cancelled,
}

impl MatchStatus {
    /// Returns the statuses reachable from `self` in one step.
    #[must_use]
    pub const fn allowed_transitions(self) -> &'static [MatchStatus] {
        match self {
            Self::Upcoming => &[Self::Live, Self::Cancelled, Self::Postponed],
            Self::Live => &[Self::Completed, Self::Cancelled, Self::Paused],
            Self::Paused => &[Self::Live, Self::Cancelled, Self::Completed],
            Self::Postponed => &[Self::Upcoming, Self::Cancelled],
            Self::Completed | Self::Cancelled => &[],
        }
    }

    /// Returns `true` if `to` is reachable from `self` in one step.
    #[must_use]
    pub fn can_transition_to(self, to: MatchStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// Returns `true` for `completed` and `cancelled`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns `true` if match events may be recorded, edited or deleted.
    #[must_use]
    pub const fn accepts_events(self) -> bool {
        matches!(self, Self::Live | Self::Paused)
    }

    /// Returns `true` if a manual full recompute may run.
    #[must_use]
    pub const fn accepts_recalculation(self) -> bool {
        matches!(self, Self::Live | Self::Paused | Self::Completed)
    }

    /// Returns the status as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Live => "live",
            Self::Paused => "paused",
            Self::Postponed => "postponed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(Self::Upcoming),
            "live" => Ok(Self::Live),
            "paused" => Ok(Self::Paused),
            "postponed" => Ok(Self::Postponed),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(GatewayError::InvalidRequest(format!(
                "unknown match status: {other}"
            ))),
        }
    }
}

/// A real-world match that rosters and contests are built on.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Match {
    /// Match identifier.
    pub id: MatchId,
    /// Current lifecycle status.
    pub status: MatchStatus,
    /// Series length (best-of-N).
    pub best_of: u32,
    /// Scheduled roster lock time.
    pub lock_time: Option<DateTime<Utc>>,
    /// Winning team, recorded on completion.
    pub winner_team_id: Option<TeamId>,
    /// Most valuable player, recorded on completion.
    pub mvp_player_id: Option<PlayerId>,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last status change.
    pub updated_at: DateTime<Utc>,
}

impl Match {
    /// Creates a new match in the `upcoming` status.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if `best_of` is zero.
    pub fn new(best_of: u32, lock_time: Option<DateTime<Utc>>) -> Result<Self, GatewayError> {
        if best_of == 0 {
            return Err(GatewayError::InvalidRequest(
                "best_of must be at least 1".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: MatchId::new(),
            status: MatchStatus::Upcoming,
            best_of,
            lock_time,
            winner_team_id: None,
            mvp_player_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Moves the match to `to`, returning the previous status.
    ///
    /// The match is left unchanged when the transition is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidTransition`] naming both states if
    /// `to` is not reachable from the current status.
    pub fn transition(&mut self, to: MatchStatus) -> Result<MatchStatus, GatewayError> {
        let from = self.status;
        if !from.can_transition_to(to) {
            return Err(GatewayError::InvalidTransition { from, to });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(from)
    }

    /// Returns `true` once the scheduled lock time has been reached.
    #[must_use]
    pub fn lock_time_passed(&self, now: DateTime<Utc>) -> bool {
        self.lock_time.is_some_and(|at| at <= now)
    }

    /// Fails unless rosters, contests and entries may still be added.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the match has left
    /// `upcoming` or its lock time has passed.
    pub fn ensure_open_for_registration(
        &self,
        what: &str,
        now: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        if self.status != MatchStatus::Upcoming {
            return Err(GatewayError::InvalidRequest(format!(
                "match {} is {}; {what} can only be registered while it is upcoming",
                self.id, self.status
            )));
        }
        if let Some(lock_time) = self.lock_time
            && lock_time <= now
        {
            return Err(GatewayError::InvalidRequest(format!(
                "match {} locked at {lock_time}; {what} can no longer be registered",
                self.id
            )));
        }
        Ok(())
    }

    /// Fails with [`GatewayError::ScoringClosed`] unless events are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ScoringClosed`] outside `live` and `paused`.
    pub fn ensure_accepts_events(&self) -> Result<(), GatewayError> {
        if self.status.accepts_events() {
            Ok(())
        } else {
            Err(GatewayError::ScoringClosed {
                match_id: self.id,
                status: self.status,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const ALL: [MatchStatus; 6] = [
        MatchStatus::Upcoming,
        MatchStatus::Live,
        MatchStatus::Paused,
        MatchStatus::Postponed,
        MatchStatus::Completed,
        MatchStatus::Cancelled,
    ];

    fn live_match() -> Match {
        let Ok(mut m) = Match::new(3, None) else {
            panic!("valid match");
        };
        let Ok(_) = m.transition(MatchStatus::Live) else {
            panic!("upcoming -> live is allowed");
        };
        m
    }

    #[test]
    fn transition_table_matches_lifecycle() {
        use MatchStatus::*;
        let allowed = [
            (Upcoming, Live),
            (Upcoming, Cancelled),
            (Upcoming, Postponed),
            (Live, Completed),
            (Live, Cancelled),
            (Live, Paused),
            (Paused, Live),
            (Paused, Cancelled),
            (Paused, Completed),
            (Postponed, Upcoming),
            (Postponed, Cancelled),
        ];
        for from in ALL {
            for to in ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(from.can_transition_to(to), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn completed_to_live_is_rejected_and_state_kept() {
        let mut m = live_match();
        assert!(m.transition(MatchStatus::Completed).is_ok());

        let result = m.transition(MatchStatus::Live);
        let Err(GatewayError::InvalidTransition { from, to }) = result else {
            panic!("expected invalid transition");
        };
        assert_eq!(from, MatchStatus::Completed);
        assert_eq!(to, MatchStatus::Live);
        assert_eq!(m.status, MatchStatus::Completed);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        assert!(MatchStatus::Completed.is_terminal());
        assert!(MatchStatus::Cancelled.is_terminal());
        assert!(MatchStatus::Completed.allowed_transitions().is_empty());
        assert!(!MatchStatus::Paused.is_terminal());
    }

    #[test]
    fn transition_returns_previous_status() {
        let mut m = live_match();
        let Ok(prev) = m.transition(MatchStatus::Paused) else {
            panic!("live -> paused is allowed");
        };
        assert_eq!(prev, MatchStatus::Live);
    }

    #[test]
    fn scoring_gate_follows_status() {
        let Ok(m) = Match::new(1, None) else {
            panic!("valid match");
        };
        assert!(matches!(
            m.ensure_accepts_events(),
            Err(GatewayError::ScoringClosed { .. })
        ));
        assert!(live_match().ensure_accepts_events().is_ok());
        assert!(MatchStatus::Completed.accepts_recalculation());
        assert!(!MatchStatus::Cancelled.accepts_recalculation());
    }

    #[test]
    fn registration_closes_at_lock_time() {
        let now = Utc::now();
        let Ok(open) = Match::new(1, Some(now + chrono::Duration::minutes(5))) else {
            panic!("valid match");
        };
        assert!(!open.lock_time_passed(now));
        assert!(open.ensure_open_for_registration("rosters", now).is_ok());

        let Ok(locked) = Match::new(1, Some(now - chrono::Duration::hours(2))) else {
            panic!("valid match");
        };
        assert_eq!(locked.status, MatchStatus::Upcoming);
        assert!(locked.lock_time_passed(now));
        assert!(matches!(
            locked.ensure_open_for_registration("rosters", now),
            Err(GatewayError::InvalidRequest(_))
        ));

        let Ok(unscheduled) = Match::new(1, None) else {
            panic!("valid match");
        };
        assert!(!unscheduled.lock_time_passed(now));
        assert!(unscheduled.ensure_open_for_registration("contests", now).is_ok());
        assert!(live_match().ensure_open_for_registration("contests", now).is_err());
    }

    #[test]
    fn zero_best_of_is_rejected() {
        assert!(Match::new(0, None).is_err());
    }

    #[test]
    fn status_string_round_trip() {
        for status in ALL {
            let parsed: Result<MatchStatus, _> = status.as_str().parse();
            assert!(matches!(parsed, Ok(s) if s == status));
        }
        assert!("finished".parse::<MatchStatus>().is_err());
    }
}
