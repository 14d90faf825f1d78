//! Match DTOs: registration, lifecycle and completion requests.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{MatchStatus, PlayerId, TeamId};
use crate::service::CompleteMatch;

/// Request body for `POST /matches`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterMatchRequest {
    /// Series length (best-of-N). Defaults to 1.
    #[serde(default = "default_best_of")]
    pub best_of: u32,
    /// Scheduled roster lock time.
    #[serde(default)]
    pub lock_time: Option<DateTime<Utc>>,
}

fn default_best_of() -> u32 {
    1
}

/// Request body for `POST /matches/{id}/status`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusChangeRequest {
    /// Requested status.
    pub status: MatchStatus,
}

/// Request body for `POST /matches/{id}/recalculate`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RecalculateRequest {
    /// Re-rank contests that are already finalized.
    #[serde(default)]
    pub force_recalculate: bool,
}

/// Request body for `POST /matches/{id}/complete`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CompleteMatchRequest {
    /// Winning team.
    #[serde(default)]
    pub winner_team_id: Option<TeamId>,
    /// Most valuable player.
    #[serde(default)]
    pub mvp_player_id: Option<PlayerId>,
    /// Settle prize pools. Defaults to `true`.
    #[serde(default = "default_true")]
    pub distribute_prizes: bool,
    /// Emit contest outcome facts. Defaults to `true`.
    #[serde(default = "default_true")]
    pub send_notifications: bool,
}

fn default_true() -> bool {
    true
}

impl From<CompleteMatchRequest> for CompleteMatch {
    fn from(req: CompleteMatchRequest) -> Self {
        Self {
            winner_team_id: req.winner_team_id,
            mvp_player_id: req.mvp_player_id,
            distribute_prizes: req.distribute_prizes,
            send_notifications: req.send_notifications,
        }
    }
}
