//! Contest DTOs: entries and leaderboard queries.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::domain::{RosterId, UserId};

/// Request body for `POST /contests/{id}/entries`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EnterContestRequest {
    /// Roster to enter.
    pub roster_id: RosterId,
}

/// Query parameters for `GET /contests/{id}/leaderboard`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// Number of top rows to return (server default when absent).
    pub top: Option<usize>,
    /// User whose own standing should be included.
    pub viewer: Option<UserId>,
}
