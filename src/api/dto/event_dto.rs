//! Match event DTOs.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{MatchId, NewMatchEvent, PlayerId, UserId};

/// Request body for `POST /matches/{id}/events`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordEventRequest {
    /// Credited player.
    pub player_id: PlayerId,
    /// Action kind (e.g. `kill`).
    pub event_type: String,
    /// Points awarded; may be negative.
    pub points: f64,
    /// Round the action happened in. Defaults to 1.
    #[serde(default = "default_round")]
    pub round_number: u32,
    /// User recording the event.
    pub recorded_by: UserId,
}

fn default_round() -> u32 {
    1
}

impl RecordEventRequest {
    /// Attaches the match taken from the path.
    #[must_use]
    pub fn into_new_event(self, match_id: MatchId) -> NewMatchEvent {
        NewMatchEvent {
            match_id,
            player_id: self.player_id,
            event_type: self.event_type,
            points: self.points,
            round_number: self.round_number,
            recorded_by: self.recorded_by,
        }
    }
}
