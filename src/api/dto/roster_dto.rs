//! Roster DTOs.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{MatchId, NewRoster, PlayerId, UserId};

/// Request body for `POST /rosters`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRosterRequest {
    /// Owning user.
    pub owner_id: UserId,
    /// Match the roster is built for.
    pub match_id: MatchId,
    /// Captain (scores double).
    pub captain: PlayerId,
    /// Vice-captain (scores one and a half).
    pub vice_captain: PlayerId,
    /// Every selected player, captain and vice-captain included.
    pub members: Vec<PlayerId>,
}

impl From<RegisterRosterRequest> for NewRoster {
    fn from(req: RegisterRosterRequest) -> Self {
        Self {
            owner_id: req.owner_id,
            match_id: req.match_id,
            captain_player_id: req.captain,
            vice_captain_player_id: req.vice_captain,
            members: req.members,
        }
    }
}
