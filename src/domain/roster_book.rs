//! Roster storage with a player index.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::registry::Registry;
use super::roster::Roster;
use super::{MatchId, PlayerId, RosterId};
use crate::error::GatewayError;

/// Rosters keyed by ID, each behind its own lock, plus an index from
/// `(match, player)` to the rosters containing that player.
#[derive(Debug)]
pub struct RosterBook {
    rosters: Registry<RosterId, Roster>,
    by_player: RwLock<HashMap<(MatchId, PlayerId), BTreeSet<RosterId>>>,
    by_match: RwLock<HashMap<MatchId, BTreeSet<RosterId>>>,
}

impl RosterBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rosters: Registry::new(GatewayError::RosterNotFound),
            by_player: RwLock::new(HashMap::new()),
            by_match: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a roster and indexes its members.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AlreadyExists`] on a duplicate roster ID.
    pub async fn insert(&self, roster: Roster) -> Result<Arc<RwLock<Roster>>, GatewayError> {
        let roster_id = roster.id;
        let match_id = roster.match_id;
        let members: Vec<PlayerId> = roster.members().collect();
        let handle = self.rosters.insert(roster_id, roster).await?;
        self.index(roster_id, match_id, &members).await;
        Ok(handle)
    }

    /// Inserts or replaces a roster loaded from storage.
    pub async fn upsert(&self, roster: Roster) {
        let roster_id = roster.id;
        let match_id = roster.match_id;
        let members: Vec<PlayerId> = roster.members().collect();
        self.rosters.upsert(roster_id, roster).await;
        self.index(roster_id, match_id, &members).await;
    }

    async fn index(&self, roster_id: RosterId, match_id: MatchId, members: &[PlayerId]) {
        let mut by_player = self.by_player.write().await;
        for &player_id in members {
            by_player
                .entry((match_id, player_id))
                .or_default()
                .insert(roster_id);
        }
        drop(by_player);
        self.by_match
            .write()
            .await
            .entry(match_id)
            .or_default()
            .insert(roster_id);
    }

    /// Returns the roster handle behind its per-roster lock.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RosterNotFound`] for an unknown ID.
    pub async fn get(&self, roster_id: RosterId) -> Result<Arc<RwLock<Roster>>, GatewayError> {
        self.rosters.get(roster_id).await
    }

    /// Returns a copy of the roster's current state.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RosterNotFound`] for an unknown ID.
    pub async fn snapshot(&self, roster_id: RosterId) -> Result<Roster, GatewayError> {
        let handle = self.rosters.get(roster_id).await?;
        let roster = handle.read().await.clone();
        Ok(roster)
    }

    /// Returns the IDs of rosters for `match_id` that contain `player_id`.
    pub async fn rosters_with_player(&self, match_id: MatchId, player_id: PlayerId) -> Vec<RosterId> {
        self.by_player
            .read()
            .await
            .get(&(match_id, player_id))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the IDs of every roster built for `match_id`.
    pub async fn rosters_for_match(&self, match_id: MatchId) -> Vec<RosterId> {
        self.by_match
            .read()
            .await
            .get(&match_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for RosterBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::domain::roster::NewRoster;

    fn roster(match_id: MatchId, members: &[PlayerId]) -> Roster {
        let (Some(&captain), Some(&vice)) = (members.first(), members.get(1)) else {
            panic!("need two members");
        };
        let Ok(roster) = Roster::new(NewRoster {
            owner_id: UserId::new(),
            match_id,
            captain_player_id: captain,
            vice_captain_player_id: vice,
            members: members.to_vec(),
        }) else {
            panic!("valid roster");
        };
        roster
    }

    #[tokio::test]
    async fn indexes_rosters_by_player() {
        let book = RosterBook::new();
        let m = MatchId::new();
        let a = PlayerId::new();
        let b = PlayerId::new();
        let c = PlayerId::new();

        let r1 = roster(m, &[a, b]);
        let r2 = roster(m, &[b, c]);
        let (id1, id2) = (r1.id, r2.id);
        let _ = book.insert(r1).await;
        let _ = book.insert(r2).await;

        assert_eq!(book.rosters_with_player(m, a).await, vec![id1]);
        let mut with_b = book.rosters_with_player(m, b).await;
        with_b.sort();
        let mut expected = vec![id1, id2];
        expected.sort();
        assert_eq!(with_b, expected);
        assert_eq!(book.rosters_for_match(m).await.len(), 2);
        assert!(book.rosters_with_player(MatchId::new(), a).await.is_empty());
    }

    #[tokio::test]
    async fn unknown_roster_is_not_found() {
        let book = RosterBook::new();
        let r = roster(MatchId::new(), &[PlayerId::new(), PlayerId::new()]);
        let _ = book.insert(r).await;
        assert!(matches!(
            book.snapshot(RosterId::new()).await,
            Err(GatewayError::RosterNotFound(_))
        ));
    }
}
