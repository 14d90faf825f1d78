//! Append-mostly store of match events.
//!
//! Each match's log sits behind its own lock, so scoring one match never
//! waits on writes to another. A small index maps event IDs to their match;
//! it is taken before a match log whenever both are needed. Each match must
//! be opened before events can be appended, so reading an unknown match is
//! reported as a data error rather than silently yielding zero points.

use std::collections::{BTreeSet, HashMap};

use tokio::sync::RwLock;

use super::match_event::MatchEvent;
use super::registry::Registry;
use super::{EventId, MatchId, PlayerId};
use crate::error::GatewayError;

/// Durable-in-process record of every match event, sharded by match.
#[derive(Debug)]
pub struct EventStore {
    logs: Registry<MatchId, Vec<MatchEvent>>,
    locations: RwLock<HashMap<EventId, MatchId>>,
}

impl EventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            logs: Registry::new(GatewayError::MatchNotFound),
            locations: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a match so events can be appended to it. Idempotent.
    pub async fn open_match(&self, match_id: MatchId) {
        // An already-open match keeps its log.
        let _ = self.logs.insert(match_id, Vec::new()).await;
    }

    /// Appends a recorded event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MatchNotFound`] if the match was never opened
    /// and [`GatewayError::AlreadyExists`] on a duplicate event ID.
    pub async fn append(&self, event: MatchEvent) -> Result<(), GatewayError> {
        let mut locations = self.locations.write().await;
        if locations.contains_key(&event.id) {
            return Err(GatewayError::AlreadyExists(event.id.to_string()));
        }
        let match_id = event.match_id;
        let event_id = event.id;
        self.logs.get(match_id).await?.write().await.push(event);
        locations.insert(event_id, match_id);
        Ok(())
    }

    async fn locate(&self, event_id: EventId) -> Result<MatchId, GatewayError> {
        self.locations
            .read()
            .await
            .get(&event_id)
            .copied()
            .ok_or(GatewayError::EventNotFound(event_id))
    }

    /// Returns a copy of one event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] for an unknown ID.
    pub async fn get(&self, event_id: EventId) -> Result<MatchEvent, GatewayError> {
        let match_id = self.locate(event_id).await?;
        self.logs
            .get(match_id)
            .await?
            .read()
            .await
            .iter()
            .find(|e| e.id == event_id)
            .cloned()
            .ok_or(GatewayError::EventNotFound(event_id))
    }

    /// Swaps in an amended copy of a stored event. The copy must keep the
    /// stored event's match and player.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] for an unknown ID or
    /// [`GatewayError::InvalidRequest`] if the copy moved to another match
    /// or player.
    pub async fn replace(&self, event: MatchEvent) -> Result<(), GatewayError> {
        let match_id = self.locate(event.id).await?;
        let handle = self.logs.get(match_id).await?;
        let mut events = handle.write().await;
        let slot = events
            .iter_mut()
            .find(|e| e.id == event.id)
            .ok_or(GatewayError::EventNotFound(event.id))?;
        if slot.match_id != event.match_id || slot.player_id != event.player_id {
            return Err(GatewayError::InvalidRequest(format!(
                "event {} cannot change match or player",
                event.id
            )));
        }
        *slot = event;
        Ok(())
    }

    /// Deletes an event and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] for an unknown ID.
    pub async fn remove(&self, event_id: EventId) -> Result<MatchEvent, GatewayError> {
        let mut locations = self.locations.write().await;
        let match_id = *locations
            .get(&event_id)
            .ok_or(GatewayError::EventNotFound(event_id))?;
        let handle = self.logs.get(match_id).await?;
        let mut events = handle.write().await;
        let position = events
            .iter()
            .position(|e| e.id == event_id)
            .ok_or(GatewayError::EventNotFound(event_id))?;
        locations.remove(&event_id);
        Ok(events.remove(position))
    }

    /// Returns one player's events for a match in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MatchNotFound`] if the match's event set does
    /// not exist. A match with no events for the player yields an empty list.
    pub async fn events_for_player(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
    ) -> Result<Vec<MatchEvent>, GatewayError> {
        let handle = self.logs.get(match_id).await?;
        let mut selected: Vec<MatchEvent> = handle
            .read()
            .await
            .iter()
            .filter(|e| e.player_id == player_id)
            .cloned()
            .collect();
        selected.sort_by_key(|e| e.created_at);
        Ok(selected)
    }

    /// Returns every event of a match in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MatchNotFound`] if the match was never opened.
    pub async fn events_for_match(&self, match_id: MatchId) -> Result<Vec<MatchEvent>, GatewayError> {
        let mut events = self.logs.get(match_id).await?.read().await.clone();
        events.sort_by_key(|e| e.created_at);
        Ok(events)
    }

    /// Returns the set of players with at least one event in the match.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MatchNotFound`] if the match was never opened.
    pub async fn players_with_events(
        &self,
        match_id: MatchId,
    ) -> Result<BTreeSet<PlayerId>, GatewayError> {
        let handle = self.logs.get(match_id).await?;
        let players = handle.read().await.iter().map(|e| e.player_id).collect();
        Ok(players)
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}
