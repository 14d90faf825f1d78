//! Scored in-match actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EventId, MatchId, PlayerId, UserId};
use crate::error::GatewayError;

/// A discrete in-match action with an already-resolved point value.
///
/// Immutable once recorded except for an explicit admin edit or delete.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MatchEvent {
    /// Event identifier.
    pub id: EventId,
    /// Match the action happened in.
    pub match_id: MatchId,
    /// Player credited with the action.
    pub player_id: PlayerId,
    /// Free-form action kind (e.g. `"kill"`, `"goal"`).
    pub event_type: String,
    /// Fantasy points awarded, before captaincy multipliers.
    pub points: f64,
    /// Round / map / period number the action belongs to.
    pub round_number: u32,
    /// User that recorded the action.
    pub recorded_by: UserId,
    /// Recording timestamp; defines audit order.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last admin edit, if any.
    pub edited_at: Option<DateTime<Utc>>,
}

/// Input for recording a new event. Attribution (`recorded_by`) is a
/// required, already-resolved input.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewMatchEvent {
    /// Match the action happened in.
    pub match_id: MatchId,
    /// Player credited with the action.
    pub player_id: PlayerId,
    /// Action kind.
    pub event_type: String,
    /// Fantasy points awarded.
    pub points: f64,
    /// Round number.
    pub round_number: u32,
    /// Recording user.
    pub recorded_by: UserId,
}

/// Admin correction of a recorded event.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EventAmendment {
    /// Replacement action kind.
    #[serde(default)]
    pub event_type: Option<String>,
    /// Replacement point value.
    #[serde(default)]
    pub points: Option<f64>,
    /// Replacement round number.
    #[serde(default)]
    pub round_number: Option<u32>,
}

impl MatchEvent {
    /// Validates `input` and stamps a new event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a blank event type or a
    /// non-finite point value.
    pub fn record(input: NewMatchEvent) -> Result<Self, GatewayError> {
        validate_event_type(&input.event_type)?;
        validate_points(input.points)?;
        Ok(Self {
            id: EventId::new(),
            match_id: input.match_id,
            player_id: input.player_id,
            event_type: input.event_type.trim().to_string(),
            points: input.points,
            round_number: input.round_number,
            recorded_by: input.recorded_by,
            created_at: Utc::now(),
            edited_at: None,
        })
    }

    /// Applies an admin amendment in place.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the amendment is empty or
    /// carries invalid values; the event is left unchanged in that case.
    pub fn amend(&mut self, amendment: &EventAmendment) -> Result<(), GatewayError> {
        if amendment.event_type.is_none()
            && amendment.points.is_none()
            && amendment.round_number.is_none()
        {
            return Err(GatewayError::InvalidRequest(
                "amendment changes nothing".to_string(),
            ));
        }
        if let Some(kind) = &amendment.event_type {
            validate_event_type(kind)?;
        }
        if let Some(points) = amendment.points {
            validate_points(points)?;
        }

        if let Some(kind) = &amendment.event_type {
            self.event_type = kind.trim().to_string();
        }
        if let Some(points) = amendment.points {
            self.points = points;
        }
        if let Some(round) = amendment.round_number {
            self.round_number = round;
        }
        self.edited_at = Some(Utc::now());
        Ok(())
    }
}

fn validate_event_type(kind: &str) -> Result<(), GatewayError> {
    if kind.trim().is_empty() {
        return Err(GatewayError::InvalidRequest(
            "event_type must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_points(points: f64) -> Result<(), GatewayError> {
    if !points.is_finite() {
        return Err(GatewayError::InvalidRequest(format!(
            "points must be finite, got {points}"
        )));
    }
    Ok(())
}
