//! Admin corrections of recorded match events.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::put;
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::domain::{EventAmendment, EventId};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::ScoringOutcome;

/// `PUT /events/{id}` — Edit a match event.
///
/// # Errors
///
/// Returns [`GatewayError::EventNotFound`] for an unknown event or
/// [`GatewayError::ScoringClosed`] once the match is no longer in play.
#[utoipa::path(
    put,
    path = "/api/v1/events/{id}",
    tag = "Scoring",
    summary = "Edit a match event",
    description = "Replaces the given fields of an event and recomputes the affected player.",
    params(("id" = EventId, Path, description = "Event identifier")),
    request_body = EventAmendment,
    responses(
        (status = 200, description = "Event edited", body = ScoringOutcome),
        (status = 400, description = "Invalid edit", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Scoring closed", body = ErrorResponse),
    )
)]
pub async fn amend_event(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
    Json(amendment): Json<EventAmendment>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.service.amend_event(event_id, &amendment).await?))
}

/// `DELETE /events/{id}` — Delete a match event.
///
/// # Errors
///
/// Returns [`GatewayError::EventNotFound`] for an unknown event or
/// [`GatewayError::ScoringClosed`] once the match is no longer in play.
#[utoipa::path(
    delete,
    path = "/api/v1/events/{id}",
    tag = "Scoring",
    summary = "Delete a match event",
    params(("id" = EventId, Path, description = "Event identifier")),
    responses(
        (status = 200, description = "Event deleted", body = ScoringOutcome),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Scoring closed", body = ErrorResponse),
    )
)]
pub async fn delete_event(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.service.delete_event(event_id).await?))
}

/// Event correction routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events/{id}", put(amend_event).delete(delete_event))
}
