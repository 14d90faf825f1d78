//! Match handlers: registration, lifecycle, scoring ingest and completion.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CompleteMatchRequest, RecalculateRequest, RecordEventRequest, RegisterMatchRequest,
    StatusChangeRequest,
};
use crate::app_state::AppState;
use crate::domain::{Match, MatchId};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::{CompletionSummary, RecalculationSummary, ScoringOutcome, TransitionOutcome};

/// `POST /matches` — Register a match.
///
/// # Errors
///
/// Returns [`GatewayError`] on invalid input or persistence failure.
#[utoipa::path(
    post,
    path = "/api/v1/matches",
    tag = "Matches",
    summary = "Register a match",
    description = "Registers a match in the `upcoming` status.",
    request_body = RegisterMatchRequest,
    responses(
        (status = 201, description = "Match registered", body = Match),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    )
)]
pub async fn register_match(
    State(state): State<AppState>,
    Json(req): Json<RegisterMatchRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let m = state.service.register_match(req.best_of, req.lock_time).await?;
    Ok((StatusCode::CREATED, Json(m)))
}

/// `GET /matches/{id}` — Read a match.
///
/// # Errors
///
/// Returns [`GatewayError::MatchNotFound`] for an unknown match.
#[utoipa::path(
    get,
    path = "/api/v1/matches/{id}",
    tag = "Matches",
    summary = "Get a match",
    params(("id" = MatchId, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Match", body = Match),
        (status = 404, description = "Match not found", body = ErrorResponse),
    )
)]
pub async fn get_match(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.service.get_match(match_id).await?))
}

/// `POST /matches/{id}/status` — Request a lifecycle transition.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidTransition`] if the status cannot be
/// reached from the current one.
#[utoipa::path(
    post,
    path = "/api/v1/matches/{id}/status",
    tag = "Matches",
    summary = "Change match status",
    description = "Applies one transition of the match lifecycle. Entering `completed` here runs the final recompute but does not settle.",
    params(("id" = MatchId, Path, description = "Match identifier")),
    request_body = StatusChangeRequest,
    responses(
        (status = 200, description = "Transition applied", body = TransitionOutcome),
        (status = 404, description = "Match not found", body = ErrorResponse),
        (status = 409, description = "Invalid transition", body = ErrorResponse),
    )
)]
pub async fn change_status(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(
        state.service.transition_match(match_id, req.status).await?,
    ))
}

/// `POST /matches/{id}/events` — Record a match event.
///
/// # Errors
///
/// Returns [`GatewayError::ScoringClosed`] unless the match is live or
/// paused, or a validation error for a malformed event.
#[utoipa::path(
    post,
    path = "/api/v1/matches/{id}/events",
    tag = "Scoring",
    summary = "Record a match event",
    description = "Stores the event, recomputes every roster holding the player and re-ranks the match's contests.",
    params(("id" = MatchId, Path, description = "Match identifier")),
    request_body = RecordEventRequest,
    responses(
        (status = 201, description = "Event recorded", body = ScoringOutcome),
        (status = 400, description = "Invalid event", body = ErrorResponse),
        (status = 404, description = "Match not found", body = ErrorResponse),
        (status = 409, description = "Scoring closed", body = ErrorResponse),
    )
)]
pub async fn record_event(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    Json(req): Json<RecordEventRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let outcome = state
        .service
        .record_event(req.into_new_event(match_id))
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `POST /matches/{id}/recalculate` — Full recompute of a match.
///
/// # Errors
///
/// Returns [`GatewayError::ScoringClosed`] before the match has started.
#[utoipa::path(
    post,
    path = "/api/v1/matches/{id}/recalculate",
    tag = "Scoring",
    summary = "Recalculate a match",
    description = "Recomputes every roster of the match and re-ranks its contests. `force_recalculate` also re-ranks finalized contests; prizes are never paid twice.",
    params(("id" = MatchId, Path, description = "Match identifier")),
    request_body = RecalculateRequest,
    responses(
        (status = 200, description = "Recalculation summary", body = RecalculationSummary),
        (status = 404, description = "Match not found", body = ErrorResponse),
        (status = 409, description = "Match not in play", body = ErrorResponse),
    )
)]
pub async fn recalculate(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    body: Option<Json<RecalculateRequest>>,
) -> Result<impl IntoResponse, GatewayError> {
    let force = body.is_some_and(|Json(req)| req.force_recalculate);
    Ok(Json(
        state.service.recalculate_match(match_id, force).await?,
    ))
}

/// `POST /matches/{id}/complete` — Complete a match and settle its contests.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidTransition`] if the match cannot
/// complete, or [`GatewayError::SettlementAborted`] on a conflicting state.
#[utoipa::path(
    post,
    path = "/api/v1/matches/{id}/complete",
    tag = "Matches",
    summary = "Complete a match",
    description = "Moves the match to `completed`, records the winner and MVP, and settles prize pools when requested. Safe to retry.",
    params(("id" = MatchId, Path, description = "Match identifier")),
    request_body = CompleteMatchRequest,
    responses(
        (status = 200, description = "Completion summary", body = CompletionSummary),
        (status = 404, description = "Match not found", body = ErrorResponse),
        (status = 409, description = "Invalid transition or settlement aborted", body = ErrorResponse),
    )
)]
pub async fn complete_match(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    Json(req): Json<CompleteMatchRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(
        state.service.complete_match(match_id, req.into()).await?,
    ))
}

/// Match routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/matches", post(register_match))
        .route("/matches/{id}", get(get_match))
        .route("/matches/{id}/status", post(change_status))
        .route("/matches/{id}/events", post(record_event))
        .route("/matches/{id}/recalculate", post(recalculate))
        .route("/matches/{id}/complete", post(complete_match))
}
