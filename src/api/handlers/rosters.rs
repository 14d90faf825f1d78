//! Roster handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::RegisterRosterRequest;
use crate::app_state::AppState;
use crate::domain::{Roster, RosterId};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /rosters` — Register a roster.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for an invalid roster or a
/// match that has already started.
#[utoipa::path(
    post,
    path = "/api/v1/rosters",
    tag = "Rosters",
    summary = "Register a roster",
    description = "Registers a roster for an upcoming match. The captain and vice-captain must be distinct members.",
    request_body = RegisterRosterRequest,
    responses(
        (status = 201, description = "Roster registered", body = Roster),
        (status = 400, description = "Invalid roster", body = ErrorResponse),
        (status = 404, description = "Match not found", body = ErrorResponse),
    )
)]
pub async fn register_roster(
    State(state): State<AppState>,
    Json(req): Json<RegisterRosterRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let roster = state.service.register_roster(req.into()).await?;
    Ok((StatusCode::CREATED, Json(roster)))
}

/// `GET /rosters/{id}` — Roster with per-player point entries.
///
/// # Errors
///
/// Returns [`GatewayError::RosterNotFound`] for an unknown roster.
#[utoipa::path(
    get,
    path = "/api/v1/rosters/{id}",
    tag = "Rosters",
    summary = "Get a roster",
    params(("id" = RosterId, Path, description = "Roster identifier")),
    responses(
        (status = 200, description = "Roster", body = Roster),
        (status = 404, description = "Roster not found", body = ErrorResponse),
    )
)]
pub async fn get_roster(
    State(state): State<AppState>,
    Path(roster_id): Path<RosterId>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.service.get_roster(roster_id).await?))
}

/// Roster routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rosters", post(register_roster))
        .route("/rosters/{id}", get(get_roster))
}
