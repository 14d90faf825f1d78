//! Contest handlers: registration, entries, leaderboard and settlement.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{EnterContestRequest, LeaderboardQuery};
use crate::app_state::AppState;
use crate::domain::{Contest, ContestEntry, ContestId, LeaderboardView, NewContest};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::SettlementStatus;

/// `POST /contests` — Register a contest.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for an invalid prize table or
/// a match that has already started.
#[utoipa::path(
    post,
    path = "/api/v1/contests",
    tag = "Contests",
    summary = "Register a contest",
    description = "Registers a contest on an upcoming match. Without a prize table, ranks 1 and 2 receive 50% and 30% of the pool.",
    request_body = NewContest,
    responses(
        (status = 201, description = "Contest registered", body = Contest),
        (status = 400, description = "Invalid contest", body = ErrorResponse),
        (status = 404, description = "Match not found", body = ErrorResponse),
    )
)]
pub async fn register_contest(
    State(state): State<AppState>,
    Json(req): Json<NewContest>,
) -> Result<impl IntoResponse, GatewayError> {
    let contest = state.service.register_contest(req).await?;
    Ok((StatusCode::CREATED, Json(contest)))
}

/// `GET /contests/{id}` — Read a contest.
///
/// # Errors
///
/// Returns [`GatewayError::ContestNotFound`] for an unknown contest.
#[utoipa::path(
    get,
    path = "/api/v1/contests/{id}",
    tag = "Contests",
    summary = "Get a contest",
    params(("id" = ContestId, Path, description = "Contest identifier")),
    responses(
        (status = 200, description = "Contest", body = Contest),
        (status = 404, description = "Contest not found", body = ErrorResponse),
    )
)]
pub async fn get_contest(
    State(state): State<AppState>,
    Path(contest_id): Path<ContestId>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.service.get_contest(contest_id).await?))
}

/// `POST /contests/{id}/entries` — Enter a roster.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if the roster is for another
/// match or the contest has started, and [`GatewayError::AlreadyExists`]
/// if the roster is already entered.
#[utoipa::path(
    post,
    path = "/api/v1/contests/{id}/entries",
    tag = "Contests",
    summary = "Enter a roster",
    params(("id" = ContestId, Path, description = "Contest identifier")),
    request_body = EnterContestRequest,
    responses(
        (status = 201, description = "Roster entered", body = ContestEntry),
        (status = 400, description = "Entry refused", body = ErrorResponse),
        (status = 404, description = "Contest or roster not found", body = ErrorResponse),
        (status = 409, description = "Roster already entered", body = ErrorResponse),
    )
)]
pub async fn enter_contest(
    State(state): State<AppState>,
    Path(contest_id): Path<ContestId>,
    Json(req): Json<EnterContestRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let entry = state
        .service
        .enter_contest(contest_id, req.roster_id)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// `GET /contests/{id}/leaderboard` — Current ranking.
///
/// # Errors
///
/// Returns [`GatewayError::ContestNotFound`] for an unknown contest.
#[utoipa::path(
    get,
    path = "/api/v1/contests/{id}/leaderboard",
    tag = "Contests",
    summary = "Get the leaderboard",
    description = "Returns the latest consistent ranking. Never waits for a ranking pass in progress.",
    params(
        ("id" = ContestId, Path, description = "Contest identifier"),
        LeaderboardQuery,
    ),
    responses(
        (status = 200, description = "Leaderboard view", body = LeaderboardView),
        (status = 404, description = "Contest not found", body = ErrorResponse),
    )
)]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(contest_id): Path<ContestId>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(
        state
            .service
            .get_leaderboard(contest_id, query.top, query.viewer)
            .await?,
    ))
}

/// `GET /contests/{id}/settlement` — Prior settlement record.
///
/// # Errors
///
/// Returns [`GatewayError::ContestNotFound`] for an unknown contest.
#[utoipa::path(
    get,
    path = "/api/v1/contests/{id}/settlement",
    tag = "Contests",
    summary = "Get the settlement record",
    params(("id" = ContestId, Path, description = "Contest identifier")),
    responses(
        (status = 200, description = "Settlement state", body = SettlementStatus),
        (status = 404, description = "Contest not found", body = ErrorResponse),
    )
)]
pub async fn get_settlement(
    State(state): State<AppState>,
    Path(contest_id): Path<ContestId>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.service.settlement_status(contest_id).await?))
}

/// Contest routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/contests", post(register_contest))
        .route("/contests/{id}", get(get_contest))
        .route("/contests/{id}/entries", post(enter_contest))
        .route("/contests/{id}/leaderboard", get(get_leaderboard))
        .route("/contests/{id}/settlement", get(get_settlement))
}
