//! System endpoints: health check and scoring policy.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::contest::DEFAULT_PRIZE_DISTRIBUTION;
use crate::domain::roster::{CAPTAIN_MULTIPLIER, VICE_CAPTAIN_MULTIPLIER};
use crate::domain::PrizeTier;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    live_connections: usize,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, current timestamp and the number of live leaderboard connections.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            live_connections: state.connections.connection_count().await,
        }),
    )
}

/// Fixed scoring and payout policy.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoringPolicy {
    captain_multiplier: f64,
    vice_captain_multiplier: f64,
    default_prize_distribution: Vec<PrizeTier>,
    leaderboard_top_n: usize,
}

/// `GET /config/scoring-policy` — Multipliers and default prize split.
#[utoipa::path(
    get,
    path = "/config/scoring-policy",
    tag = "System",
    summary = "Scoring policy",
    description = "Returns the captaincy multipliers, the prize split used when a contest has no table of its own, and the default leaderboard size.",
    responses(
        (status = 200, description = "Scoring policy", body = ScoringPolicy),
    )
)]
pub async fn scoring_policy_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ScoringPolicy {
            captain_multiplier: CAPTAIN_MULTIPLIER,
            vice_captain_multiplier: VICE_CAPTAIN_MULTIPLIER,
            default_prize_distribution: DEFAULT_PRIZE_DISTRIBUTION.to_vec(),
            leaderboard_top_n: state.connections.settings().top_n,
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/scoring-policy", get(scoring_policy_handler))
}
