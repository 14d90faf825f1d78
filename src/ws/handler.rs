//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::{ContestId, UserId};
use crate::error::GatewayError;

/// Query parameters accepted on the subscribe endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SubscribeParams {
    /// User whose own standing is attached to every pushed snapshot.
    pub viewer: Option<UserId>,
}

/// `GET /ws/contests/{id}` — Upgrade to a live leaderboard subscription.
///
/// Unknown contests are rejected with 404 before the upgrade.
///
/// # Errors
///
/// Returns [`GatewayError::ContestNotFound`] for an unknown contest.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(contest_id): Path<ContestId>,
    Query(params): Query<SubscribeParams>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    state.service.get_contest(contest_id).await?;

    let manager = state.connections.clone();
    let service = Arc::clone(&state.service);
    Ok(ws.on_upgrade(move |socket| async move {
        let connection = manager.register(contest_id, params.viewer).await;
        run_connection(socket, connection, manager, service).await;
    }))
}
