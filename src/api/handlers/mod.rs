//! REST endpoint handlers organized by resource.

pub mod contests;
pub mod events;
pub mod matches;
pub mod rosters;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(matches::routes())
        .merge(events::routes())
        .merge(rosters::routes())
        .merge(contests::routes())
}
