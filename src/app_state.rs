//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::ContestService;
use crate::ws::ConnectionManager;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Contest service for all business logic.
    pub service: Arc<ContestService>,
    /// Live leaderboard connections.
    pub connections: ConnectionManager,
    /// Domain event bus.
    pub event_bus: EventBus,
}

impl AppState {
    /// Builds the state around `service`, sharing its connection manager
    /// and event bus.
    #[must_use]
    pub fn new(service: Arc<ContestService>) -> Self {
        let connections = service.connections().clone();
        let event_bus = service.event_bus().clone();
        Self {
            service,
            connections,
            event_bus,
        }
    }
}
