//! contest-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use contest_gateway::api;
use contest_gateway::app_state::AppState;
use contest_gateway::config::{GatewayConfig, LogFormat};
use contest_gateway::domain::{DomainEvent, EventBus};
use contest_gateway::persistence::PostgresPersistence;
use contest_gateway::service::{ContestService, InMemoryWallet};
use contest_gateway::ws::ConnectionManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting contest-gateway");

    // Build domain and connection layers
    let event_bus = EventBus::new(config.event_bus_capacity);
    let connections = ConnectionManager::new(config.connection_settings());
    connections.start();

    // Build service layer
    let wallet = Arc::new(InMemoryWallet::new());
    let mut service = ContestService::new(event_bus.clone(), connections.clone(), wallet);
    let mut restored = None;
    if config.persistence_enabled {
        let persistence = PostgresPersistence::connect(&config)
            .await
            .context("connecting to PostgreSQL")?;
        restored = Some(
            persistence
                .load_state()
                .await
                .context("loading persisted state")?,
        );
        service = service.with_persistence(Arc::new(persistence));
    }
    let service = Arc::new(service);
    if let Some(state) = restored {
        service.hydrate(state).await;
    }

    spawn_notification_relay(&event_bus);
    spawn_roster_lock_sweep(
        Arc::clone(&service),
        Duration::from_secs(config.roster_lock_sweep_secs.max(1)),
    );

    // Build application
    let app = api::build_app(AppState::new(service));

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    connections.stop().await;
    tracing::info!("contest-gateway stopped");
    Ok(())
}

/// Hands `contest_outcome_changed` facts to the notification channel.
///
/// Delivery is out of process; the relay logs each fact it forwards.
fn spawn_notification_relay(event_bus: &EventBus) {
    let mut outcomes =
        event_bus.subscribe_filtered(|e| matches!(e, DomainEvent::ContestOutcomeChanged { .. }));
    tokio::spawn(async move {
        while let Some(event) = outcomes.recv().await {
            if let DomainEvent::ContestOutcomeChanged {
                contest_id,
                affected_user_ids,
                reason,
                ..
            } = event
            {
                tracing::info!(
                    %contest_id,
                    ?reason,
                    users = affected_user_ids.len(),
                    "contest outcome notification queued"
                );
            }
        }
        tracing::debug!(missed = outcomes.missed(), "notification relay stopped");
    });
}

/// Locks rosters of upcoming matches once their lock time passes.
fn spawn_roster_lock_sweep(service: Arc<ContestService>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            service.lock_due_rosters(chrono::Utc::now()).await;
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
