//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use contest_gateway::app_state::AppState;
use contest_gateway::domain::EventBus;
use contest_gateway::service::{ContestService, InMemoryWallet, WalletLedger};
use contest_gateway::ws::{ConnectionManager, ConnectionSettings};

/// A service wired to an in-memory wallet and isolated connection manager.
pub struct Harness {
    pub service: Arc<ContestService>,
    pub wallet: Arc<InMemoryWallet>,
    pub connections: ConnectionManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(ConnectionSettings::default())
    }

    pub fn with_settings(settings: ConnectionSettings) -> Self {
        let wallet = Arc::new(InMemoryWallet::new());
        let connections = ConnectionManager::new(settings);
        let service = Arc::new(ContestService::new(
            EventBus::new(1024),
            connections.clone(),
            Arc::clone(&wallet) as Arc<dyn WalletLedger>,
        ));
        Self {
            service,
            wallet,
            connections,
        }
    }

    pub fn state(&self) -> AppState {
        AppState::new(Arc::clone(&self.service))
    }
}

