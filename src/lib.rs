//! # contest-gateway
//!
//! Live fantasy contest scoring, leaderboard ranking, prize settlement and
//! WebSocket leaderboard push.
//!
//! Admins record scoring events while a match is live. Every event is
//! turned into roster points (with captain and vice-captain multipliers),
//! every contest on the match is re-ranked, and connected clients receive
//! the new leaderboard. When the match completes, the winning entries of
//! each contest are paid exactly once through the wallet ledger.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler + ConnectionManager (ws/)
//!     │
//!     ├── ContestService (service/)
//!     │     ├── PointCalculator / RosterAggregator
//!     │     ├── LeaderboardRanker
//!     │     └── SettlementEngine ── WalletLedger
//!     ├── EventBus (domain/)
//!     │
//!     ├── Registry / EventStore / RosterBook / ContestBoard (domain/)
//!     │
//!     └── PostgreSQL Persistence
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
