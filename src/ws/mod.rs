//! WebSocket layer: live leaderboard push.
//!
//! Clients subscribe to one contest at `/ws/contests/{id}`. The
//! [`connection_manager::ConnectionManager`] fans each new ranking out to
//! the per-connection [`outbound_queue::SnapshotQueue`]s, and every
//! connection loop drains its own queue independently.

pub mod connection;
pub mod connection_manager;
pub mod handler;
pub mod messages;
pub mod outbound_queue;

pub use connection_manager::{ConnectionManager, ConnectionSettings, LiveConnection};
