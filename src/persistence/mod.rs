//! Persistence layer for PostgreSQL.
//!
//! The in-memory stores are authoritative while the process runs. When
//! persistence is enabled every committed change is upserted here, and
//! the stores are rebuilt from these tables at startup. Event writes are
//! strict (the caller fails if the row is not stored); roster, contest and
//! match journaling is best-effort and logged on failure.

pub mod models;
pub mod postgres;

pub use models::PersistedState;
pub use postgres::PostgresPersistence;
