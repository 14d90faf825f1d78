//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! Batch operations (recomputation, ranking, settlement) do not surface
//! per-element failures through this type; they count them in their
//! summaries instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ContestId, EntryId, EventId, MatchId, MatchStatus, RosterId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1002,
///     "message": "invalid transition: completed -> live",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Failure reported by the external wallet collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WalletError {
    /// The wallet refused the credit (e.g. frozen or unknown account).
    #[error("credit rejected: {0}")]
    Rejected(String),

    /// The wallet could not be reached.
    #[error("wallet unavailable: {0}")]
    Unavailable(String),
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category                 | HTTP Status                  |
/// |-----------|--------------------------|------------------------------|
/// | 1000–1999 | Validation               | 400 Bad Request / 409        |
/// | 2000–2999 | Not Found                | 404 Not Found                |
/// | 3000–3999 | Server / Data            | 500 / 502                    |
/// | 4000–4999 | Consistency / Settlement | 409 Conflict                 |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Requested match status change is not in the transition table.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status of the match.
        from: MatchStatus,
        /// Requested target status.
        to: MatchStatus,
    },

    /// Scoring operation attempted while the match does not accept it.
    #[error("scoring closed for match {match_id} in status {status}")]
    ScoringClosed {
        /// Match identifier.
        match_id: MatchId,
        /// Status that rejected the operation.
        status: MatchStatus,
    },

    /// Match with the given ID was not found.
    #[error("match not found: {0}")]
    MatchNotFound(MatchId),

    /// Contest with the given ID was not found.
    #[error("contest not found: {0}")]
    ContestNotFound(ContestId),

    /// Roster with the given ID was not found.
    #[error("roster not found: {0}")]
    RosterNotFound(RosterId),

    /// Match event with the given ID was not found.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// Contest entry with the given ID was not found.
    #[error("contest entry not found: {0}")]
    EntryNotFound(EntryId),

    /// An entity with the same identity already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Settlement detected a conflicting match state and paid nothing.
    #[error("settlement aborted for match {match_id}: match is {status}")]
    SettlementAborted {
        /// Match identifier.
        match_id: MatchId,
        /// Status observed at settlement time.
        status: MatchStatus,
    },

    /// The wallet collaborator failed.
    #[error("wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidTransition { .. } => 1002,
            Self::ScoringClosed { .. } => 1003,
            Self::MatchNotFound(_) => 2001,
            Self::ContestNotFound(_) => 2002,
            Self::RosterNotFound(_) => 2003,
            Self::EventNotFound(_) => 2004,
            Self::EntryNotFound(_) => 2005,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::Wallet(_) => 3002,
            Self::AlreadyExists(_) => 4001,
            Self::SettlementAborted { .. } => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidTransition { .. }
            | Self::ScoringClosed { .. }
            | Self::AlreadyExists(_)
            | Self::SettlementAborted { .. } => StatusCode::CONFLICT,
            Self::MatchNotFound(_)
            | Self::ContestNotFound(_)
            | Self::RosterNotFound(_)
            | Self::EventNotFound(_)
            | Self::EntryNotFound(_) => StatusCode::NOT_FOUND,
            Self::Wallet(_) => StatusCode::BAD_GATEWAY,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
