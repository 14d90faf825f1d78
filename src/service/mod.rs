//! Service layer: business logic orchestration.
//!
//! [`ContestService`] coordinates scoring, ranking, lifecycle and
//! settlement, and emits events through the [`super::domain::EventBus`].
//! The components it drives live in their own modules so they can be
//! exercised in isolation.

pub mod contest_service;
pub mod ranking;
pub mod scoring;
pub mod settlement;
pub mod wallet;

pub use contest_service::{
    CompleteMatch, CompletionSummary, ContestService, LifecycleEffects, RecalculationSummary,
    ScoringOutcome, SettlementStatus, TransitionOutcome,
};
pub use ranking::{LeaderboardRanker, RankCandidate, RankOutcome, rank_entries};
pub use scoring::{AggregationSummary, PointCalculator, RosterAggregator};
pub use settlement::{SettlementEngine, SettlementSummary};
pub use wallet::{CreditOutcome, InMemoryWallet, WalletLedger, settlement_reference};
