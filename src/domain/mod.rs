//! Domain layer: core types, row-locked stores, and the event system.
//!
//! This module contains the server-side domain model: typed identifiers,
//! match lifecycle and scoring events, rosters, contests and their
//! leaderboards, the per-row [`UnitOfWork`] used for all-or-nothing
//! edits, and the [`EventBus`] for broadcasting committed state changes.

pub mod contest;
pub mod contest_board;
pub mod domain_event;
pub mod event_bus;
pub mod event_store;
pub mod ids;
pub mod leaderboard;
pub mod match_event;
pub mod match_state;
pub mod registry;
pub mod roster;
pub mod roster_book;
pub mod unit_of_work;

pub use contest::{
    Contest, ContestEntry, ContestStatus, NewContest, Payout, PayoutStatus, PrizeTier,
    SettlementRecord,
};
pub use contest_board::ContestBoard;
pub use domain_event::{AmendmentKind, DomainEvent, OutcomeReason};
pub use event_bus::{EventBus, FilteredReceiver};
pub use event_store::EventStore;
pub use ids::{
    ConnectionId, ContestId, EntryId, EventId, MatchId, PlayerId, RosterId, TeamId, UserId,
};
pub use leaderboard::{LeaderboardRow, LeaderboardSnapshot, LeaderboardView, ViewerStanding};
pub use match_event::{EventAmendment, MatchEvent, NewMatchEvent};
pub use match_state::{Match, MatchStatus};
pub use registry::Registry;
pub use roster::{NewRoster, PlayerPointEntry, Roster, RosterRole};
pub use roster_book::RosterBook;
pub use unit_of_work::UnitOfWork;
