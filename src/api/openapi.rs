//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{
    CompleteMatchRequest, EnterContestRequest, RecalculateRequest, RecordEventRequest,
    RegisterMatchRequest, RegisterRosterRequest, StatusChangeRequest,
};
use super::handlers::{contests, events, matches, rosters, system};
use crate::domain::{
    Contest, ContestEntry, ContestStatus, EventAmendment, LeaderboardRow, LeaderboardView, Match,
    MatchStatus, NewContest, Payout, PayoutStatus, PlayerPointEntry, PrizeTier, Roster,
    RosterRole, SettlementRecord, ViewerStanding,
};
use crate::error::{ErrorBody, ErrorResponse};
use crate::service::{
    CompletionSummary, LifecycleEffects, RecalculationSummary, ScoringOutcome, SettlementStatus,
    SettlementSummary, TransitionOutcome,
};

/// Generated API description served at `/api-docs/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "contest-gateway",
        description = "Live fantasy contest scoring, leaderboards and prize settlement."
    ),
    paths(
        matches::register_match,
        matches::get_match,
        matches::change_status,
        matches::record_event,
        matches::recalculate,
        matches::complete_match,
        events::amend_event,
        events::delete_event,
        rosters::register_roster,
        rosters::get_roster,
        contests::register_contest,
        contests::get_contest,
        contests::enter_contest,
        contests::get_leaderboard,
        contests::get_settlement,
        system::health_handler,
        system::scoring_policy_handler,
    ),
    components(schemas(
        RegisterMatchRequest,
        StatusChangeRequest,
        RecalculateRequest,
        CompleteMatchRequest,
        RecordEventRequest,
        EventAmendment,
        RegisterRosterRequest,
        NewContest,
        EnterContestRequest,
        Match,
        MatchStatus,
        Roster,
        RosterRole,
        PlayerPointEntry,
        Contest,
        ContestStatus,
        ContestEntry,
        PrizeTier,
        Payout,
        PayoutStatus,
        SettlementRecord,
        LeaderboardView,
        LeaderboardRow,
        ViewerStanding,
        ScoringOutcome,
        RecalculationSummary,
        TransitionOutcome,
        LifecycleEffects,
        CompletionSummary,
        SettlementSummary,
        SettlementStatus,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "Matches", description = "Match registration and lifecycle"),
        (name = "Scoring", description = "Event ingest, corrections and recomputation"),
        (name = "Rosters", description = "Fantasy rosters"),
        (name = "Contests", description = "Contests, leaderboards and settlement"),
        (name = "System", description = "Health and policy"),
    )
)]
pub struct ApiDoc;
