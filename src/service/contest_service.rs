//! Contest service: orchestrates scoring, ranking, lifecycle and settlement.
//!
//! Every mutation follows the same shape: validate under the owning row's
//! lock, commit, journal, emit domain events, then fan out to the
//! aggregator, the ranker and the live connections. Fan-out is best-effort
//! and reported as counts; the triggering request itself is strict.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::ranking::{LeaderboardRanker, RankOutcome};
use super::scoring::{AggregationSummary, PointCalculator, RosterAggregator};
use super::settlement::{SettlementEngine, SettlementSummary};
use super::wallet::WalletLedger;
use crate::domain::{
    AmendmentKind, Contest, ContestBoard, ContestEntry, ContestId, ContestStatus, DomainEvent,
    EventAmendment, EventBus, EventId, EventStore, LeaderboardSnapshot, LeaderboardView, Match,
    MatchEvent, MatchId, MatchStatus, NewContest, NewMatchEvent, NewRoster, OutcomeReason,
    PayoutStatus, PlayerId, Registry, Roster, RosterBook, RosterId, SettlementRecord, TeamId,
    UnitOfWork, UserId,
};
use crate::error::GatewayError;
use crate::persistence::{PersistedState, PostgresPersistence};
use crate::ws::ConnectionManager;

/// Result of recording, editing or deleting a match event.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScoringOutcome {
    /// Event that was written.
    pub event_id: EventId,
    /// Rosters whose totals were rewritten.
    pub rosters_updated: usize,
    /// Rosters skipped because of a data error.
    pub rosters_failed: usize,
    /// Contests re-ranked and published.
    pub leaderboards_updated: usize,
}

/// Result of a manual full recompute.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecalculationSummary {
    /// Match recomputed.
    pub match_id: MatchId,
    /// Rosters whose totals were rewritten.
    pub rosters_updated: usize,
    /// Rosters skipped because of a data error.
    pub rosters_failed: usize,
    /// Contests re-ranked and published.
    pub leaderboards_updated: usize,
}

/// Work done on rosters and contests after a status change.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct LifecycleEffects {
    /// Rosters locked or finalized.
    pub rosters_touched: usize,
    /// Contests moved to a new status.
    pub contests_advanced: usize,
    /// Rosters recomputed by the final pass on completion.
    pub rosters_updated: usize,
    /// Contests re-ranked by the final pass on completion.
    pub leaderboards_updated: usize,
}

/// Result of a lifecycle transition.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransitionOutcome {
    /// Status before the transition.
    pub previous_status: MatchStatus,
    /// Match after the transition.
    #[serde(rename = "match")]
    pub current: Match,
    /// Side effects applied.
    pub effects: LifecycleEffects,
}

/// Inputs of [`ContestService::complete_match`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CompleteMatch {
    /// Winning team to record.
    pub winner_team_id: Option<TeamId>,
    /// Most valuable player to record.
    pub mvp_player_id: Option<PlayerId>,
    /// Run settlement after completion.
    pub distribute_prizes: bool,
    /// Emit contest outcome facts for the settled contests.
    pub send_notifications: bool,
}

/// Result of completing a match.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompletionSummary {
    /// Completed match.
    #[serde(rename = "match")]
    pub current: Match,
    /// `true` if the match was already completed before this call.
    pub already_completed: bool,
    /// Side effects of the transition (empty on a retry).
    pub effects: LifecycleEffects,
    /// Settlement counts, when prizes were distributed.
    pub settlement: Option<SettlementSummary>,
}

/// Settlement state of one contest.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettlementStatus {
    /// Contest identifier.
    pub contest_id: ContestId,
    /// Contest status.
    pub status: ContestStatus,
    /// `true` once prizes were paid.
    pub is_finalized: bool,
    /// Prior settlement, if any.
    pub record: Option<SettlementRecord>,
}

/// Orchestration layer for every contest operation.
#[derive(Debug, Clone)]
pub struct ContestService {
    matches: Arc<Registry<MatchId, Match>>,
    events: Arc<EventStore>,
    rosters: Arc<RosterBook>,
    contests: Arc<ContestBoard>,
    aggregator: RosterAggregator,
    ranker: LeaderboardRanker,
    settlement: SettlementEngine,
    connections: ConnectionManager,
    event_bus: EventBus,
    persistence: Option<Arc<PostgresPersistence>>,
}

impl ContestService {
    /// Creates a service with empty stores, paying prizes through `wallet`
    /// and pushing snapshots through `connections`.
    #[must_use]
    pub fn new(
        event_bus: EventBus,
        connections: ConnectionManager,
        wallet: Arc<dyn WalletLedger>,
    ) -> Self {
        let matches = Arc::new(Registry::new(GatewayError::MatchNotFound));
        let events = Arc::new(EventStore::new());
        let rosters = Arc::new(RosterBook::new());
        let contests = Arc::new(ContestBoard::new());
        let aggregator = RosterAggregator::new(
            Arc::clone(&rosters),
            PointCalculator::new(Arc::clone(&events)),
        );
        let ranker = LeaderboardRanker::new(Arc::clone(&contests), Arc::clone(&rosters));
        let settlement = SettlementEngine::new(Arc::clone(&matches), Arc::clone(&contests), wallet);
        Self {
            matches,
            events,
            rosters,
            contests,
            aggregator,
            ranker,
            settlement,
            connections,
            event_bus,
            persistence: None,
        }
    }

    /// Journals every committed change to `persistence`.
    #[must_use]
    pub fn with_persistence(mut self, persistence: Arc<PostgresPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns the live connection manager.
    #[must_use]
    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Registers a match in the `upcoming` status.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a zero `best_of`, or a
    /// persistence error if the match could not be stored.
    pub async fn register_match(
        &self,
        best_of: u32,
        lock_time: Option<DateTime<Utc>>,
    ) -> Result<Match, GatewayError> {
        let m = Match::new(best_of, lock_time)?;
        if let Some(db) = &self.persistence {
            db.save_match(&m).await?;
        }
        self.matches.insert(m.id, m.clone()).await?;
        self.events.open_match(m.id).await;
        tracing::info!(match_id = %m.id, best_of, "match registered");
        Ok(m)
    }

    /// Returns a copy of a match.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MatchNotFound`] for an unknown match.
    pub async fn get_match(&self, match_id: MatchId) -> Result<Match, GatewayError> {
        Ok(self.matches.get(match_id).await?.read().await.clone())
    }

    /// Registers a roster for an `upcoming` match whose lock time has not
    /// passed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MatchNotFound`] for an unknown match,
    /// [`GatewayError::InvalidRequest`] for an invalid roster or a match
    /// that is no longer open for registration, or a persistence error.
    pub async fn register_roster(&self, input: NewRoster) -> Result<Roster, GatewayError> {
        let handle = self.matches.get(input.match_id).await?;
        // Held until the roster is stored so a transition cannot slip in
        // between the check and the insert.
        let m = handle.read().await;
        m.ensure_open_for_registration("rosters", Utc::now())?;
        let roster = Roster::new(input)?;
        if let Some(db) = &self.persistence {
            db.save_roster(&roster).await?;
        }
        self.rosters.insert(roster.clone()).await?;
        drop(m);
        tracing::info!(roster_id = %roster.id, match_id = %roster.match_id, "roster registered");
        Ok(roster)
    }

    /// Returns a copy of a roster with its point entries.
    ///
    /// Rosters of a match whose lock time has passed are locked first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RosterNotFound`] for an unknown roster.
    pub async fn get_roster(&self, roster_id: RosterId) -> Result<Roster, GatewayError> {
        let roster = self.rosters.snapshot(roster_id).await?;
        if roster.is_locked {
            return Ok(roster);
        }
        if self.lock_rosters_if_due(roster.match_id, Utc::now()).await > 0 {
            return self.rosters.snapshot(roster_id).await;
        }
        Ok(roster)
    }

    /// Locks the rosters of every upcoming match whose lock time has
    /// passed; returns how many rosters changed.
    pub async fn lock_due_rosters(&self, now: DateTime<Utc>) -> usize {
        let mut locked = 0;
        for m in self.matches.values().await {
            if m.status == MatchStatus::Upcoming && m.lock_time_passed(now) {
                locked += self.lock_rosters_if_due(m.id, now).await;
            }
        }
        if locked > 0 {
            tracing::info!(rosters = locked, "rosters locked at lock time");
        }
        locked
    }

    /// Registers a contest for an `upcoming` match whose lock time has not
    /// passed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MatchNotFound`] for an unknown match,
    /// [`GatewayError::InvalidRequest`] for an invalid prize table or a
    /// match that is no longer open for registration, or a persistence
    /// error.
    pub async fn register_contest(&self, input: NewContest) -> Result<Contest, GatewayError> {
        let handle = self.matches.get(input.match_id).await?;
        let m = handle.read().await;
        m.ensure_open_for_registration("contests", Utc::now())?;
        let contest = Contest::new(input)?;
        if let Some(db) = &self.persistence {
            db.save_contest(&contest).await?;
        }
        self.contests.insert(contest.clone()).await?;
        drop(m);
        tracing::info!(
            contest_id = %contest.id,
            match_id = %contest.match_id,
            prize_pool = contest.prize_pool,
            "contest registered"
        );
        Ok(contest)
    }

    /// Returns a copy of a contest.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ContestNotFound`] for an unknown contest.
    pub async fn get_contest(&self, contest_id: ContestId) -> Result<Contest, GatewayError> {
        self.contests.snapshot(contest_id).await
    }

    /// Enters a roster into a contest and re-ranks the contest.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for an unknown roster or contest,
    /// [`GatewayError::InvalidRequest`] if the roster belongs to another
    /// match, the contest is not upcoming or the match has locked,
    /// [`GatewayError::AlreadyExists`] if the roster is already entered, or
    /// a persistence error.
    pub async fn enter_contest(
        &self,
        contest_id: ContestId,
        roster_id: RosterId,
    ) -> Result<ContestEntry, GatewayError> {
        let roster = self.rosters.snapshot(roster_id).await?;
        let handle = self.contests.get(contest_id).await?;
        let mut unit = UnitOfWork::begin(handle, "contest_entry").await;
        if unit.match_id != roster.match_id {
            return Err(GatewayError::InvalidRequest(format!(
                "roster {roster_id} is for match {}, contest {contest_id} is for match {}",
                roster.match_id, unit.match_id
            )));
        }
        // Contest before match, the same order settlement takes them in.
        let match_handle = self.matches.get(unit.match_id).await?;
        let m = match_handle.read().await;
        m.ensure_open_for_registration("entries", Utc::now())?;
        let entry = unit.enter(roster.id, roster.owner_id)?;
        if let Some(db) = &self.persistence {
            db.save_contest(&unit).await?;
        }
        unit.commit();
        drop(m);
        tracing::info!(%contest_id, %roster_id, entry_id = %entry.id, "roster entered contest");

        self.rank_contest(contest_id, false).await;
        Ok(entry)
    }

    // ── Scoring ──────────────────────────────────────────────────────

    /// Records a match event and recomputes everything it affects.
    ///
    /// The event is stored durably before it becomes visible. Roster and
    /// leaderboard fan-out is best-effort and reported as counts.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MatchNotFound`] for an unknown match,
    /// [`GatewayError::ScoringClosed`] unless the match is live or paused,
    /// [`GatewayError::InvalidRequest`] for an invalid event, or a
    /// persistence error if the event could not be stored.
    pub async fn record_event(&self, input: NewMatchEvent) -> Result<ScoringOutcome, GatewayError> {
        let match_id = input.match_id;
        let handle = self.matches.get(match_id).await?;
        let event = {
            let guard = handle.read().await;
            guard.ensure_accepts_events()?;
            let event = MatchEvent::record(input)?;
            if let Some(db) = &self.persistence {
                db.save_event(&event).await?;
            }
            self.events.append(event.clone()).await?;
            event
        };

        let _ = self.event_bus.publish(DomainEvent::EventRecorded {
            match_id,
            event_id: event.id,
            player_id: event.player_id,
            points: event.points,
            timestamp: Utc::now(),
        });
        tracing::info!(
            %match_id,
            event_id = %event.id,
            player_id = %event.player_id,
            points = event.points,
            "match event recorded"
        );

        Ok(self
            .rescore_player(match_id, event.player_id, event.id)
            .await)
    }

    /// Applies an admin edit to a match event and recomputes the player.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] for an unknown event,
    /// [`GatewayError::ScoringClosed`] unless the match is live or paused,
    /// [`GatewayError::InvalidRequest`] for an invalid edit, or a
    /// persistence error.
    pub async fn amend_event(
        &self,
        event_id: EventId,
        amendment: &EventAmendment,
    ) -> Result<ScoringOutcome, GatewayError> {
        let mut staged = self.events.get(event_id).await?;
        let match_id = staged.match_id;
        let handle = self.matches.get(match_id).await?;
        {
            let guard = handle.read().await;
            guard.ensure_accepts_events()?;
            staged.amend(amendment)?;
            if let Some(db) = &self.persistence {
                db.save_event(&staged).await?;
            }
            self.events.replace(staged.clone()).await?;
        }
        self.publish_amendment(match_id, event_id, AmendmentKind::Edited);
        Ok(self
            .rescore_player(match_id, staged.player_id, event_id)
            .await)
    }

    /// Deletes a match event and recomputes the player.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotFound`] for an unknown event,
    /// [`GatewayError::ScoringClosed`] unless the match is live or paused,
    /// or a persistence error.
    pub async fn delete_event(&self, event_id: EventId) -> Result<ScoringOutcome, GatewayError> {
        let event = self.events.get(event_id).await?;
        let handle = self.matches.get(event.match_id).await?;
        {
            let guard = handle.read().await;
            guard.ensure_accepts_events()?;
            if let Some(db) = &self.persistence {
                db.delete_event(event_id).await?;
            }
            self.events.remove(event_id).await?;
        }
        self.publish_amendment(event.match_id, event_id, AmendmentKind::Deleted);
        Ok(self
            .rescore_player(event.match_id, event.player_id, event_id)
            .await)
    }

    /// Recomputes every roster and re-ranks every contest of a match.
    ///
    /// With `force` set, contests that are already finalized are re-ranked
    /// too; they are never paid again.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MatchNotFound`] for an unknown match and
    /// [`GatewayError::ScoringClosed`] unless the match is live, paused or
    /// completed.
    pub async fn recalculate_match(
        &self,
        match_id: MatchId,
        force: bool,
    ) -> Result<RecalculationSummary, GatewayError> {
        let status = self.matches.get(match_id).await?.read().await.status;
        if !status.accepts_recalculation() {
            return Err(GatewayError::ScoringClosed { match_id, status });
        }

        let aggregation = self.aggregator.recompute_match(match_id).await;
        self.journal_rosters(&aggregation).await;

        let mut leaderboards_updated = 0;
        for contest_id in self.contests.contests_for_match(match_id).await {
            if let Some(outcome) = self.rank_contest(contest_id, force).await {
                leaderboards_updated += 1;
                let _ = self.event_bus.publish(DomainEvent::ContestOutcomeChanged {
                    contest_id,
                    affected_user_ids: outcome.contest.participant_ids(),
                    reason: OutcomeReason::Recalculated,
                    timestamp: Utc::now(),
                });
            }
        }

        tracing::info!(
            %match_id,
            force,
            rosters_updated = aggregation.rosters_updated,
            rosters_failed = aggregation.rosters_failed,
            leaderboards_updated,
            "match recalculated"
        );
        Ok(RecalculationSummary {
            match_id,
            rosters_updated: aggregation.rosters_updated,
            rosters_failed: aggregation.rosters_failed,
            leaderboards_updated,
        })
    }

    // ── Leaderboards ─────────────────────────────────────────────────

    /// Returns the top `top` rows (the configured default when `None`) of
    /// the latest published leaderboard, plus the viewer's own standing.
    ///
    /// Never waits for a ranking pass in progress.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ContestNotFound`] for an unknown contest.
    pub async fn get_leaderboard(
        &self,
        contest_id: ContestId,
        top: Option<usize>,
        viewer: Option<UserId>,
    ) -> Result<LeaderboardView, GatewayError> {
        let snapshot = self.contests.leaderboard(contest_id).await?;
        let top_n = top.unwrap_or(self.connections.settings().top_n);
        Ok(snapshot.view(top_n, viewer))
    }

    /// Returns the latest published snapshot of a contest.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ContestNotFound`] for an unknown contest.
    pub async fn leaderboard_snapshot(
        &self,
        contest_id: ContestId,
    ) -> Result<Arc<LeaderboardSnapshot>, GatewayError> {
        self.contests.leaderboard(contest_id).await
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Moves a match to `to` and applies the side effects of the new status.
    ///
    /// Entering `completed` this way runs the final recompute but does not
    /// settle; use [`ContestService::complete_match`] for that.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MatchNotFound`] for an unknown match and
    /// [`GatewayError::InvalidTransition`] if `to` is not reachable, in
    /// which case nothing changes.
    pub async fn transition_match(
        &self,
        match_id: MatchId,
        to: MatchStatus,
    ) -> Result<TransitionOutcome, GatewayError> {
        let handle = self.matches.get(match_id).await?;
        let mut unit = UnitOfWork::begin(handle, "match_transition").await;
        let previous_status = unit.transition(to)?;
        let current = (*unit).clone();
        unit.commit();

        self.journal_match(&current).await;
        self.publish_status_change(match_id, previous_status, to);
        let effects = self.apply_lifecycle(match_id, previous_status, to).await;
        Ok(TransitionOutcome {
            previous_status,
            current,
            effects,
        })
    }

    /// Completes a match, recording the winner and MVP, and optionally
    /// settles its contests.
    ///
    /// Calling this again on a completed match is a retry: no transition
    /// happens, and settlement only pays what is still unpaid.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MatchNotFound`] for an unknown match,
    /// [`GatewayError::InvalidTransition`] if the match cannot complete
    /// from its current status, or [`GatewayError::SettlementAborted`] if
    /// the match stops being completed while settling.
    pub async fn complete_match(
        &self,
        match_id: MatchId,
        request: CompleteMatch,
    ) -> Result<CompletionSummary, GatewayError> {
        let handle = self.matches.get(match_id).await?;
        let mut unit = UnitOfWork::begin(handle, "match_completion").await;
        let previous_status = unit.status;
        let already_completed = previous_status == MatchStatus::Completed;
        if !already_completed {
            unit.transition(MatchStatus::Completed)?;
        }
        if let Some(team) = request.winner_team_id {
            unit.winner_team_id = Some(team);
        }
        if let Some(player) = request.mvp_player_id {
            unit.mvp_player_id = Some(player);
        }
        let current = (*unit).clone();
        unit.commit();
        self.journal_match(&current).await;

        let effects = if already_completed {
            tracing::info!(%match_id, "match already completed, treating as retry");
            LifecycleEffects::default()
        } else {
            self.publish_status_change(match_id, previous_status, MatchStatus::Completed);
            self.apply_lifecycle(match_id, previous_status, MatchStatus::Completed)
                .await
        };

        let settlement = if request.distribute_prizes {
            let summary = self.settlement.settle_match(match_id).await?;
            self.announce_settlement(&summary, request.send_notifications)
                .await;
            Some(summary)
        } else {
            None
        };

        Ok(CompletionSummary {
            current,
            already_completed,
            effects,
            settlement,
        })
    }

    /// Returns the settlement state of a contest. Reading it never pays.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ContestNotFound`] for an unknown contest.
    pub async fn settlement_status(
        &self,
        contest_id: ContestId,
    ) -> Result<SettlementStatus, GatewayError> {
        let contest = self.contests.snapshot(contest_id).await?;
        Ok(SettlementStatus {
            contest_id,
            status: contest.status,
            is_finalized: contest.is_finalized,
            record: contest.settlement,
        })
    }

    // ── Startup ──────────────────────────────────────────────────────

    /// Loads persisted state into the stores and republishes every
    /// contest's leaderboard.
    ///
    /// Roster totals of matches that still accept recalculation are
    /// rebuilt from the event log before ranking, so a journal write lost
    /// before shutdown cannot leave a stale total.
    pub async fn hydrate(&self, state: PersistedState) {
        let match_ids: Vec<MatchId> = state.matches.iter().map(|m| m.id).collect();
        let rescorable: Vec<MatchId> = state
            .matches
            .iter()
            .filter(|m| m.status.accepts_recalculation())
            .map(|m| m.id)
            .collect();
        for m in state.matches {
            self.events.open_match(m.id).await;
            self.matches.upsert(m.id, m).await;
        }
        let mut events_loaded = 0;
        for event in state.events {
            let event_id = event.id;
            match self.events.append(event).await {
                Ok(()) => events_loaded += 1,
                Err(e) => tracing::warn!(%event_id, error = %e, "skipping persisted event"),
            }
        }
        let rosters_loaded = state.rosters.len();
        for roster in state.rosters {
            self.rosters.upsert(roster).await;
        }
        let contests_loaded = state.contests.len();
        for contest in state.contests {
            self.contests.upsert(contest).await;
        }

        let mut rosters_rescored = 0;
        for match_id in &rescorable {
            let aggregation = self.aggregator.recompute_match(*match_id).await;
            self.journal_rosters(&aggregation).await;
            rosters_rescored += aggregation.rosters_updated;
        }
        self.lock_due_rosters(Utc::now()).await;

        let mut leaderboards = 0;
        for match_id in &match_ids {
            leaderboards += self.rank_match(*match_id, true).await;
        }
        tracing::info!(
            matches = match_ids.len(),
            events = events_loaded,
            rosters = rosters_loaded,
            contests = contests_loaded,
            rosters_rescored,
            leaderboards,
            "state hydrated"
        );
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Locks the match's rosters if it is upcoming and past its lock time.
    async fn lock_rosters_if_due(&self, match_id: MatchId, now: DateTime<Utc>) -> usize {
        let Ok(handle) = self.matches.get(match_id).await else {
            return 0;
        };
        let due = {
            let m = handle.read().await;
            m.status == MatchStatus::Upcoming && m.lock_time_passed(now)
        };
        if !due {
            return 0;
        }
        self.mark_rosters(match_id, |r| {
            let changed = !r.is_locked;
            r.is_locked = true;
            changed
        })
        .await
    }

    async fn rescore_player(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        event_id: EventId,
    ) -> ScoringOutcome {
        let aggregation = self.aggregator.recompute(&[(match_id, player_id)]).await;
        self.journal_rosters(&aggregation).await;
        let leaderboards_updated = self.rank_match(match_id, false).await;
        ScoringOutcome {
            event_id,
            rosters_updated: aggregation.rosters_updated,
            rosters_failed: aggregation.rosters_failed,
            leaderboards_updated,
        }
    }

    /// Ranks every contest of the match; returns how many were published.
    async fn rank_match(&self, match_id: MatchId, include_finalized: bool) -> usize {
        let mut ranked = 0;
        for contest_id in self.contests.contests_for_match(match_id).await {
            if self.rank_contest(contest_id, include_finalized).await.is_some() {
                ranked += 1;
            }
        }
        ranked
    }

    async fn rank_contest(
        &self,
        contest_id: ContestId,
        include_finalized: bool,
    ) -> Option<RankOutcome> {
        match self.ranker.rank(contest_id, include_finalized).await {
            Ok(Some(outcome)) => {
                self.journal_contest(&outcome.contest).await;
                let _ = self.event_bus.publish(DomainEvent::LeaderboardUpdated {
                    contest_id,
                    sequence: outcome.snapshot.sequence,
                    ranked_entries: outcome.snapshot.rows.len(),
                    timestamp: Utc::now(),
                });
                let delivered = self
                    .connections
                    .publish(Arc::clone(&outcome.snapshot))
                    .await;
                if delivered > 0 {
                    tracing::debug!(%contest_id, delivered, "leaderboard pushed");
                }
                Some(outcome)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(%contest_id, error = %e, "ranking pass skipped");
                None
            }
        }
    }

    async fn apply_lifecycle(
        &self,
        match_id: MatchId,
        from: MatchStatus,
        to: MatchStatus,
    ) -> LifecycleEffects {
        let mut effects = LifecycleEffects::default();
        match (from, to) {
            (MatchStatus::Upcoming, MatchStatus::Live) => {
                effects.rosters_touched = self
                    .mark_rosters(match_id, |r| {
                        let changed = !r.is_locked;
                        r.is_locked = true;
                        changed
                    })
                    .await;
                effects.contests_advanced = self
                    .advance_contests(match_id, ContestStatus::Live)
                    .await;
            }
            (_, MatchStatus::Cancelled) => {
                effects.contests_advanced = self
                    .advance_contests(match_id, ContestStatus::Cancelled)
                    .await;
            }
            (_, MatchStatus::Completed) => {
                let aggregation = self.aggregator.recompute_match(match_id).await;
                self.journal_rosters(&aggregation).await;
                effects.rosters_updated = aggregation.rosters_updated;
                effects.leaderboards_updated = self.rank_match(match_id, false).await;
                effects.rosters_touched = self
                    .mark_rosters(match_id, |r| {
                        let changed = !r.is_finalized;
                        r.is_finalized = true;
                        r.is_locked = true;
                        changed
                    })
                    .await;
                effects.contests_advanced = self
                    .advance_contests(match_id, ContestStatus::Completed)
                    .await;
            }
            _ => {}
        }
        tracing::info!(
            %match_id,
            %from,
            %to,
            rosters_touched = effects.rosters_touched,
            contests_advanced = effects.contests_advanced,
            "lifecycle effects applied"
        );
        effects
    }

    /// Applies `mark` to every roster of the match; returns how many changed.
    async fn mark_rosters(&self, match_id: MatchId, mark: impl Fn(&mut Roster) -> bool) -> usize {
        let mut touched = 0;
        for roster_id in self.rosters.rosters_for_match(match_id).await {
            let Ok(handle) = self.rosters.get(roster_id).await else {
                continue;
            };
            let mut roster = handle.write().await;
            if mark(&mut *roster) {
                roster.updated_at = Utc::now();
                let copy = roster.clone();
                drop(roster);
                touched += 1;
                self.journal_roster(&copy).await;
            }
        }
        touched
    }

    /// Advances every contest of the match that can move to `to`.
    async fn advance_contests(&self, match_id: MatchId, to: ContestStatus) -> usize {
        let mut advanced = 0;
        for contest_id in self.contests.contests_for_match(match_id).await {
            let Ok(handle) = self.contests.get(contest_id).await else {
                continue;
            };
            let mut contest = handle.write().await;
            if contest.advance(to) {
                let copy = contest.clone();
                drop(contest);
                advanced += 1;
                tracing::debug!(%contest_id, status = %to, "contest advanced");
                self.journal_contest(&copy).await;
            }
        }
        advanced
    }

    async fn announce_settlement(&self, summary: &SettlementSummary, notify: bool) {
        for record in &summary.records {
            let contest_id = record.contest_id;
            let winners_paid = record
                .payouts
                .iter()
                .filter(|p| p.outcome == PayoutStatus::Credited)
                .count();
            let _ = self.event_bus.publish(DomainEvent::ContestSettled {
                contest_id,
                winners_paid,
                total_paid: record.total_paid,
                timestamp: Utc::now(),
            });
            let Ok(contest) = self.contests.snapshot(contest_id).await else {
                continue;
            };
            self.journal_contest(&contest).await;
            if notify {
                let _ = self.event_bus.publish(DomainEvent::ContestOutcomeChanged {
                    contest_id,
                    affected_user_ids: contest.participant_ids(),
                    reason: OutcomeReason::Settled,
                    timestamp: Utc::now(),
                });
            }
        }
    }

    fn publish_status_change(&self, match_id: MatchId, from: MatchStatus, to: MatchStatus) {
        let _ = self.event_bus.publish(DomainEvent::MatchStatusChanged {
            match_id,
            from,
            to,
            timestamp: Utc::now(),
        });
        tracing::info!(%match_id, %from, %to, "match status changed");
    }

    fn publish_amendment(&self, match_id: MatchId, event_id: EventId, kind: AmendmentKind) {
        let _ = self.event_bus.publish(DomainEvent::EventAmended {
            match_id,
            event_id,
            kind,
            timestamp: Utc::now(),
        });
        tracing::info!(%match_id, %event_id, ?kind, "match event amended");
    }

    async fn journal_match(&self, m: &Match) {
        if let Some(db) = &self.persistence
            && let Err(e) = db.save_match(m).await
        {
            tracing::warn!(match_id = %m.id, error = %e, "failed to journal match");
        }
    }

    async fn journal_roster(&self, roster: &Roster) {
        if let Some(db) = &self.persistence
            && let Err(e) = db.save_roster(roster).await
        {
            tracing::warn!(roster_id = %roster.id, error = %e, "failed to journal roster");
        }
    }

    async fn journal_rosters(&self, aggregation: &AggregationSummary) {
        for roster in &aggregation.updated {
            self.journal_roster(roster).await;
        }
    }

    async fn journal_contest(&self, contest: &Contest) {
        if let Some(db) = &self.persistence
            && let Err(e) = db.save_contest(contest).await
        {
            tracing::warn!(contest_id = %contest.id, error = %e, "failed to journal contest");
        }
    }
}
