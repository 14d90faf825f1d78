//! Point calculation and roster aggregation.
//!
//! [`PointCalculator`] turns a player's match events into base points.
//! [`RosterAggregator`] applies the captaincy multipliers and rewrites the
//! totals of every roster that contains an affected player. Totals are
//! always derived fresh from the event store, so re-running a
//! recomputation never drifts.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::domain::{EventStore, MatchId, PlayerId, Roster, RosterBook, RosterId, UnitOfWork};
use crate::error::GatewayError;

/// Sums a player's event points for one match.
#[derive(Debug, Clone)]
pub struct PointCalculator {
    events: Arc<EventStore>,
}

impl PointCalculator {
    /// Creates a calculator reading from `events`.
    #[must_use]
    pub fn new(events: Arc<EventStore>) -> Self {
        Self { events }
    }

    /// Returns the player's base points for the match. A player with no
    /// events scores zero.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MatchNotFound`] if the match's event set
    /// cannot be read.
    pub async fn base_points(&self, match_id: MatchId, player_id: PlayerId) -> Result<f64, GatewayError> {
        let events = self.events.events_for_player(match_id, player_id).await?;
        Ok(events.iter().map(|e| e.points).sum())
    }
}

/// Result of one aggregation batch.
#[derive(Debug, Clone, Default)]
pub struct AggregationSummary {
    /// Rosters whose totals were rewritten.
    pub rosters_updated: usize,
    /// Rosters skipped because of a data error.
    pub rosters_failed: usize,
    /// Committed state of every updated roster.
    pub updated: Vec<Roster>,
}

/// Recomputes roster point entries and totals.
#[derive(Debug, Clone)]
pub struct RosterAggregator {
    rosters: Arc<RosterBook>,
    calculator: PointCalculator,
}

impl RosterAggregator {
    /// Creates an aggregator over `rosters`.
    #[must_use]
    pub fn new(rosters: Arc<RosterBook>, calculator: PointCalculator) -> Self {
        Self {
            rosters,
            calculator,
        }
    }

    /// Recomputes every roster containing one of the `affected` players.
    ///
    /// A failure on one roster is logged and counted; its siblings are
    /// still recomputed.
    pub async fn recompute(&self, affected: &[(MatchId, PlayerId)]) -> AggregationSummary {
        let mut targets: BTreeMap<RosterId, BTreeSet<PlayerId>> = BTreeMap::new();
        for &(match_id, player_id) in affected {
            for roster_id in self.rosters.rosters_with_player(match_id, player_id).await {
                targets.entry(roster_id).or_default().insert(player_id);
            }
        }
        let mut summary = AggregationSummary::default();
        for (roster_id, players) in targets {
            self.recompute_one(roster_id, Some(&players), &mut summary)
                .await;
        }
        summary
    }

    /// Recomputes every member of every roster built for `match_id`.
    pub async fn recompute_match(&self, match_id: MatchId) -> AggregationSummary {
        let mut summary = AggregationSummary::default();
        for roster_id in self.rosters.rosters_for_match(match_id).await {
            self.recompute_one(roster_id, None, &mut summary).await;
        }
        summary
    }

    async fn recompute_one(
        &self,
        roster_id: RosterId,
        players: Option<&BTreeSet<PlayerId>>,
        summary: &mut AggregationSummary,
    ) {
        match self.recompute_roster(roster_id, players).await {
            Ok(roster) => {
                tracing::debug!(%roster_id, total_points = roster.total_points, "roster recomputed");
                summary.rosters_updated += 1;
                summary.updated.push(roster);
            }
            Err(e) => {
                tracing::warn!(%roster_id, error = %e, "roster recomputation skipped");
                summary.rosters_failed += 1;
            }
        }
    }

    /// Rewrites the given players' entries (all members when `None`) and
    /// the total, all or nothing, under the roster's write lock.
    async fn recompute_roster(
        &self,
        roster_id: RosterId,
        players: Option<&BTreeSet<PlayerId>>,
    ) -> Result<Roster, GatewayError> {
        let handle = self.rosters.get(roster_id).await?;
        let mut unit = UnitOfWork::begin(handle, "roster_points").await;
        let match_id = unit.match_id;
        let members: Vec<PlayerId> = match players {
            Some(players) => players.iter().copied().collect(),
            None => unit.members().collect(),
        };
        for player_id in members {
            let base_points = self.calculator.base_points(match_id, player_id).await?;
            unit.apply_base_points(player_id, base_points);
        }
        unit.recompute_total();
        let updated = (*unit).clone();
        unit.commit();
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{MatchEvent, NewMatchEvent, NewRoster, UserId};

    struct Fixture {
        events: Arc<EventStore>,
        rosters: Arc<RosterBook>,
        aggregator: RosterAggregator,
        match_id: MatchId,
    }

    async fn fixture() -> Fixture {
        let events = Arc::new(EventStore::new());
        let rosters = Arc::new(RosterBook::new());
        let match_id = MatchId::new();
        events.open_match(match_id).await;
        let aggregator = RosterAggregator::new(
            Arc::clone(&rosters),
            PointCalculator::new(Arc::clone(&events)),
        );
        Fixture {
            events,
            rosters,
            aggregator,
            match_id,
        }
    }

    async fn record(events: &EventStore, match_id: MatchId, player_id: PlayerId, points: f64) {
        let Ok(event) = MatchEvent::record(NewMatchEvent {
            match_id,
            player_id,
            event_type: "kill".to_string(),
            points,
            round_number: 1,
            recorded_by: UserId::new(),
        }) else {
            panic!("valid event");
        };
        let Ok(()) = events.append(event).await else {
            panic!("append failed");
        };
    }

    async fn roster(
        book: &RosterBook,
        match_id: MatchId,
        captain: PlayerId,
        vice: PlayerId,
        members: Vec<PlayerId>,
    ) -> RosterId {
        let Ok(roster) = Roster::new(NewRoster {
            owner_id: UserId::new(),
            match_id,
            captain_player_id: captain,
            vice_captain_player_id: vice,
            members,
        }) else {
            panic!("valid roster");
        };
        let id = roster.id;
        let Ok(_) = book.insert(roster).await else {
            panic!("insert failed");
        };
        id
    }

    async fn total(book: &RosterBook, id: RosterId) -> f64 {
        let Ok(roster) = book.snapshot(id).await else {
            panic!("roster exists");
        };
        roster.total_points
    }

    #[tokio::test]
    async fn base_points_sum_events_and_default_to_zero() {
        let f = fixture().await;
        let player = PlayerId::new();
        let calculator = PointCalculator::new(Arc::clone(&f.events));
        let Ok(zero) = calculator.base_points(f.match_id, player).await else {
            panic!("known match");
        };
        assert!(zero.abs() < f64::EPSILON);

        record(&f.events, f.match_id, player, 2.0).await;
        record(&f.events, f.match_id, player, 3.5).await;
        let Ok(sum) = calculator.base_points(f.match_id, player).await else {
            panic!("known match");
        };
        assert!((sum - 5.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn unknown_match_is_a_data_error() {
        let f = fixture().await;
        let calculator = PointCalculator::new(Arc::clone(&f.events));
        assert!(matches!(
            calculator.base_points(MatchId::new(), PlayerId::new()).await,
            Err(GatewayError::MatchNotFound(_))
        ));
    }

    #[tokio::test]
    async fn captain_scenario_scores_double() {
        let f = fixture().await;
        let a = PlayerId::new();
        let b = PlayerId::new();
        let id = roster(&f.rosters, f.match_id, a, b, vec![a, b]).await;
        record(&f.events, f.match_id, a, 2.0).await;

        let summary = f.aggregator.recompute(&[(f.match_id, a)]).await;
        assert_eq!(summary.rosters_updated, 1);
        assert_eq!(summary.rosters_failed, 0);

        let Ok(r) = f.rosters.snapshot(id).await else {
            panic!("roster exists");
        };
        assert_eq!(r.entry(a).map(|e| e.points_earned), Some(4.0));
        assert!((r.total_points - 4.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn recompute_is_idempotent() {
        let f = fixture().await;
        let a = PlayerId::new();
        let b = PlayerId::new();
        let id = roster(&f.rosters, f.match_id, a, b, vec![a, b]).await;
        record(&f.events, f.match_id, b, 4.0).await;

        f.aggregator.recompute(&[(f.match_id, b)]).await;
        let first = total(&f.rosters, id).await;
        f.aggregator.recompute(&[(f.match_id, b)]).await;
        let second = total(&f.rosters, id).await;
        assert!((first - 6.0).abs() < f64::EPSILON);
        assert!((first - second).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn one_player_reaches_every_roster_holding_them() {
        let f = fixture().await;
        let star = PlayerId::new();
        let x = PlayerId::new();
        let y = PlayerId::new();
        let as_captain = roster(&f.rosters, f.match_id, star, x, vec![star, x]).await;
        let as_vice = roster(&f.rosters, f.match_id, y, star, vec![star, y]).await;
        let without = roster(&f.rosters, f.match_id, x, y, vec![x, y]).await;
        record(&f.events, f.match_id, star, 10.0).await;

        let summary = f.aggregator.recompute(&[(f.match_id, star)]).await;
        assert_eq!(summary.rosters_updated, 2);
        assert!((total(&f.rosters, as_captain).await - 20.0).abs() < f64::EPSILON);
        assert!((total(&f.rosters, as_vice).await - 15.0).abs() < f64::EPSILON);
        assert!(total(&f.rosters, without).await.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn failing_roster_does_not_abort_siblings() {
        let f = fixture().await;
        let a = PlayerId::new();
        let b = PlayerId::new();
        let healthy = roster(&f.rosters, f.match_id, a, b, vec![a, b]).await;

        // A roster for a match whose events were never opened fails to read.
        let orphan_match = MatchId::new();
        let _orphan = roster(&f.rosters, orphan_match, a, b, vec![a, b]).await;
        record(&f.events, f.match_id, a, 1.0).await;

        let summary = f
            .aggregator
            .recompute(&[(f.match_id, a), (orphan_match, a)])
            .await;
        assert_eq!(summary.rosters_updated, 1);
        assert_eq!(summary.rosters_failed, 1);
        assert!((total(&f.rosters, healthy).await - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn recompute_match_clears_points_of_deleted_events() {
        let f = fixture().await;
        let a = PlayerId::new();
        let b = PlayerId::new();
        let id = roster(&f.rosters, f.match_id, a, b, vec![a, b]).await;
        record(&f.events, f.match_id, a, 3.0).await;
        f.aggregator.recompute_match(f.match_id).await;
        assert!((total(&f.rosters, id).await - 6.0).abs() < f64::EPSILON);

        let Ok(events) = f.events.events_for_match(f.match_id).await else {
            panic!("known match");
        };
        for event in events {
            let _ = f.events.remove(event.id).await;
        }
        let summary = f.aggregator.recompute_match(f.match_id).await;
        assert_eq!(summary.rosters_updated, 1);
        assert!(total(&f.rosters, id).await.abs() < f64::EPSILON);
    }
}
