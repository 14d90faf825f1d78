//! Broadcast channel for domain events.
//!
//! [`EventBus`] fans committed state changes out to observers. The
//! notification relay listens through a [`FilteredReceiver`] that keeps
//! only the facts it forwards and rides over lag instead of failing.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::DomainEvent;

/// Broadcast bus for [`DomainEvent`]s.
///
/// When the ring buffer is full, lagging receivers lose the oldest facts;
/// publishers never wait.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    /// Creates a bus holding at most `capacity` undelivered facts.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a fact and returns how many receivers got it.
    pub fn publish(&self, event: DomainEvent) -> usize {
        let event_type = event.event_type_str();
        let receivers = self.sender.send(event).unwrap_or(0);
        tracing::debug!(event_type, receivers, "domain event published");
        receivers
    }

    /// Subscribes to every fact published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Subscribes to the facts accepted by `filter`.
    #[must_use]
    pub fn subscribe_filtered<F>(&self, filter: F) -> FilteredReceiver<F>
    where
        F: Fn(&DomainEvent) -> bool,
    {
        FilteredReceiver {
            inner: self.sender.subscribe(),
            filter,
            missed: 0,
        }
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiver yielding only the facts its filter accepts.
pub struct FilteredReceiver<F> {
    inner: broadcast::Receiver<DomainEvent>,
    filter: F,
    missed: u64,
}

impl<F> std::fmt::Debug for FilteredReceiver<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteredReceiver")
            .field("missed", &self.missed)
            .finish_non_exhaustive()
    }
}

impl<F> FilteredReceiver<F>
where
    F: Fn(&DomainEvent) -> bool,
{
    /// Waits for the next accepted fact. Returns `None` once every
    /// publisher is gone.
    pub async fn recv(&mut self) -> Option<DomainEvent> {
        loop {
            match self.inner.recv().await {
                Ok(event) if (self.filter)(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    self.missed += skipped;
                    tracing::warn!(skipped, "event receiver lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Facts lost to lag since the receiver was created.
    #[must_use]
    pub const fn missed(&self) -> u64 {
        self.missed
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ContestId, MatchId, MatchStatus};
    use chrono::Utc;

    fn make_event() -> DomainEvent {
        DomainEvent::MatchStatusChanged {
            match_id: MatchId::new(),
            from: MatchStatus::Upcoming,
            to: MatchStatus::Live,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = EventBus::new(100);
        assert_eq!(bus.publish(make_event()), 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(100);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let contest_id = ContestId::new();
        let count = bus.publish(DomainEvent::LeaderboardUpdated {
            contest_id,
            sequence: 1,
            ranked_entries: 0,
            timestamp: Utc::now(),
        });
        assert_eq!(count, 2);

        let Ok(e1) = rx1.recv().await else {
            panic!("rx1 failed");
        };
        let Ok(e2) = rx2.recv().await else {
            panic!("rx2 failed");
        };
        assert_eq!(e1.contest_id(), Some(contest_id));
        assert_eq!(e2.contest_id(), Some(contest_id));
    }

    #[tokio::test]
    async fn filtered_receiver_skips_other_facts() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe_filtered(|e| e.contest_id().is_some());
        bus.publish(make_event());
        let contest_id = ContestId::new();
        bus.publish(DomainEvent::ContestSettled {
            contest_id,
            winners_paid: 1,
            total_paid: 50.0,
            timestamp: Utc::now(),
        });

        let Some(event) = rx.recv().await else {
            panic!("bus is open");
        };
        assert_eq!(event.contest_id(), Some(contest_id));
    }

    #[tokio::test]
    async fn filtered_receiver_counts_lag_and_continues() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe_filtered(|_| true);
        for _ in 0..5 {
            bus.publish(make_event());
        }
        let Some(_) = rx.recv().await else {
            panic!("bus is open");
        };
        assert_eq!(rx.missed(), 3);
    }

    #[tokio::test]
    async fn filtered_receiver_ends_when_bus_is_dropped() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe_filtered(|_| true);
        drop(bus);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = EventBus::new(100);
        assert_eq!(bus.receiver_count(), 0);

        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        drop(rx1);
        assert_eq!(bus.receiver_count(), 1);
    }
}
