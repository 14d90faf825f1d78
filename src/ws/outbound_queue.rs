//! Bounded per-connection snapshot queue.
//!
//! Each live connection owns one [`SnapshotQueue`]. The broadcaster pushes
//! without ever waiting; when the queue is full the oldest pending snapshot
//! is dropped to make room. Closing the queue discards everything still
//! pending and wakes the consumer so its connection loop can exit.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::domain::LeaderboardSnapshot;

/// Result of a [`SnapshotQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Snapshot queued without loss.
    Queued,
    /// Snapshot queued after dropping the oldest pending one.
    DroppedOldest,
    /// Queue is closed; snapshot discarded.
    Closed,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<Arc<LeaderboardSnapshot>>,
    closed: bool,
    dropped: u64,
}

/// Single-consumer, drop-oldest queue of leaderboard snapshots.
#[derive(Debug)]
pub struct SnapshotQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl SnapshotQueue {
    /// Creates a queue holding at most `capacity` snapshots (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues a snapshot. Never blocks.
    pub fn push(&self, snapshot: Arc<LeaderboardSnapshot>) -> PushOutcome {
        let outcome = {
            let mut state = self.lock();
            if state.closed {
                return PushOutcome::Closed;
            }
            let outcome = if state.items.len() >= self.capacity {
                state.items.pop_front();
                state.dropped = state.dropped.saturating_add(1);
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Queued
            };
            state.items.push_back(snapshot);
            outcome
        };
        self.notify.notify_one();
        outcome
    }

    /// Removes the oldest pending snapshot without waiting.
    pub fn try_pop(&self) -> Option<Arc<LeaderboardSnapshot>> {
        self.lock().items.pop_front()
    }

    /// Waits for the next snapshot. Returns `None` once the queue is closed.
    pub async fn next(&self) -> Option<Arc<LeaderboardSnapshot>> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(snapshot) = state.items.pop_front() {
                    return Some(snapshot);
                }
            }
            notified.await;
        }
    }

    /// Closes the queue and discards every pending snapshot.
    pub fn close(&self) {
        {
            let mut state = self.lock();
            state.closed = true;
            state.items.clear();
        }
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    /// Returns `true` once the queue has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Returns the number of pending snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Returns how many snapshots were dropped on overflow.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}
