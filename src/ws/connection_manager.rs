//! Live connection registry and snapshot fan-out.
//!
//! [`ConnectionManager`] is constructed once per process and handed to
//! whatever needs to broadcast. It keeps, per contest, the set of
//! subscribed [`LiveConnection`]s. Fan-out only pushes into each
//! connection's own bounded queue, so a slow client never holds up the
//! ranking pass or its neighbours.
//!
//! The manager has an explicit lifecycle: [`ConnectionManager::start`]
//! spawns the liveness sweeper and [`ConnectionManager::stop`] shuts it
//! down and releases every connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, oneshot};
use tokio::task::JoinHandle;

use super::outbound_queue::{PushOutcome, SnapshotQueue};
use crate::domain::{ConnectionId, ContestId, LeaderboardSnapshot, UserId};

/// Tunables for live connections.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Per-connection outbound queue bound.
    pub queue_capacity: usize,
    /// Interval between server pings and liveness sweeps.
    pub ping_interval: Duration,
    /// A connection silent for longer than this is evicted.
    pub liveness_timeout: Duration,
    /// Number of leaderboard rows pushed to each viewer.
    pub top_n: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            ping_interval: Duration::from_secs(15),
            liveness_timeout: Duration::from_secs(45),
            top_n: 10,
        }
    }
}

/// One subscribed client. Ephemeral; never persisted.
#[derive(Debug)]
pub struct LiveConnection {
    /// Connection identifier.
    pub id: ConnectionId,
    /// Contest the client watches.
    pub contest_id: ContestId,
    /// Viewing user, if the client identified one.
    pub viewer: Option<UserId>,
    /// Time the subscription opened.
    pub connected_at: DateTime<Utc>,
    last_ping_at_ms: AtomicI64,
    // Highest delivered sequence plus one; zero means nothing delivered yet.
    delivered_marker: AtomicU64,
    queue: SnapshotQueue,
}

impl LiveConnection {
    fn new(contest_id: ContestId, viewer: Option<UserId>, queue_capacity: usize) -> Self {
        let now = Utc::now();
        Self {
            id: ConnectionId::new(),
            contest_id,
            viewer,
            connected_at: now,
            last_ping_at_ms: AtomicI64::new(now.timestamp_millis()),
            delivered_marker: AtomicU64::new(0),
            queue: SnapshotQueue::new(queue_capacity),
        }
    }

    /// Records client activity now.
    pub fn touch(&self) {
        self.touch_at(Utc::now());
    }

    /// Records client activity at `at`.
    pub fn touch_at(&self, at: DateTime<Utc>) {
        self.last_ping_at_ms
            .fetch_max(at.timestamp_millis(), Ordering::AcqRel);
    }

    /// Returns the time of the last client activity.
    #[must_use]
    pub fn last_ping_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_ping_at_ms.load(Ordering::Acquire))
            .unwrap_or(self.connected_at)
    }

    /// Returns `true` if the client has been silent longer than `timeout`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        let silent_ms = now
            .timestamp_millis()
            .saturating_sub(self.last_ping_at_ms.load(Ordering::Acquire));
        let limit_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        silent_ms > limit_ms
    }

    /// Claims the right to deliver `sequence`. Returns `false` for a
    /// snapshot older than one already delivered; with `allow_repeat` the
    /// latest delivered sequence may be sent again.
    pub fn admit(&self, sequence: u64, allow_repeat: bool) -> bool {
        let marker = sequence.saturating_add(1);
        let previous = self.delivered_marker.fetch_max(marker, Ordering::AcqRel);
        if allow_repeat {
            marker >= previous
        } else {
            marker > previous
        }
    }

    /// Returns the outbound queue.
    #[must_use]
    pub fn queue(&self) -> &SnapshotQueue {
        &self.queue
    }
}

type ConnectionTable = HashMap<ContestId, HashMap<ConnectionId, Arc<LiveConnection>>>;

#[derive(Debug)]
struct Sweeper {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

#[derive(Debug)]
struct ManagerInner {
    settings: ConnectionSettings,
    table: RwLock<ConnectionTable>,
    sweeper: Mutex<Option<Sweeper>>,
}

/// Per-contest registry of live connections.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    /// Creates a stopped manager.
    #[must_use]
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                settings,
                table: RwLock::new(HashMap::new()),
                sweeper: Mutex::new(None),
            }),
        }
    }

    /// Returns the connection settings.
    #[must_use]
    pub fn settings(&self) -> &ConnectionSettings {
        &self.inner.settings
    }

    /// Spawns the liveness sweeper. Calling it on a running manager does
    /// nothing.
    pub fn start(&self) {
        let mut slot = self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return;
        }
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(sweep_loop(
            Arc::downgrade(&self.inner),
            self.inner.settings.ping_interval,
            shutdown_rx,
        ));
        *slot = Some(Sweeper { shutdown, task });
        tracing::info!(
            interval_secs = self.inner.settings.ping_interval.as_secs(),
            "connection manager started"
        );
    }

    /// Stops the sweeper and releases every connection.
    pub async fn stop(&self) {
        let sweeper = self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(Sweeper { shutdown, task }) = sweeper {
            let _ = shutdown.send(());
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "liveness sweeper ended abnormally");
            }
        }

        let drained: Vec<Arc<LiveConnection>> = self
            .inner
            .table
            .write()
            .await
            .drain()
            .flat_map(|(_, conns)| conns.into_values())
            .collect();
        for connection in &drained {
            connection.queue.close();
        }
        tracing::info!(released = drained.len(), "connection manager stopped");
    }

    /// Returns `true` while the sweeper is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Subscribes a new connection to `contest_id`.
    pub async fn register(&self, contest_id: ContestId, viewer: Option<UserId>) -> Arc<LiveConnection> {
        let connection = Arc::new(LiveConnection::new(
            contest_id,
            viewer,
            self.inner.settings.queue_capacity,
        ));
        self.inner
            .table
            .write()
            .await
            .entry(contest_id)
            .or_default()
            .insert(connection.id, Arc::clone(&connection));
        tracing::info!(connection_id = %connection.id, %contest_id, "live connection opened");
        connection
    }

    /// Removes a connection and discards its pending snapshots. Returns
    /// `false` if it was already gone.
    pub async fn unregister(&self, contest_id: ContestId, connection_id: ConnectionId) -> bool {
        let removed = {
            let mut table = self.inner.table.write().await;
            let removed = table
                .get_mut(&contest_id)
                .and_then(|conns| conns.remove(&connection_id));
            if table.get(&contest_id).is_some_and(HashMap::is_empty) {
                table.remove(&contest_id);
            }
            removed
        };
        match removed {
            Some(connection) => {
                connection.queue.close();
                tracing::info!(%connection_id, %contest_id, "live connection closed");
                true
            }
            None => false,
        }
    }

    /// Enqueues `snapshot` for every subscriber of its contest and returns
    /// the number of queues it reached.
    pub async fn publish(&self, snapshot: Arc<LeaderboardSnapshot>) -> usize {
        let table = self.inner.table.read().await;
        let Some(conns) = table.get(&snapshot.contest_id) else {
            return 0;
        };
        let mut reached = 0;
        for connection in conns.values() {
            match connection.queue.push(Arc::clone(&snapshot)) {
                PushOutcome::Queued => reached += 1,
                PushOutcome::DroppedOldest => {
                    reached += 1;
                    tracing::warn!(
                        connection_id = %connection.id,
                        contest_id = %snapshot.contest_id,
                        "slow consumer, dropped oldest pending snapshot"
                    );
                }
                PushOutcome::Closed => {}
            }
        }
        reached
    }

    /// Returns the number of connections watching `contest_id`.
    pub async fn subscriber_count(&self, contest_id: ContestId) -> usize {
        self.inner
            .table
            .read()
            .await
            .get(&contest_id)
            .map_or(0, HashMap::len)
    }

    /// Returns the number of open connections across all contests.
    pub async fn connection_count(&self) -> usize {
        self.inner.table.read().await.values().map(HashMap::len).sum()
    }

    /// Evicts every connection silent past the liveness timeout as of
    /// `now`. Returns the number evicted.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        sweep_table(&self.inner, now).await
    }
}

async fn sweep_table(inner: &ManagerInner, now: DateTime<Utc>) -> usize {
    let timeout = inner.settings.liveness_timeout;
    let stale: Vec<(ContestId, ConnectionId)> = inner
        .table
        .read()
        .await
        .values()
        .flat_map(HashMap::values)
        .filter(|c| c.is_stale(now, timeout))
        .map(|c| (c.contest_id, c.id))
        .collect();
    if stale.is_empty() {
        return 0;
    }

    let mut table = inner.table.write().await;
    let mut evicted = 0;
    for (contest_id, connection_id) in stale {
        let Some(conns) = table.get_mut(&contest_id) else {
            continue;
        };
        if let Some(connection) = conns.remove(&connection_id) {
            connection.queue.close();
            evicted += 1;
            tracing::info!(%connection_id, %contest_id, "evicted unresponsive connection");
        }
        if conns.is_empty() {
            table.remove(&contest_id);
        }
    }
    evicted
}

async fn sweep_loop(
    inner: Weak<ManagerInner>,
    interval: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let evicted = sweep_table(&inner, Utc::now()).await;
                if evicted > 0 {
                    tracing::debug!(evicted, "liveness sweep");
                }
            }
        }
    }
    tracing::debug!("liveness sweeper exiting");
}
