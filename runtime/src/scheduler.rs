//! Periodic reconciliation against the authority feed.
//!
//! The scheduler pulls a full snapshot from a [`SeatFeed`] and hands it to
//! [`InventoryStore::reconcile`]:
//!
//! - once immediately on [`SyncScheduler::start`]
//! - every [`SchedulerConfig::interval`] after that
//! - whenever a [`SyncTrigger`] is requested (coalesced)
//!
//! A failed pull leaves the store untouched and is retried on the next tick.
//!
//! [`SchedulerHandle::stop`] is strict: once it returns, no further
//! reconciliation happens, even if a feed call was still in flight.

use crate::error::{SchedulerError, SyncError};
use crate::metrics::SyncMetrics;
use crate::store::{InventoryStore, ReconcileReport};
use crate::health::{HealthCheck, HealthStatus};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use seat_inventory_core::SeatFeed;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Component name in health checks.
const COMPONENT: &str = "sync_scheduler";

/// Shortest accepted pull interval.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Time between periodic pulls
    pub interval: Duration,
    /// How long [`SchedulerHandle::stop`] waits before aborting the loop
    pub stop_timeout: Duration,
    /// Consecutive failed pulls before health reports degraded
    pub degraded_after: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            stop_timeout: Duration::from_secs(5),
            degraded_after: 3,
        }
    }
}

impl SchedulerConfig {
    /// Set the pull interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the stop timeout.
    #[must_use]
    pub const fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Set the failure threshold for degraded health.
    #[must_use]
    pub const fn with_degraded_after(mut self, failures: u32) -> Self {
        self.degraded_after = failures;
        self
    }
}

/// Requests an out-of-band pull.
///
/// Requests made while a pull is pending or running collapse into one.
#[derive(Debug, Clone, Default)]
pub struct SyncTrigger {
    notify: Arc<Notify>,
}

impl SyncTrigger {
    /// Create a trigger not yet attached to a scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the scheduler to pull as soon as it is idle.
    pub fn request(&self) {
        self.notify.notify_one();
    }

    pub(crate) async fn notified(&self) {
        self.notify.notified().await;
    }
}

#[derive(Debug, Default)]
struct SyncState {
    consecutive_failures: u32,
    pulls: u64,
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Resets the syncing flag however the pull ends.
struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Pulls the authority feed into the store.
///
/// # Example
///
/// ```ignore
/// let scheduler = Arc::new(SyncScheduler::new(store, feed, SchedulerConfig::default()));
/// let handle = scheduler.start();
///
/// // ...
///
/// handle.stop().await?;
/// ```
pub struct SyncScheduler {
    store: Arc<InventoryStore>,
    feed: Arc<dyn SeatFeed>,
    config: SchedulerConfig,
    trigger: SyncTrigger,
    state: Mutex<SyncState>,
    /// Held for reading across the stop check and `reconcile`.
    stopped: RwLock<bool>,
    syncing: AtomicBool,
}

impl SyncScheduler {
    /// Create a scheduler that reconciles `store` from `feed`.
    #[must_use]
    pub fn new(store: Arc<InventoryStore>, feed: Arc<dyn SeatFeed>, config: SchedulerConfig) -> Self {
        Self {
            store,
            feed,
            config,
            trigger: SyncTrigger::new(),
            state: Mutex::new(SyncState::default()),
            stopped: RwLock::new(false),
            syncing: AtomicBool::new(false),
        }
    }

    /// Trigger that requests an immediate pull from this scheduler.
    #[must_use]
    pub fn trigger(&self) -> SyncTrigger {
        self.trigger.clone()
    }

    /// The active configuration
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// True while a pull is in flight.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// True once [`SchedulerHandle::stop`] has returned.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.stopped.read()
    }

    /// Health of the sync loop.
    ///
    /// Degraded after `degraded_after` consecutive failed pulls, unhealthy once
    /// stopped.
    #[must_use]
    pub fn health(&self) -> HealthCheck {
        if self.is_stopped() {
            return HealthCheck::new(COMPONENT, HealthStatus::Unhealthy)
                .with_message("Scheduler stopped");
        }

        let state = self.state.lock();
        let check = if state.consecutive_failures >= self.config.degraded_after.max(1) {
            let reason = state.last_error.as_deref().unwrap_or("unknown error");
            HealthCheck::new(COMPONENT, HealthStatus::Degraded).with_message(format!(
                "{} consecutive feed failures, last: {reason}",
                state.consecutive_failures
            ))
        } else {
            HealthCheck::new(COMPONENT, HealthStatus::Healthy)
        };

        let check = check
            .with_metadata("consecutive_failures", state.consecutive_failures)
            .with_metadata("pulls", state.pulls);
        match state.last_success {
            Some(at) => check.with_metadata("last_success", at.to_rfc3339()),
            None => check,
        }
    }

    /// Pull one snapshot and reconcile the store with it.
    ///
    /// On success the reconciled view is broadcast as
    /// [`InventoryUpdate::Reconciled`](seat_inventory_core::InventoryUpdate::Reconciled).
    ///
    /// # Errors
    ///
    /// - [`SyncError::Feed`] if the feed failed or the snapshot was rejected;
    ///   the store is unchanged
    /// - [`SyncError::Stopped`] if the scheduler was stopped before the
    ///   snapshot could be applied
    #[tracing::instrument(skip(self))]
    pub async fn sync_once(&self) -> Result<ReconcileReport, SyncError> {
        if self.is_stopped() {
            return Err(SyncError::Stopped);
        }

        self.syncing.store(true, Ordering::Release);
        let _syncing = SyncingGuard(&self.syncing);
        let started = Instant::now();

        let result = match self.feed.fetch_snapshot().await {
            Ok(snapshot) => {
                let gate = self.stopped.read();
                if *gate {
                    tracing::debug!("Dropping snapshot pulled before stop");
                    return Err(SyncError::Stopped);
                }
                self.store
                    .reconcile_and_publish(snapshot)
                    .map_err(SyncError::from)
            },
            Err(error) => Err(SyncError::from(error)),
        };

        let elapsed = started.elapsed();
        let mut state = self.state.lock();
        state.pulls += 1;
        match &result {
            Ok(report) => {
                state.consecutive_failures = 0;
                state.last_success = Some(Utc::now());
                state.last_error = None;
                drop(state);

                SyncMetrics::record_reconciliation(report, self.store.len(), elapsed);
                tracing::info!(
                    inserted = report.inserted,
                    updated = report.updated,
                    removed = report.removed,
                    unchanged = report.unchanged,
                    elapsed_ms = elapsed.as_millis(),
                    "Inventory reconciled"
                );
            },
            Err(error) => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                state.last_error = Some(error.to_string());
                let failures = state.consecutive_failures;
                drop(state);

                SyncMetrics::record_feed_failure(elapsed);
                tracing::warn!(%error, consecutive_failures = failures, "Feed pull failed");
            },
        }

        result
    }

    /// Spawn the sync loop.
    ///
    /// The first pull happens immediately. A scheduler runs at most once:
    /// starting it again after [`SchedulerHandle::stop`] exits straight away.
    #[must_use]
    pub fn start(self: &Arc<Self>) -> SchedulerHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(Arc::clone(self).run(shutdown_rx));
        tracing::info!(interval = ?self.config.interval, "Sync scheduler started");

        SchedulerHandle {
            scheduler: Arc::clone(self),
            shutdown,
            task,
        }
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Shutdown signal received");
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
                () = self.trigger.notified() => {
                    tracing::debug!("Pull requested");
                }
            }

            if let Err(SyncError::Stopped) = self.sync_once().await {
                break;
            }
        }

        tracing::info!("Sync scheduler loop exited");
    }

    fn mark_stopped(&self) {
        // Waits for any reconcile holding the read side.
        *self.stopped.write() = true;
    }
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("config", &self.config)
            .field("syncing", &self.is_syncing())
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

/// Handle to a running sync loop.
///
/// Dropping the handle without calling [`SchedulerHandle::stop`] leaves the
/// loop running.
#[derive(Debug)]
pub struct SchedulerHandle {
    scheduler: Arc<SyncScheduler>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// True while the loop task has not finished.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the loop and wait for it to exit.
    ///
    /// An in-flight pull may finish within the stop timeout; past it the loop
    /// is aborted. Either way nothing is reconciled after this returns.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::StopTimeout`] if the loop had to be aborted
    /// - [`SchedulerError::TaskJoinError`] if the loop panicked
    pub async fn stop(mut self) -> Result<(), SchedulerError> {
        self.shutdown.send_replace(true);

        let timeout = self.scheduler.config.stop_timeout;
        let result = match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(joined) => joined.map_err(SchedulerError::from),
            Err(_) => {
                tracing::warn!(?timeout, "Sync loop did not stop in time, aborting");
                self.task.abort();
                Err(SchedulerError::StopTimeout(timeout))
            },
        };

        self.scheduler.mark_stopped();
        tracing::info!("Sync scheduler stopped");
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use seat_inventory_core::{EventId, EventRecord, FeedError, InventorySnapshot, InventoryUpdate};
    use std::collections::VecDeque;

    /// Feed returning queued results, `Unavailable` once drained.
    #[derive(Default)]
    struct QueuedFeed {
        results: Mutex<VecDeque<Result<InventorySnapshot, FeedError>>>,
    }

    impl QueuedFeed {
        fn with(results: Vec<Result<InventorySnapshot, FeedError>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
            })
        }
    }

    impl SeatFeed for QueuedFeed {
        fn fetch_snapshot(&self) -> BoxFuture<'_, Result<InventorySnapshot, FeedError>> {
            let next = self
                .results
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(FeedError::Unavailable("drained".into())));
            Box::pin(async move { next })
        }
    }

    fn snapshot(booked: u32) -> InventorySnapshot {
        vec![EventRecord::new(EventId::new(1), "Rock Concert", 100, booked).unwrap()]
            .into_iter()
            .collect()
    }

    fn scheduler(feed: Arc<QueuedFeed>) -> (Arc<InventoryStore>, SyncScheduler) {
        let store = Arc::new(InventoryStore::new());
        let scheduler = SyncScheduler::new(store.clone(), feed, SchedulerConfig::default());
        (store, scheduler)
    }

    #[test]
    fn test_config_defaults_and_builders() {
        let config = SchedulerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.stop_timeout, Duration::from_secs(5));
        assert_eq!(config.degraded_after, 3);

        let config = config
            .with_interval(Duration::from_secs(1))
            .with_stop_timeout(Duration::from_millis(100))
            .with_degraded_after(1);
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.stop_timeout, Duration::from_millis(100));
        assert_eq!(config.degraded_after, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_requests_coalesce() {
        let trigger = SyncTrigger::new();
        trigger.request();
        trigger.request();
        trigger.request();

        trigger.notified().await;
        let second = tokio::time::timeout(Duration::from_secs(1), trigger.notified()).await;
        assert!(second.is_err(), "requests should collapse into one permit");
    }

    #[tokio::test]
    async fn test_sync_once_reconciles_and_broadcasts() {
        let (store, scheduler) = scheduler(QueuedFeed::with(vec![Ok(snapshot(40))]));
        let mut updates = store.subscribe();

        let report = scheduler.sync_once().await.unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(store.get(EventId::new(1)).unwrap().booked_seats(), 40);
        assert!(!scheduler.is_syncing());

        match updates.recv().await.unwrap() {
            InventoryUpdate::Reconciled(view) => assert_eq!(view, snapshot(40)),
            other => panic!("unexpected update: {other:?}"),
        }

        let health = scheduler.health();
        assert!(health.status.is_healthy());
        assert!(health.metadata_value("last_success").is_some());
    }

    #[tokio::test]
    async fn test_failed_pull_leaves_store_unchanged() {
        let (store, scheduler) = scheduler(QueuedFeed::with(vec![
            Ok(snapshot(40)),
            Err(FeedError::Unavailable("timeout".into())),
        ]));

        scheduler.sync_once().await.unwrap();
        let err = scheduler.sync_once().await.unwrap_err();
        assert!(matches!(err, SyncError::Feed(FeedError::Unavailable(_))));
        assert_eq!(store.get(EventId::new(1)).unwrap().booked_seats(), 40);
        assert!(!scheduler.is_syncing());
    }

    #[tokio::test]
    async fn test_health_degrades_after_consecutive_failures() {
        let (_store, scheduler) = scheduler(QueuedFeed::with(vec![]));

        for _ in 0..2 {
            assert!(scheduler.sync_once().await.is_err());
        }
        assert!(scheduler.health().status.is_healthy());

        assert!(scheduler.sync_once().await.is_err());
        let health = scheduler.health();
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.metadata_value("consecutive_failures"), Some("3"));
        assert!(health.message.unwrap().contains("drained"));
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let (_store, scheduler) = scheduler(QueuedFeed::with(vec![
            Err(FeedError::Unavailable("a".into())),
            Err(FeedError::Unavailable("b".into())),
            Err(FeedError::Unavailable("c".into())),
            Ok(snapshot(10)),
        ]));

        for _ in 0..3 {
            assert!(scheduler.sync_once().await.is_err());
        }
        assert_eq!(scheduler.health().status, HealthStatus::Degraded);

        scheduler.sync_once().await.unwrap();
        let health = scheduler.health();
        assert!(health.status.is_healthy());
        assert_eq!(health.metadata_value("pulls"), Some("4"));
    }

    #[tokio::test]
    async fn test_stopped_scheduler_refuses_to_sync() {
        let (store, scheduler) = scheduler(QueuedFeed::with(vec![Ok(snapshot(40))]));
        scheduler.mark_stopped();

        assert_eq!(scheduler.sync_once().await, Err(SyncError::Stopped));
        assert!(store.is_empty());
        assert_eq!(scheduler.health().status, HealthStatus::Unhealthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_pulls_immediately_and_stops() {
        let store = Arc::new(InventoryStore::new());
        let scheduler = Arc::new(SyncScheduler::new(
            store.clone(),
            QueuedFeed::with(vec![Ok(snapshot(40))]),
            SchedulerConfig::default(),
        ));
        let mut updates = store.subscribe();

        let handle = scheduler.start();
        assert!(matches!(
            updates.recv().await.unwrap(),
            InventoryUpdate::Reconciled(_)
        ));
        assert!(handle.is_running());

        handle.stop().await.unwrap();
        assert!(scheduler.is_stopped());
        assert_eq!(store.len(), 1);
    }
}
