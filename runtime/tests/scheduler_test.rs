//! Sync scheduler: startup pull, periodic pulls, triggers, failures and stop.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use seat_inventory_core::{BookingError, EventId, FeedError, InventorySnapshot, InventoryUpdate};
use seat_inventory_runtime::{
    HealthStatus, InventoryStore, ReservationEngine, SchedulerConfig, SchedulerError, SyncError,
    SyncScheduler,
};
use seat_inventory_testing::{
    fixtures,
    mocks::{InMemoryAuthority, ScriptedFeed},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const ROCK: EventId = EventId::new(1);

async fn next_reconciled(updates: &mut broadcast::Receiver<InventoryUpdate>) -> InventorySnapshot {
    loop {
        if let InventoryUpdate::Reconciled(snapshot) = updates.recv().await.unwrap() {
            return snapshot;
        }
    }
}

fn slow_authority() -> InMemoryAuthority {
    InMemoryAuthority::with_latency(
        fixtures::sample_events(),
        fixtures::FEED_LATENCY,
        fixtures::SINK_LATENCY,
    )
}

fn scheduler_for(
    feed: Arc<dyn seat_inventory_core::SeatFeed>,
    config: SchedulerConfig,
) -> (Arc<InventoryStore>, Arc<SyncScheduler>) {
    let store = Arc::new(InventoryStore::new());
    let scheduler = Arc::new(SyncScheduler::new(store.clone(), feed, config));
    (store, scheduler)
}

#[tokio::test(start_paused = true)]
async fn test_startup_pull_populates_store() {
    seat_inventory_testing::init_tracing();
    let authority = slow_authority();
    let (store, scheduler) = scheduler_for(Arc::new(authority.clone()), SchedulerConfig::default());
    let mut updates = store.subscribe();
    assert!(store.is_empty());

    let handle = scheduler.start();
    let snapshot = next_reconciled(&mut updates).await;

    assert_eq!(snapshot, fixtures::sample_events());
    assert_eq!(store.snapshot(), fixtures::sample_events());
    assert_eq!(authority.fetch_count(), 1);
    assert!(store.health().status.is_healthy());

    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_periodic_pull_picks_up_external_changes() {
    let authority = slow_authority();
    let config = SchedulerConfig::default().with_interval(Duration::from_secs(30));
    let (store, scheduler) = scheduler_for(Arc::new(authority.clone()), config);
    let mut updates = store.subscribe();

    let handle = scheduler.start();
    next_reconciled(&mut updates).await;

    authority.set_booked(ROCK, 90).unwrap();
    assert_eq!(store.get(ROCK).unwrap().booked_seats(), 40);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(authority.fetch_count(), 1);

    let snapshot = next_reconciled(&mut updates).await;
    assert_eq!(snapshot.get(ROCK).unwrap().booked_seats(), 90);
    assert_eq!(store.get(ROCK).unwrap().booked_seats(), 90);
    assert_eq!(authority.fetch_count(), 2);

    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_booking_requests_follow_up_pull() {
    let authority = slow_authority();
    let config = SchedulerConfig::default().with_interval(Duration::from_secs(3600));
    let (store, scheduler) = scheduler_for(Arc::new(authority.clone()), config);
    let engine = ReservationEngine::new(store.clone(), Arc::new(authority.clone()))
        .with_sync_trigger(scheduler.trigger());
    let mut updates = store.subscribe();

    let handle = scheduler.start();
    next_reconciled(&mut updates).await;

    engine.book(ROCK).await.unwrap();
    let snapshot = next_reconciled(&mut updates).await;

    assert_eq!(authority.fetch_count(), 2);
    assert_eq!(snapshot.get(ROCK).unwrap().booked_seats(), 41);
    assert_eq!(store.get(ROCK).unwrap().booked_seats(), 41);

    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_authority_rejection_requests_follow_up_pull() {
    let authority = slow_authority();
    let config = SchedulerConfig::default().with_interval(Duration::from_secs(3600));
    let (store, scheduler) = scheduler_for(Arc::new(authority.clone()), config);
    let engine = ReservationEngine::new(store.clone(), Arc::new(authority.clone()))
        .with_sync_trigger(scheduler.trigger());
    let mut updates = store.subscribe();

    let handle = scheduler.start();
    next_reconciled(&mut updates).await;

    // Another client fills the event; the store still shows free seats
    authority.set_booked(ROCK, 100).unwrap();
    assert!(store.get(ROCK).unwrap().can_book());

    let err = engine.book(ROCK).await.unwrap_err();
    assert!(matches!(err, BookingError::CapacityExhausted { .. }));

    let snapshot = next_reconciled(&mut updates).await;
    assert_eq!(authority.fetch_count(), 2);
    assert_eq!(snapshot.get(ROCK).unwrap().booked_seats(), 100);
    assert!(!store.get(ROCK).unwrap().can_book());

    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_authority_requests_no_pull() {
    let authority = slow_authority();
    let config = SchedulerConfig::default().with_interval(Duration::from_secs(3600));
    let (store, scheduler) = scheduler_for(Arc::new(authority.clone()), config);
    let engine = ReservationEngine::new(store.clone(), Arc::new(authority.clone()))
        .with_sync_trigger(scheduler.trigger());
    let mut updates = store.subscribe();

    let handle = scheduler.start();
    next_reconciled(&mut updates).await;

    authority.set_offline(true);
    let err = engine.book(ROCK).await.unwrap_err();
    assert!(matches!(err, BookingError::SinkUnavailable(_)));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(authority.fetch_count(), 1);

    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_pulls_keep_store_and_degrade_health() {
    let authority = slow_authority();
    let config = SchedulerConfig::default()
        .with_interval(Duration::from_secs(30))
        .with_degraded_after(3);
    let (store, scheduler) = scheduler_for(Arc::new(authority.clone()), config);
    let mut updates = store.subscribe();

    let handle = scheduler.start();
    next_reconciled(&mut updates).await;
    authority.set_offline(true);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(authority.fetch_count(), 3);
    assert_eq!(store.snapshot(), fixtures::sample_events());
    assert!(scheduler.health().status.is_healthy());

    tokio::time::sleep(Duration::from_secs(30)).await;
    let health = scheduler.health();
    assert_eq!(health.status, HealthStatus::Degraded);
    assert_eq!(health.metadata_value("consecutive_failures"), Some("3"));
    assert_eq!(store.snapshot(), fixtures::sample_events());

    authority.set_offline(false);
    next_reconciled(&mut updates).await;
    assert!(scheduler.health().status.is_healthy());

    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_invalid_snapshot_is_rejected_whole() {
    let feed = ScriptedFeed::new();
    feed.push_ok(fixtures::sample_events());
    feed.push_ok(InventorySnapshot::new(vec![
        fixtures::record(1, "Rock Concert", 100, 41),
        fixtures::record(1, "Rock Concert", 100, 42),
    ]));
    let (store, scheduler) = scheduler_for(Arc::new(feed.clone()), SchedulerConfig::default());

    scheduler.sync_once().await.unwrap();
    let err = scheduler.sync_once().await.unwrap_err();

    assert_eq!(err, SyncError::Feed(FeedError::DuplicateEvent(ROCK)));
    assert_eq!(store.snapshot(), fixtures::sample_events());
}

#[tokio::test(start_paused = true)]
async fn test_no_pulls_after_stop() {
    let authority = slow_authority();
    let (store, scheduler) = scheduler_for(Arc::new(authority.clone()), SchedulerConfig::default());
    let mut updates = store.subscribe();

    let handle = scheduler.start();
    next_reconciled(&mut updates).await;
    handle.stop().await.unwrap();
    assert!(scheduler.is_stopped());

    authority.set_booked(ROCK, 99).unwrap();
    tokio::time::sleep(Duration::from_secs(300)).await;
    scheduler.trigger().request();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(authority.fetch_count(), 1);
    assert_eq!(scheduler.sync_once().await, Err(SyncError::Stopped));
    assert_eq!(store.get(ROCK).unwrap().booked_seats(), 40);
    assert_eq!(scheduler.health().status, HealthStatus::Unhealthy);
}

#[tokio::test(start_paused = true)]
async fn test_stop_waits_for_in_flight_pull() {
    let authority = slow_authority();
    let (store, scheduler) = scheduler_for(Arc::new(authority.clone()), SchedulerConfig::default());

    let handle = scheduler.start();
    tokio::task::yield_now().await;
    assert_eq!(authority.fetch_count(), 1);

    // The 500ms pull fits inside the 5s stop timeout
    handle.stop().await.unwrap();
    assert_eq!(store.snapshot(), fixtures::sample_events());
    assert!(!scheduler.is_syncing());
}

#[tokio::test(start_paused = true)]
async fn test_stop_timeout_aborts_stuck_pull_without_applying() {
    let feed = ScriptedFeed::new();
    feed.push_ok(fixtures::sample_events());
    let config = SchedulerConfig::default().with_stop_timeout(Duration::from_secs(1));
    let (store, scheduler) = scheduler_for(Arc::new(feed.clone()), config);
    let mut updates = store.subscribe();

    let handle = scheduler.start();
    next_reconciled(&mut updates).await;

    let gate = feed.hold();
    feed.push_ok(InventorySnapshot::default());
    scheduler.trigger().request();
    gate.wait_started().await;
    assert!(scheduler.is_syncing());

    let err = handle.stop().await.unwrap_err();
    assert!(matches!(err, SchedulerError::StopTimeout(timeout) if timeout == Duration::from_secs(1)));

    gate.release();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(scheduler.is_stopped());
    assert_eq!(store.snapshot(), fixtures::sample_events());
}
