//! Marketplace demo binary
//!
//! Loads the catalogue from a simulated authority, books and cancels seats,
//! and shows the store converging through the sync loop.

use anyhow::Context;
use marketplace::{print_status, render_snapshot, Config};
use seat_inventory_core::{EventId, InventoryUpdate};
use seat_inventory_runtime::metrics::MetricsServer;
use seat_inventory_runtime::{
    HealthReport, InventoryStore, ReservationEngine, SyncScheduler,
};
use seat_inventory_testing::{fixtures, mocks::InMemoryAuthority};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketplace=debug,seat_inventory_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::debug!(?config, "Loaded configuration");

    let mut metrics = MetricsServer::new(config.metrics_addr());
    metrics.start().context("starting metrics recorder")?;

    println!("=== Seat Marketplace ===\n");

    let authority = InMemoryAuthority::with_latency(
        fixtures::sample_events(),
        config.feed_latency(),
        config.sink_latency(),
    );
    let store = Arc::new(InventoryStore::new());
    let scheduler = Arc::new(SyncScheduler::new(
        store.clone(),
        Arc::new(authority.clone()),
        config.scheduler(),
    ));
    let engine = Arc::new(
        ReservationEngine::new(store.clone(), Arc::new(authority.clone()))
            .with_sync_trigger(scheduler.trigger()),
    );

    let mut updates = store.subscribe();
    let status_task = tokio::spawn(print_status(engine.status(), config.status_display()));
    let handle = scheduler.start();

    println!("Loading events...");
    loop {
        if let InventoryUpdate::Reconciled(snapshot) = updates.recv().await? {
            print!("{}", render_snapshot(&snapshot));
            break;
        }
    }

    let rock = EventId::new(1);

    println!("\n>>> Book a seat for event {rock}");
    let record = engine.book(rock).await?;
    println!("  {record}");

    println!("\n>>> Cancel a seat for event {rock}");
    let record = engine.cancel(rock).await?;
    println!("  {record}");

    println!("\n>>> Fill event 2 from another client, then try to book");
    authority.set_booked(EventId::new(2), 80)?;
    scheduler.sync_once().await?;
    match engine.book(EventId::new(2)).await {
        Ok(record) => println!("  unexpectedly booked: {record}"),
        Err(error) => println!("  rejected: {error}"),
    }

    println!("\n>>> Book for an unknown event");
    if let Err(error) = engine.book(EventId::new(42)).await {
        println!("  rejected: {error}");
    }

    println!("\n>>> Authority goes offline");
    authority.set_offline(true);
    if let Err(error) = engine.book(rock).await {
        println!("  failed: {error}");
    }
    authority.set_offline(false);

    println!("\nCurrent inventory:");
    print!("{}", render_snapshot(&store.snapshot()));

    let report = HealthReport::new(vec![store.health(), scheduler.health()]);
    println!("\nHealth: {}", report.status);
    for check in &report.checks {
        println!(
            "  {:<16} {:<9} {}",
            check.component,
            check.status,
            check.message.as_deref().unwrap_or("")
        );
    }

    if let Some(rendered) = metrics.render() {
        let lines = rendered
            .lines()
            .filter(|line| line.starts_with("inventory_") && !line.contains("_bucket"));
        println!("\nMetrics:");
        for line in lines {
            println!("  {line}");
        }
    }

    handle.stop().await?;
    drop(engine);
    status_task.await?;

    println!("\n=== Done ===");
    Ok(())
}
