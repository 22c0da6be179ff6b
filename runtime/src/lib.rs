//! # Seat Inventory Runtime
//!
//! Runtime components of the seat inventory reservation engine.
//!
//! ## Core Components
//!
//! - **[`InventoryStore`]**: authoritative per-event counters with a
//!   per-event critical section and atomic bulk reconciliation
//! - **[`ReservationEngine`]**: `book` / `cancel` against the authority's
//!   mutation sink, committed locally through the store
//! - **[`SyncScheduler`]**: periodic and on-demand reconciliation pulls from
//!   the authority feed
//!
//! ## Data Flow
//!
//! ```text
//! SeatFeed ──► SyncScheduler ──reconcile──► InventoryStore ◄──mutate── ReservationEngine ◄── MutationSink
//!                                              │
//!                                              └──► snapshot() / subscribe() ──► presentation
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use seat_inventory_runtime::{InventoryStore, ReservationEngine, SchedulerConfig, SyncScheduler};
//! use std::sync::Arc;
//!
//! let store = Arc::new(InventoryStore::new());
//! let scheduler = Arc::new(SyncScheduler::new(store.clone(), feed, SchedulerConfig::default()));
//! let engine = ReservationEngine::new(store.clone(), sink).with_sync_trigger(scheduler.trigger());
//!
//! let handle = scheduler.start();
//! let record = engine.book(EventId::new(1)).await?;
//! handle.stop().await?;
//! ```

/// Inventory store with per-event critical sections
pub mod store;

/// Reservation engine (`book` / `cancel`)
pub mod engine;

/// Periodic reconciliation scheduler
pub mod scheduler;

/// Prometheus metrics for observability
pub mod metrics;

/// Component health reporting
pub mod health;

pub use engine::ReservationEngine;
pub use error::{SchedulerError, SyncError};
pub use health::{HealthCheck, HealthReport, HealthStatus};
pub use scheduler::{SchedulerConfig, SchedulerHandle, SyncScheduler, SyncTrigger};
pub use store::{InventoryStore, ReconcileReport};

/// Error types for the runtime
pub mod error {
    use seat_inventory_core::FeedError;
    use std::time::Duration;
    use thiserror::Error;

    /// Errors from a single reconciliation pull
    ///
    /// Neither variant changes the store.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum SyncError {
        /// The feed failed or delivered an unusable snapshot
        ///
        /// The scheduler logs it and waits for the next tick.
        #[error("Feed pull failed: {0}")]
        Feed(#[from] FeedError),

        /// The scheduler has been stopped and no longer reconciles
        #[error("Scheduler is stopped")]
        Stopped,
    }

    /// Errors from stopping the scheduler loop
    #[derive(Error, Debug)]
    pub enum SchedulerError {
        /// The loop did not finish within the stop timeout and was aborted
        ///
        /// The abort can only land on a pending feed call, so nothing from
        /// that pull is applied.
        #[error("Scheduler did not stop within {0:?}; loop aborted")]
        StopTimeout(Duration),

        /// The loop task panicked
        #[error("Scheduler task failed: {0}")]
        TaskJoinError(#[from] tokio::task::JoinError),
    }
}
