//! # Seat Inventory Testing
//!
//! Test doubles and fixtures for the seat inventory.
//!
//! This crate provides:
//! - [`mocks::InMemoryAuthority`]: an in-process authority implementing both
//!   ports, with latency and an offline switch
//! - [`mocks::ScriptedFeed`]: a feed that replays queued responses and can be
//!   held at a gate to stage interleavings
//! - [`fixtures`]: the sample catalogue and record helpers
//!
//! ## Example
//!
//! ```ignore
//! use seat_inventory_testing::{fixtures, mocks::InMemoryAuthority};
//! use seat_inventory_runtime::{InventoryStore, ReservationEngine};
//!
//! #[tokio::test]
//! async fn test_book_one_seat() {
//!     let authority = InMemoryAuthority::new(fixtures::sample_events());
//!     let store = Arc::new(InventoryStore::new());
//!     store.reconcile(fixtures::sample_events()).unwrap();
//!
//!     let engine = ReservationEngine::new(store, Arc::new(authority));
//!     let record = engine.book(EventId::new(1)).await.unwrap();
//!     assert_eq!(record.booked_seats(), 41);
//! }
//! ```

mod authority;
mod feed;

/// Test doubles for the authority ports
pub mod mocks {
    pub use crate::authority::InMemoryAuthority;
    pub use crate::feed::{FeedGate, ScriptedFeed};
}

/// Sample data
pub mod fixtures {
    use seat_inventory_core::{EventId, EventRecord, InventorySnapshot};
    use std::time::Duration;

    /// Round-trip latency of a snapshot fetch against the demo authority
    pub const FEED_LATENCY: Duration = Duration::from_millis(500);

    /// Round-trip latency of a mutation against the demo authority
    pub const SINK_LATENCY: Duration = Duration::from_millis(400);

    /// Build a record, panicking if `booked > total`.
    ///
    /// # Panics
    ///
    /// Panics if the counts violate the seat invariant.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn record(id: u64, name: &str, total: u32, booked: u32) -> EventRecord {
        EventRecord::new(EventId::new(id), name, total, booked).expect("fixture record is valid")
    }

    /// The three-event catalogue the demo authority starts with.
    #[must_use]
    pub fn sample_events() -> InventorySnapshot {
        InventorySnapshot::new(vec![
            record(1, "Rock Concert", 100, 40),
            record(2, "Stand-up Comedy", 80, 20),
            record(3, "Movie Premiere", 120, 70),
        ])
    }

    /// A single event with `total` seats, `booked` of them taken.
    #[must_use]
    pub fn single_event(total: u32, booked: u32) -> InventorySnapshot {
        InventorySnapshot::new(vec![record(1, "Rock Concert", total, booked)])
    }
}

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; later calls are no-ops.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "seat_inventory_runtime=debug".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::fixtures;
    use seat_inventory_core::EventId;

    #[test]
    fn test_sample_events() {
        let events = fixtures::sample_events();
        assert_eq!(events.len(), 3);

        let rock = events.get(EventId::new(1));
        assert_eq!(rock.map(|r| r.available_seats()), Some(60));
        assert!(events.iter().all(|r| r.booked_seats() <= r.total_seats()));
    }

    #[test]
    fn test_single_event() {
        let events = fixtures::single_event(40, 40);
        assert_eq!(events.len(), 1);
        assert!(events.iter().all(|r| !r.can_book()));
    }
}
