//! # Seat Inventory Core
//!
//! Core types and ports for the seat inventory reservation engine.
//!
//! This crate defines what the engine reasons about, with no runtime attached:
//!
//! - **[`EventRecord`]**: capacity state of one event, with the invariant
//!   `0 <= booked_seats <= total_seats`
//! - **[`InventorySnapshot`]**: ordered records at one instant
//! - **[`SeatAction`]**: `Book` / `Cancel` and the guarded step that moves the
//!   booked counter
//! - **[`SeatFeed`] / [`MutationSink`]**: ports to the external authority
//! - **[`InventoryUpdate`] / [`BookingStatus`]**: outbound signals for the
//!   presentation layer
//!
//! The store, the reservation engine and the sync scheduler live in
//! `seat-inventory-runtime`.
//!
//! ## Example
//!
//! ```
//! use seat_inventory_core::{EventId, EventRecord, SeatAction, BookingError};
//!
//! let record = EventRecord::new(EventId::new(1), "Rock Concert", 100, 40)?;
//! let booked = SeatAction::Book.apply(&record)?;
//! assert_eq!(booked.booked_seats(), 41);
//! assert_eq!(booked.available_seats(), 59);
//!
//! let full = EventRecord::new(EventId::new(2), "Sold Out", 40, 40)?;
//! assert!(matches!(
//!     SeatAction::Book.apply(&full),
//!     Err(BookingError::CapacityExhausted { .. })
//! ));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Single-seat actions and the guarded counter step
pub mod action;

/// Error taxonomy
pub mod error;

/// Ports to the external authority
pub mod ports;

/// Event records and snapshots
pub mod types;

/// Notifications and status signal for the presentation layer
pub mod update;

pub use action::SeatAction;
pub use error::{BookingError, FeedError, InvariantViolation, SinkError};
pub use ports::{MutationSink, SeatFeed};
pub use types::{EventId, EventRecord, InventorySnapshot};
pub use update::{BookingStatus, InventoryUpdate};
