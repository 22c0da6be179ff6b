//! Outbound signals for the presentation layer.

use crate::action::SeatAction;
use crate::types::{EventRecord, InventorySnapshot};
use serde::{Deserialize, Serialize};

/// Change notification broadcast after every committed mutation or pull.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InventoryUpdate {
    /// A seat was booked; carries the committed record
    Booked(EventRecord),
    /// A seat was released; carries the committed record
    Cancelled(EventRecord),
    /// A reconciliation pull was applied; carries the store's view after it
    Reconciled(InventorySnapshot),
}

impl InventoryUpdate {
    /// Notification for a committed single-seat action
    #[must_use]
    pub fn committed(action: SeatAction, record: EventRecord) -> Self {
        match action {
            SeatAction::Book => Self::Booked(record),
            SeatAction::Cancel => Self::Cancelled(record),
        }
    }

    /// The single record carried by a point mutation
    #[must_use]
    pub const fn record(&self) -> Option<&EventRecord> {
        match self {
            Self::Booked(record) | Self::Cancelled(record) => Some(record),
            Self::Reconciled(_) => None,
        }
    }
}

/// Transient feedback status for the presentation layer.
///
/// How long a terminal status stays visible is up to the adapter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Nothing in progress
    #[default]
    Idle,
    /// A book/cancel is waiting on the authority
    Processing,
    /// The last action booked a seat
    Booked,
    /// The last action released a seat
    Cancelled,
}

impl BookingStatus {
    /// Terminal status for a successful action
    #[must_use]
    pub const fn completed(action: SeatAction) -> Self {
        match action {
            SeatAction::Book => Self::Booked,
            SeatAction::Cancel => Self::Cancelled,
        }
    }

    /// User-facing text, `None` when idle
    #[must_use]
    pub const fn message(self) -> Option<&'static str> {
        match self {
            Self::Idle => None,
            Self::Processing => Some("Processing..."),
            Self::Booked => Some("Seat booked!"),
            Self::Cancelled => Some("Booking cancelled!"),
        }
    }
}
