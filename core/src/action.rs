//! The single-seat mutations and their guarded step.
//!
//! [`SeatAction::apply`] is the only place the booked counter moves. The
//! store runs it inside a per-event critical section, so the bound check and
//! the increment are never split by another mutator.

use crate::error::BookingError;
use crate::types::EventRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single-seat intent against one event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatAction {
    /// Reserve one seat
    Book,
    /// Release one seat
    Cancel,
}

impl SeatAction {
    /// Apply the action to `record`, returning the next state.
    ///
    /// `Book` requires `booked_seats < total_seats`; `Cancel` requires
    /// `booked_seats > 0`. A failed precondition leaves the caller's record
    /// untouched.
    ///
    /// # Errors
    ///
    /// - [`BookingError::CapacityExhausted`] when booking a full event
    /// - [`BookingError::NothingToCancel`] when cancelling with no bookings
    pub fn apply(self, record: &EventRecord) -> Result<EventRecord, BookingError> {
        match self {
            Self::Book => {
                if record.booked_seats() >= record.total_seats() {
                    return Err(BookingError::CapacityExhausted {
                        event_id: record.id(),
                        total_seats: record.total_seats(),
                    });
                }
                Ok(record.with_booked_unchecked(record.booked_seats() + 1))
            },
            Self::Cancel => {
                if record.booked_seats() == 0 {
                    return Err(BookingError::NothingToCancel(record.id()));
                }
                Ok(record.with_booked_unchecked(record.booked_seats() - 1))
            },
        }
    }

    /// Lowercase wire name (`"book"` / `"cancel"`)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for SeatAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::EventId;
    use proptest::prelude::*;

    fn record(total: u32, booked: u32) -> EventRecord {
        EventRecord::new(EventId::new(1), "Rock Concert", total, booked).unwrap()
    }

    #[test]
    fn test_book_increments() {
        let next = SeatAction::Book.apply(&record(100, 40)).unwrap();
        assert_eq!(next.booked_seats(), 41);
        assert_eq!(next.available_seats(), 59);
    }

    #[test]
    fn test_cancel_decrements() {
        let next = SeatAction::Cancel.apply(&record(100, 41)).unwrap();
        assert_eq!(next.booked_seats(), 40);
    }

    #[test]
    fn test_book_at_capacity_is_rejected() {
        let full = record(40, 40);
        let err = SeatAction::Book.apply(&full).unwrap_err();
        assert_eq!(
            err,
            BookingError::CapacityExhausted {
                event_id: EventId::new(1),
                total_seats: 40,
            }
        );
        assert_eq!(full.booked_seats(), 40);
    }

    #[test]
    fn test_cancel_at_zero_is_rejected() {
        let err = SeatAction::Cancel.apply(&record(40, 0)).unwrap_err();
        assert_eq!(err, BookingError::NothingToCancel(EventId::new(1)));
    }

    #[test]
    fn test_zero_capacity_event_rejects_both() {
        let none = record(0, 0);
        assert!(SeatAction::Book.apply(&none).is_err());
        assert!(SeatAction::Cancel.apply(&none).is_err());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(SeatAction::Book.to_string(), "book");
        assert_eq!(serde_json::to_string(&SeatAction::Cancel).unwrap(), "\"cancel\"");
    }

    proptest! {
        #[test]
        fn prop_counter_stays_in_bounds(
            total in 0u32..20,
            actions in proptest::collection::vec(any::<bool>(), 0..100),
        ) {
            let mut current = record(total, 0);
            for is_book in actions {
                let action = if is_book { SeatAction::Book } else { SeatAction::Cancel };
                if let Ok(next) = action.apply(&current) {
                    current = next;
                }
                prop_assert!(current.check_invariant().is_ok());
                prop_assert_eq!(current.total_seats(), total);
            }
        }
    }
}
