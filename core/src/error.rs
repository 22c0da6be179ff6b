//! Error types shared by the store, the engine and the ports.

use crate::types::EventId;
use thiserror::Error;

/// Errors returned by `book` / `cancel` and by store mutations.
///
/// Every variant is recoverable. `CapacityExhausted` and `NothingToCancel`
/// are ordinary business outcomes rather than faults; see
/// [`BookingError::is_rejection`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// The event is not (or no longer) in the store
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// `book` attempted with every seat already booked
    #[error("No seats left for event {event_id} (capacity {total_seats})")]
    CapacityExhausted {
        /// Event that is full
        event_id: EventId,
        /// Its capacity
        total_seats: u32,
    },

    /// `cancel` attempted with zero booked seats
    #[error("No booked seats to cancel for event {0}")]
    NothingToCancel(EventId),

    /// The mutation sink could not be reached; nothing was applied
    #[error("Mutation sink unavailable: {0}")]
    SinkUnavailable(String),
}

impl BookingError {
    /// True for the expected "the counter is at its bound" outcomes.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::CapacityExhausted { .. } | Self::NothingToCancel(_)
        )
    }

    /// Event the error refers to, if any
    #[must_use]
    pub const fn event_id(&self) -> Option<EventId> {
        match self {
            Self::EventNotFound(id) | Self::NothingToCancel(id) => Some(*id),
            Self::CapacityExhausted { event_id, .. } => Some(*event_id),
            Self::SinkUnavailable(_) => None,
        }
    }
}

/// A record whose booked count exceeds its capacity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("event {event_id}: booked seats {booked_seats} exceed total seats {total_seats}")]
pub struct InvariantViolation {
    /// Offending event
    pub event_id: EventId,
    /// Capacity on the record
    pub total_seats: u32,
    /// Booked count on the record
    pub booked_seats: u32,
}

/// Failures of the inbound snapshot feed.
///
/// A failed pull never touches the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// The feed could not be reached
    #[error("Feed unavailable: {0}")]
    Unavailable(String),

    /// The feed delivered a record that breaks the capacity invariant
    #[error("Feed delivered an invalid record: {0}")]
    InvalidRecord(#[from] InvariantViolation),

    /// The feed delivered the same event twice in one snapshot
    #[error("Feed delivered event {0} more than once")]
    DuplicateEvent(EventId),
}

/// Failures of the outbound mutation sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The sink could not be reached
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    /// The authority refused the mutation
    #[error("Authority rejected mutation: {0}")]
    Rejected(BookingError),
}

impl From<SinkError> for BookingError {
    fn from(error: SinkError) -> Self {
        match error {
            SinkError::Unavailable(reason) => Self::SinkUnavailable(reason),
            SinkError::Rejected(rejection) => rejection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_business_outcomes() {
        let full = BookingError::CapacityExhausted {
            event_id: EventId::new(1),
            total_seats: 40,
        };
        assert!(full.is_rejection());
        assert!(BookingError::NothingToCancel(EventId::new(1)).is_rejection());
        assert!(!BookingError::EventNotFound(EventId::new(1)).is_rejection());
        assert!(!BookingError::SinkUnavailable("down".into()).is_rejection());
    }

    #[test]
    fn test_sink_error_maps_to_booking_error() {
        let unavailable: BookingError = SinkError::Unavailable("timeout".into()).into();
        assert_eq!(unavailable, BookingError::SinkUnavailable("timeout".into()));

        let rejected: BookingError =
            SinkError::Rejected(BookingError::NothingToCancel(EventId::new(3))).into();
        assert_eq!(rejected, BookingError::NothingToCancel(EventId::new(3)));
        assert_eq!(rejected.event_id(), Some(EventId::new(3)));
    }

    #[test]
    fn test_error_messages() {
        let err = BookingError::CapacityExhausted {
            event_id: EventId::new(2),
            total_seats: 80,
        };
        assert_eq!(err.to_string(), "No seats left for event 2 (capacity 80)");

        let violation = InvariantViolation {
            event_id: EventId::new(5),
            total_seats: 3,
            booked_seats: 4,
        };
        assert_eq!(
            FeedError::from(violation).to_string(),
            "Feed delivered an invalid record: event 5: booked seats 4 exceed total seats 3"
        );
    }
}
