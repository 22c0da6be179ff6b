//! Domain types for the seat inventory.
//!
//! An [`EventRecord`] is the canonical capacity state of one bookable event;
//! an [`InventorySnapshot`] is an ordered set of records at one instant.

use crate::error::InvariantViolation;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a bookable event
///
/// Opaque to the engine; assigned by the authority feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(u64);

impl EventId {
    /// Creates an `EventId` from its raw value
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for EventId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Event Record
// ============================================================================

/// Capacity state of one event.
///
/// `id`, `name` and `total_seats` never change once the authority has
/// published the record. `booked_seats` always satisfies
/// `booked_seats <= total_seats`; constructors reject anything else.
///
/// Serialized with camelCase keys (`id`, `name`, `totalSeats`, `bookedSeats`),
/// the shape delivered by the authority feed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    id: EventId,
    name: String,
    total_seats: u32,
    booked_seats: u32,
}

impl EventRecord {
    /// Create a record, validating the capacity invariant.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation`] if `booked_seats > total_seats`.
    pub fn new(
        id: EventId,
        name: impl Into<String>,
        total_seats: u32,
        booked_seats: u32,
    ) -> Result<Self, InvariantViolation> {
        let record = Self {
            id,
            name: name.into(),
            total_seats,
            booked_seats,
        };
        record.check_invariant()?;
        Ok(record)
    }

    /// Event identifier
    #[must_use]
    pub const fn id(&self) -> EventId {
        self.id
    }

    /// Display label
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capacity ceiling
    #[must_use]
    pub const fn total_seats(&self) -> u32 {
        self.total_seats
    }

    /// Seats currently booked
    #[must_use]
    pub const fn booked_seats(&self) -> u32 {
        self.booked_seats
    }

    /// Seats still available (`total_seats - booked_seats`)
    #[must_use]
    pub const fn available_seats(&self) -> u32 {
        self.total_seats.saturating_sub(self.booked_seats)
    }

    /// Whether a `book` could currently succeed
    #[must_use]
    pub const fn can_book(&self) -> bool {
        self.available_seats() > 0
    }

    /// Whether a `cancel` could currently succeed
    #[must_use]
    pub const fn can_cancel(&self) -> bool {
        self.booked_seats > 0
    }

    /// Copy of this record with a different booked count.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation`] if `booked_seats > total_seats`.
    pub fn with_booked_seats(&self, booked_seats: u32) -> Result<Self, InvariantViolation> {
        Self::new(self.id, self.name.clone(), self.total_seats, booked_seats)
    }

    /// Check `booked_seats <= total_seats`.
    ///
    /// Records that arrive through deserialization skip [`EventRecord::new`],
    /// so anything consuming feed data must call this.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation`] describing the out-of-range counter.
    pub const fn check_invariant(&self) -> Result<(), InvariantViolation> {
        if self.booked_seats > self.total_seats {
            return Err(InvariantViolation {
                event_id: self.id,
                total_seats: self.total_seats,
                booked_seats: self.booked_seats,
            });
        }
        Ok(())
    }

    /// Same record with a new booked count; the caller has checked the bound.
    pub(crate) fn with_booked_unchecked(&self, booked_seats: u32) -> Self {
        Self {
            booked_seats,
            ..self.clone()
        }
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}/{} booked, {} available",
            self.name,
            self.id,
            self.booked_seats,
            self.total_seats,
            self.available_seats()
        )
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Ordered list of event records at one instant.
///
/// Order is the authority's order and is preserved through reconciliation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventorySnapshot(Vec<EventRecord>);

impl InventorySnapshot {
    /// Creates a snapshot from records in display order
    #[must_use]
    pub const fn new(records: Vec<EventRecord>) -> Self {
        Self(records)
    }

    /// Records in order
    #[must_use]
    pub fn records(&self) -> &[EventRecord] {
        &self.0
    }

    /// Look up a record by id
    #[must_use]
    pub fn get(&self, id: EventId) -> Option<&EventRecord> {
        self.0.iter().find(|record| record.id == id)
    }

    /// Iterate over records in order
    pub fn iter(&self) -> std::slice::Iter<'_, EventRecord> {
        self.0.iter()
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the underlying records
    #[must_use]
    pub fn into_records(self) -> Vec<EventRecord> {
        self.0
    }
}

impl FromIterator<EventRecord> for InventorySnapshot {
    fn from_iter<I: IntoIterator<Item = EventRecord>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for InventorySnapshot {
    type Item = EventRecord;
    type IntoIter = std::vec::IntoIter<EventRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a InventorySnapshot {
    type Item = &'a EventRecord;
    type IntoIter = std::slice::Iter<'a, EventRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
