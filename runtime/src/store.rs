//! The inventory store: authoritative `id -> EventRecord` map.
//!
//! # Locking
//!
//! ```text
//! RwLock<Inner>                       map-level lock
//!   ├── read   mutate(), get()        many events in parallel
//!   └── write  reconcile(), snapshot() excludes every in-flight mutation
//!
//! Mutex<Slot> (one per event)         per-event critical section
//! ```
//!
//! All critical sections are synchronous. A mutation's bound check and
//! counter change happen under one slot lock with no `.await` in between, so
//! two concurrent `book` calls can never both see the pre-increment state.
//!
//! Updates published by the runtime are sent before the commit's lock is
//! released, so subscribers see them in commit order.

use crate::health::{HealthCheck, HealthStatus};
use parking_lot::{Mutex, RwLock};
use seat_inventory_core::{
    BookingError, EventId, EventRecord, FeedError, InventorySnapshot, InventoryUpdate,
};
use std::collections::{HashMap, HashSet};
use tokio::sync::broadcast;

/// Default capacity of the update broadcast channel.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// One event's committed state plus its commit counter.
#[derive(Debug)]
struct Slot {
    record: EventRecord,
    revision: u64,
}

#[derive(Debug, Default)]
struct Inner {
    order: Vec<EventId>,
    slots: HashMap<EventId, Mutex<Slot>>,
}

/// Outcome of a [`InventoryStore::reconcile`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records only present in the new snapshot
    pub inserted: usize,
    /// Records whose contents changed
    pub updated: usize,
    /// Records absent from the new snapshot
    pub removed: usize,
    /// Records identical before and after
    pub unchanged: usize,
}

impl ReconcileReport {
    /// True if the pass changed nothing
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.removed == 0
    }
}

/// Authoritative per-event seat counters.
///
/// Shared as `Arc<InventoryStore>` between the reservation engine, the sync
/// scheduler and any read-only presentation adapter.
///
/// # Example
///
/// ```ignore
/// let store = InventoryStore::new();
/// store.reconcile(feed.fetch_snapshot().await?)?;
///
/// let record = store.mutate(event_id, |current| SeatAction::Book.apply(current))?;
/// ```
#[derive(Debug)]
pub struct InventoryStore {
    inner: RwLock<Inner>,
    updates: broadcast::Sender<InventoryUpdate>,
}

impl Default for InventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryStore {
    /// Create an empty store.
    ///
    /// Records only ever arrive through [`InventoryStore::reconcile`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_broadcast_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    /// Create an empty store with a custom update channel capacity.
    ///
    /// Slow subscribers that fall more than `capacity` updates behind
    /// receive `RecvError::Lagged` and should re-read [`InventoryStore::snapshot`].
    #[must_use]
    pub fn with_broadcast_capacity(capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity);
        Self {
            inner: RwLock::new(Inner::default()),
            updates,
        }
    }

    /// Current record for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::EventNotFound`] if `id` is not in the store.
    pub fn get(&self, id: EventId) -> Result<EventRecord, BookingError> {
        let inner = self.inner.read();
        inner
            .slots
            .get(&id)
            .map(|slot| slot.lock().record.clone())
            .ok_or(BookingError::EventNotFound(id))
    }

    /// Commit counter for `id`; increases whenever the record changes.
    #[must_use]
    pub fn revision(&self, id: EventId) -> Option<u64> {
        let inner = self.inner.read();
        inner.slots.get(&id).map(|slot| slot.lock().revision)
    }

    /// Number of events in the store
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    /// Whether the store holds no events
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().order.is_empty()
    }

    /// Consistent copy of every record, in feed order.
    ///
    /// Takes the map's write lock so no mutation on any event is in flight
    /// while the copy is made.
    #[must_use]
    pub fn snapshot(&self) -> InventorySnapshot {
        let inner = self.inner.write();
        inner
            .order
            .iter()
            .filter_map(|id| inner.slots.get(id))
            .map(|slot| slot.lock().record.clone())
            .collect()
    }

    /// Apply `f` to the record for `id` inside its critical section.
    ///
    /// `f` receives the current record and returns either the next record or
    /// a rejection. A rejection leaves the record untouched. Mutations of the
    /// same event are serialized; mutations of different events run in
    /// parallel.
    ///
    /// # Errors
    ///
    /// - [`BookingError::EventNotFound`] if `id` is not in the store
    /// - whatever rejection `f` returns
    ///
    /// # Panics
    ///
    /// Panics if `f` returns a record that breaks `booked_seats <= total_seats`
    /// or changes the record's id, name or capacity. That is a defect in the
    /// mutation, not a runtime condition.
    pub fn mutate<F>(&self, id: EventId, f: F) -> Result<EventRecord, BookingError>
    where
        F: FnOnce(&EventRecord) -> Result<EventRecord, BookingError>,
    {
        self.commit(id, f, |_| None)
    }

    /// [`InventoryStore::mutate`], then broadcast `update(&committed)` while
    /// the slot is still locked. Nothing is sent on rejection.
    pub(crate) fn mutate_and_publish<F, U>(
        &self,
        id: EventId,
        f: F,
        update: U,
    ) -> Result<EventRecord, BookingError>
    where
        F: FnOnce(&EventRecord) -> Result<EventRecord, BookingError>,
        U: FnOnce(&EventRecord) -> InventoryUpdate,
    {
        self.commit(id, f, |committed| Some(update(committed)))
    }

    fn commit<F, U>(&self, id: EventId, f: F, update: U) -> Result<EventRecord, BookingError>
    where
        F: FnOnce(&EventRecord) -> Result<EventRecord, BookingError>,
        U: FnOnce(&EventRecord) -> Option<InventoryUpdate>,
    {
        let inner = self.inner.read();
        let slot = inner.slots.get(&id).ok_or(BookingError::EventNotFound(id))?;
        let mut slot = slot.lock();

        let next = f(&slot.record)?;
        assert_commit_allowed(&slot.record, &next);

        if next != slot.record {
            slot.record = next.clone();
            slot.revision += 1;
        }
        tracing::debug!(
            event_id = %id,
            booked_seats = next.booked_seats(),
            total_seats = next.total_seats(),
            revision = slot.revision,
            "Committed mutation"
        );
        if let Some(update) = update(&next) {
            self.publish(update);
        }
        Ok(next)
    }

    /// Replace the store's contents with `snapshot` in one atomic pass.
    ///
    /// Records present in both are overwritten (last write wins), records
    /// missing from `snapshot` are removed, new ones are inserted, and the
    /// store adopts the snapshot's order. Records that are already identical
    /// keep their revision, so reconciling an unchanged snapshot is a no-op.
    ///
    /// The snapshot is validated before anything is touched.
    ///
    /// # Errors
    ///
    /// - [`FeedError::InvalidRecord`] if any record breaks the invariant
    /// - [`FeedError::DuplicateEvent`] if an id appears twice
    ///
    /// The store is unchanged on error.
    pub fn reconcile(&self, snapshot: InventorySnapshot) -> Result<ReconcileReport, FeedError> {
        self.replace_all(snapshot, false)
    }

    /// [`InventoryStore::reconcile`], then broadcast the new contents as
    /// [`InventoryUpdate::Reconciled`] before the map lock is released.
    pub(crate) fn reconcile_and_publish(
        &self,
        snapshot: InventorySnapshot,
    ) -> Result<ReconcileReport, FeedError> {
        self.replace_all(snapshot, true)
    }

    fn replace_all(
        &self,
        snapshot: InventorySnapshot,
        publish: bool,
    ) -> Result<ReconcileReport, FeedError> {
        validate_snapshot(&snapshot)?;
        let applied = publish.then(|| snapshot.clone());

        let mut inner = self.inner.write();
        let mut report = ReconcileReport::default();
        let mut order = Vec::with_capacity(snapshot.len());
        let mut slots = HashMap::with_capacity(snapshot.len());

        for record in snapshot {
            let id = record.id();
            let slot = match inner.slots.remove(&id) {
                Some(existing) => {
                    let mut slot = existing.into_inner();
                    if slot.record == record {
                        report.unchanged += 1;
                    } else {
                        slot.record = record;
                        slot.revision += 1;
                        report.updated += 1;
                    }
                    slot
                },
                None => {
                    report.inserted += 1;
                    Slot {
                        record,
                        revision: 0,
                    }
                },
            };
            order.push(id);
            slots.insert(id, Mutex::new(slot));
        }

        report.removed = inner.slots.len();
        inner.order = order;
        inner.slots = slots;
        if let Some(applied) = applied {
            self.publish(InventoryUpdate::Reconciled(applied));
        }
        drop(inner);

        tracing::debug!(
            inserted = report.inserted,
            updated = report.updated,
            removed = report.removed,
            unchanged = report.unchanged,
            "Reconciled inventory"
        );
        Ok(report)
    }

    /// Subscribe to committed mutations and applied pulls.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<InventoryUpdate> {
        self.updates.subscribe()
    }

    /// Degraded until the first pull has populated the store.
    #[must_use]
    pub fn health(&self) -> HealthCheck {
        let events = self.len();
        if events == 0 {
            HealthCheck::new("inventory_store", HealthStatus::Degraded)
                .with_message("No events loaded yet")
                .with_metadata("events", events)
        } else {
            HealthCheck::new("inventory_store", HealthStatus::Healthy).with_metadata("events", events)
        }
    }

    fn publish(&self, update: InventoryUpdate) {
        if self.updates.send(update).is_err() {
            tracing::trace!("No inventory subscribers");
        }
    }
}

fn validate_snapshot(snapshot: &InventorySnapshot) -> Result<(), FeedError> {
    let mut seen = HashSet::with_capacity(snapshot.len());
    for record in snapshot {
        record.check_invariant()?;
        if !seen.insert(record.id()) {
            return Err(FeedError::DuplicateEvent(record.id()));
        }
    }
    Ok(())
}

#[allow(clippy::panic)] // Invariant breach inside the critical section is a defect
fn assert_commit_allowed(current: &EventRecord, next: &EventRecord) {
    if let Err(violation) = next.check_invariant() {
        panic!("seat invariant broken inside critical section: {violation}");
    }
    if next.id() != current.id()
        || next.name() != current.name()
        || next.total_seats() != current.total_seats()
    {
        panic!(
            "mutation of event {} changed immutable fields",
            current.id()
        );
    }
}
