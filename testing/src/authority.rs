//! In-process authority backing both ports.

use futures::future::BoxFuture;
use seat_inventory_core::{
    EventId, EventRecord, FeedError, InventorySnapshot, MutationSink, SeatAction, SeatFeed,
    SinkError,
};
use seat_inventory_runtime::InventoryStore;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct Inner {
    records: InventoryStore,
    fetch_latency: Duration,
    apply_latency: Duration,
    offline: AtomicBool,
    fetches: AtomicUsize,
    applies: AtomicUsize,
}

/// Authority kept in memory.
///
/// Applies mutations with the same guarded step the local store uses, so a
/// rejection here matches what the engine would decide locally. Clones share
/// state.
///
/// # Example
///
/// ```
/// use seat_inventory_testing::{fixtures, mocks::InMemoryAuthority};
/// use seat_inventory_core::EventId;
///
/// let authority = InMemoryAuthority::new(fixtures::sample_events());
/// assert_eq!(authority.record(EventId::new(1)).map(|r| r.booked_seats()), Some(40));
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryAuthority {
    inner: Arc<Inner>,
}

impl InMemoryAuthority {
    /// Create an authority holding `initial` with zero latency.
    ///
    /// # Panics
    ///
    /// Panics if `initial` holds a duplicate id or a record over capacity.
    #[must_use]
    pub fn new(initial: InventorySnapshot) -> Self {
        Self::with_latency(initial, Duration::ZERO, Duration::ZERO)
    }

    /// Create an authority that sleeps before answering.
    ///
    /// # Panics
    ///
    /// Panics if `initial` holds a duplicate id or a record over capacity.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_latency(
        initial: InventorySnapshot,
        fetch_latency: Duration,
        apply_latency: Duration,
    ) -> Self {
        let records = InventoryStore::new();
        records
            .reconcile(initial)
            .expect("initial authority snapshot is valid");

        Self {
            inner: Arc::new(Inner {
                records,
                fetch_latency,
                apply_latency,
                offline: AtomicBool::new(false),
                fetches: AtomicUsize::new(0),
                applies: AtomicUsize::new(0),
            }),
        }
    }

    /// Make every subsequent call fail with `Unavailable` (or recover).
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// The authority's current record for `id`
    #[must_use]
    pub fn record(&self, id: EventId) -> Option<EventRecord> {
        self.inner.records.get(id).ok()
    }

    /// The authority's full current state
    #[must_use]
    pub fn snapshot(&self) -> InventorySnapshot {
        self.inner.records.snapshot()
    }

    /// Replace the authority's state, as another client of it would.
    ///
    /// # Errors
    ///
    /// Returns the validation error if `snapshot` is unusable.
    pub fn replace(&self, snapshot: InventorySnapshot) -> Result<(), FeedError> {
        self.inner.records.reconcile(snapshot).map(|_| ())
    }

    /// Set one event's booked count, as another client would.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidRecord`] if `booked` exceeds capacity.
    pub fn set_booked(&self, id: EventId, booked: u32) -> Result<(), FeedError> {
        let records = self
            .snapshot()
            .into_iter()
            .map(|record| {
                if record.id() == id {
                    record.with_booked_seats(booked)
                } else {
                    Ok(record)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.replace(InventorySnapshot::new(records))
    }

    /// Number of `fetch_snapshot` calls received
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Number of `apply` calls received
    #[must_use]
    pub fn apply_count(&self) -> usize {
        self.inner.applies.load(Ordering::SeqCst)
    }

    fn is_offline(&self) -> bool {
        self.inner.offline.load(Ordering::SeqCst)
    }
}

async fn delay(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

impl SeatFeed for InMemoryAuthority {
    fn fetch_snapshot(&self) -> BoxFuture<'_, Result<InventorySnapshot, FeedError>> {
        Box::pin(async move {
            self.inner.fetches.fetch_add(1, Ordering::SeqCst);
            if self.is_offline() {
                return Err(FeedError::Unavailable("authority offline".into()));
            }
            let snapshot = self.inner.records.snapshot();
            delay(self.inner.fetch_latency).await;
            tracing::trace!(events = snapshot.len(), "Authority served snapshot");
            Ok(snapshot)
        })
    }
}

impl MutationSink for InMemoryAuthority {
    fn apply(
        &self,
        event_id: EventId,
        action: SeatAction,
    ) -> BoxFuture<'_, Result<EventRecord, SinkError>> {
        Box::pin(async move {
            self.inner.applies.fetch_add(1, Ordering::SeqCst);
            if self.is_offline() {
                return Err(SinkError::Unavailable("authority offline".into()));
            }
            delay(self.inner.apply_latency).await;
            self.inner
                .records
                .mutate(event_id, |current| action.apply(current))
                .map_err(SinkError::Rejected)
        })
    }
}
