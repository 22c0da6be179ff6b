//! Reservation engine: single-seat `book` / `cancel`.
//!
//! Every call runs the same pipeline:
//!
//! 1. status → `Processing`
//! 2. fail fast with `EventNotFound` if the store does not know the event
//! 3. ask the authority's [`MutationSink`] to apply the action (the only
//!    suspension point)
//! 4. on acceptance, commit locally with the guarded [`SeatAction::apply`]
//!    step and broadcast the committed record; if the local view is too
//!    stale for that step, adopt the authority's count instead
//! 5. request a reconciliation pull whenever the authority answered, so the
//!    store converges on its state
//! 6. set the terminal status
//!
//! A sink failure or rejection leaves the store untouched.

use crate::metrics::ReservationMetrics;
use crate::scheduler::SyncTrigger;
use crate::store::InventoryStore;
use seat_inventory_core::{
    BookingError, BookingStatus, EventId, EventRecord, InventoryUpdate, MutationSink, SeatAction,
    SinkError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Translates user intents into validated counter mutations.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct ReservationEngine {
    store: Arc<InventoryStore>,
    sink: Arc<dyn MutationSink>,
    sync: Option<SyncTrigger>,
    status: watch::Sender<BookingStatus>,
    in_flight: AtomicUsize,
}

impl ReservationEngine {
    /// Create an engine over `store` that forwards mutations to `sink`.
    #[must_use]
    pub fn new(store: Arc<InventoryStore>, sink: Arc<dyn MutationSink>) -> Self {
        let (status, _) = watch::channel(BookingStatus::Idle);
        Self {
            store,
            sink,
            sync: None,
            status,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Request a reconciliation pull after every answer from the authority.
    #[must_use]
    pub fn with_sync_trigger(mut self, trigger: SyncTrigger) -> Self {
        self.sync = Some(trigger);
        self
    }

    /// The store this engine commits to
    #[must_use]
    pub const fn store(&self) -> &Arc<InventoryStore> {
        &self.store
    }

    /// Watch the transient status signal.
    ///
    /// The signal is shared by every concurrent call. It reads `Processing`
    /// while any call is in flight, a success sets `Booked`/`Cancelled` for
    /// the call that finished last, and a failure only returns it to `Idle`
    /// once no other call is in flight.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<BookingStatus> {
        self.status.subscribe()
    }

    /// Reserve one seat for `event_id`.
    ///
    /// # Errors
    ///
    /// - [`BookingError::EventNotFound`] if the event is not in the store
    /// - [`BookingError::CapacityExhausted`] if every seat is booked
    /// - [`BookingError::SinkUnavailable`] if the authority is unreachable
    pub async fn book(&self, event_id: EventId) -> Result<EventRecord, BookingError> {
        self.execute(event_id, SeatAction::Book).await
    }

    /// Release one seat for `event_id`.
    ///
    /// # Errors
    ///
    /// - [`BookingError::EventNotFound`] if the event is not in the store
    /// - [`BookingError::NothingToCancel`] if no seat is booked
    /// - [`BookingError::SinkUnavailable`] if the authority is unreachable
    pub async fn cancel(&self, event_id: EventId) -> Result<EventRecord, BookingError> {
        self.execute(event_id, SeatAction::Cancel).await
    }

    /// Run `action` against `event_id`.
    ///
    /// # Errors
    ///
    /// See [`ReservationEngine::book`] and [`ReservationEngine::cancel`].
    #[tracing::instrument(skip(self, event_id, action), fields(event_id = %event_id, action = %action))]
    pub async fn execute(
        &self,
        event_id: EventId,
        action: SeatAction,
    ) -> Result<EventRecord, BookingError> {
        let result = {
            let _in_flight = InFlight::enter(&self.in_flight);
            self.status.send_replace(BookingStatus::Processing);
            self.run(event_id, action).await
        };

        match &result {
            Ok(record) => {
                ReservationMetrics::record_commit(action);
                tracing::info!(
                    booked_seats = record.booked_seats(),
                    available_seats = record.available_seats(),
                    "Seat action committed"
                );
                self.status.send_replace(BookingStatus::completed(action));
            },
            Err(error) => {
                if error.is_rejection() {
                    ReservationMetrics::record_rejection();
                    tracing::debug!(%error, "Seat action rejected");
                } else {
                    tracing::warn!(%error, "Seat action failed");
                }
                if self.in_flight.load(Ordering::Acquire) == 0 {
                    self.status.send_replace(BookingStatus::Idle);
                }
            },
        }

        result
    }

    async fn run(&self, event_id: EventId, action: SeatAction) -> Result<EventRecord, BookingError> {
        self.store.get(event_id)?;

        let authority = match self.sink.apply(event_id, action).await {
            Ok(record) => record,
            Err(SinkError::Unavailable(reason)) => {
                ReservationMetrics::record_sink_failure();
                return Err(BookingError::SinkUnavailable(reason));
            },
            Err(SinkError::Rejected(error)) => {
                // A rejection the store would not have predicted means it is stale
                self.request_sync();
                return Err(error);
            },
        };
        tracing::debug!(
            authority_booked_seats = authority.booked_seats(),
            "Authority accepted mutation"
        );

        let committed = self.store.mutate_and_publish(
            event_id,
            |current| {
                Ok(action
                    .apply(current)
                    .unwrap_or_else(|_| adopt_authority(current, &authority)))
            },
            |committed| InventoryUpdate::committed(action, committed.clone()),
        );
        self.request_sync();
        committed
    }

    fn request_sync(&self) {
        if let Some(trigger) = &self.sync {
            trigger.request();
        }
    }
}

/// The local record carrying the authority's booked count.
///
/// Used when the authority accepted a step the local view would reject.
/// Falls back to `current` if the two disagree on anything but the count;
/// the follow-up pull settles that.
fn adopt_authority(current: &EventRecord, authority: &EventRecord) -> EventRecord {
    let same_event = current.id() == authority.id()
        && current.name() == authority.name()
        && current.total_seats() == authority.total_seats();
    if !same_event {
        tracing::warn!(
            event_id = %current.id(),
            "Authority record differs beyond the seat count, keeping local view"
        );
        return current.clone();
    }
    tracing::debug!(
        event_id = %current.id(),
        local_booked_seats = current.booked_seats(),
        authority_booked_seats = authority.booked_seats(),
        "Stale local view, adopting authority count"
    );
    current
        .with_booked_seats(authority.booked_seats())
        .unwrap_or_else(|_| current.clone())
}

/// Counts a call as in flight until dropped, including on cancellation.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for ReservationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservationEngine")
            .field("status", &*self.status.borrow())
            .field("sync", &self.sync.is_some())
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
