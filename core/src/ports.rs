//! Ports to the external authority.
//!
//! The engine never talks to a transport directly. It consumes a
//! [`SeatFeed`] for full snapshots and a [`MutationSink`] for single-seat
//! mutations. Both calls carry non-zero, bounded latency and are the only
//! points where a caller yields.
//!
//! # Implementations
//!
//! - `InMemoryAuthority` in `seat-inventory-testing`: in-process authority
//!   with configurable latency and an offline switch
//! - `ScriptedFeed` in `seat-inventory-testing`: replays queued responses,
//!   optionally held at a gate to stage races
//!
//! Both traits return boxed futures so they stay object-safe and can be
//! shared as `Arc<dyn SeatFeed>` / `Arc<dyn MutationSink>`.

use crate::action::SeatAction;
use crate::error::{FeedError, SinkError};
use crate::types::{EventId, EventRecord, InventorySnapshot};
use futures::future::BoxFuture;

/// Source of full inventory snapshots.
///
/// There is no delta form: every pull returns the complete list and the
/// store replaces its working copy wholesale.
pub trait SeatFeed: Send + Sync {
    /// Fetch the authority's current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Unavailable`] if the authority cannot be reached.
    fn fetch_snapshot(&self) -> BoxFuture<'_, Result<InventorySnapshot, FeedError>>;
}

/// Authority-side executor for single-seat mutations.
///
/// Implementations apply the same guarded step as
/// [`SeatAction::apply`] and return the authority's updated record.
pub trait MutationSink: Send + Sync {
    /// Apply `action` to `event_id` on the authority.
    ///
    /// # Errors
    ///
    /// - [`SinkError::Unavailable`] if the authority cannot be reached
    /// - [`SinkError::Rejected`] if the authority refused the mutation
    fn apply(
        &self,
        event_id: EventId,
        action: SeatAction,
    ) -> BoxFuture<'_, Result<EventRecord, SinkError>>;
}
