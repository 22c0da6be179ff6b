//! Feed that replays a script of responses.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use seat_inventory_core::{FeedError, InventorySnapshot, SeatFeed};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct GateInner {
    started: Notify,
    released: Notify,
}

/// Holds one fetch after it has captured its response.
///
/// Lets a test interleave a mutation between the moment a snapshot is taken
/// and the moment it reaches the store.
#[derive(Debug, Clone)]
pub struct FeedGate {
    inner: Arc<GateInner>,
}

impl FeedGate {
    /// Wait until a fetch is parked at the gate.
    pub async fn wait_started(&self) {
        self.inner.started.notified().await;
    }

    /// Let the parked fetch return.
    pub fn release(&self) {
        self.inner.released.notify_one();
    }
}

#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<Result<InventorySnapshot, FeedError>>,
    gate: Option<FeedGate>,
}

/// Feed answering from a queue.
///
/// Each fetch pops the next response; an empty queue answers
/// `Unavailable`. Clones share the queue.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFeed {
    script: Arc<Mutex<Script>>,
    fetches: Arc<AtomicUsize>,
}

impl ScriptedFeed {
    /// Create a feed with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn push_ok(&self, snapshot: InventorySnapshot) {
        self.script.lock().responses.push_back(Ok(snapshot));
    }

    /// Queue a failure.
    pub fn push_err(&self, error: FeedError) {
        self.script.lock().responses.push_back(Err(error));
    }

    /// Park the next fetch at a gate until [`FeedGate::release`].
    #[must_use]
    pub fn hold(&self) -> FeedGate {
        let gate = FeedGate {
            inner: Arc::new(GateInner::default()),
        };
        self.script.lock().gate = Some(gate.clone());
        gate
    }

    /// Number of fetches served
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Responses still queued
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().responses.len()
    }
}

impl SeatFeed for ScriptedFeed {
    fn fetch_snapshot(&self) -> BoxFuture<'_, Result<InventorySnapshot, FeedError>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let (response, gate) = {
            let mut script = self.script.lock();
            let response = script
                .responses
                .pop_front()
                .unwrap_or_else(|| Err(FeedError::Unavailable("script exhausted".into())));
            (response, script.gate.take())
        };

        Box::pin(async move {
            if let Some(gate) = gate {
                gate.inner.started.notify_one();
                gate.inner.released.notified().await;
            }
            response
        })
    }
}
