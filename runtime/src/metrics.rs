//! Prometheus metrics for the seat inventory.
//!
//! Collected metrics:
//! - Reservation outcomes (bookings, cancellations, rejections, sink failures)
//! - Reconciliation pulls (successes, feed failures, duration, changed records)
//! - Store size
//!
//! # Example
//!
//! ```rust,no_run
//! use seat_inventory_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! // GET http://0.0.0.0:9090/metrics
//! # Ok(())
//! # }
//! ```

use crate::store::ReconcileReport;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use seat_inventory_core::SeatAction;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Histogram buckets for pull durations, in seconds.
const SYNC_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// The exporter could not be built or could not bind its listener
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// `start` was called outside a Tokio runtime
    #[error("Metrics exporter needs a Tokio runtime")]
    NoRuntime,
}

/// Prometheus scrape endpoint for the inventory metrics.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a server that will listen on `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Listen address
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bind the listener, install the global recorder and spawn the exporter
    /// on the current Tokio runtime.
    ///
    /// If another recorder is already installed in this process, the
    /// listener is dropped, the existing recorder keeps collecting and
    /// [`MetricsServer::render`] returns `None`.
    ///
    /// # Errors
    ///
    /// - [`MetricsError::NoRuntime`] outside a Tokio runtime
    /// - [`MetricsError::Build`] if the listener cannot bind
    pub fn start(&mut self) -> Result<(), MetricsError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| MetricsError::NoRuntime)?;

        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(Matcher::Suffix("duration_seconds".to_string()), SYNC_BUCKETS)
            .and_then(PrometheusBuilder::build)
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();

        let installed = metrics::set_global_recorder(recorder).is_ok();
        register_metrics();
        if !installed {
            tracing::warn!("Metrics recorder already installed, not serving a second endpoint");
            return Ok(());
        }

        runtime.spawn(async move {
            // `ExporterError` implements neither `Debug` nor `Display` in 0.15.
            if exporter.await.is_err() {
                tracing::error!("Metrics exporter stopped");
            }
        });
        tracing::info!(addr = %self.addr, "Serving metrics");
        self.handle = Some(handle);
        Ok(())
    }

    /// Current metrics in Prometheus text format.
    ///
    /// `None` unless this instance installed the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    // Reservations
    describe_counter!("inventory_bookings_total", "Seats booked and committed locally");
    describe_counter!(
        "inventory_cancellations_total",
        "Seats released and committed locally"
    );
    describe_counter!(
        "inventory_rejections_total",
        "Book/cancel requests rejected by a seat bound or unknown event"
    );
    describe_counter!(
        "inventory_sink_failures_total",
        "Book/cancel requests that could not reach the authority"
    );

    // Reconciliation
    describe_counter!(
        "inventory_reconciliations_total",
        "Feed pulls applied to the store"
    );
    describe_counter!(
        "inventory_feed_failures_total",
        "Feed pulls that failed or delivered an unusable snapshot"
    );
    describe_counter!(
        "inventory_records_changed_total",
        "Records inserted, updated or removed by reconciliation"
    );
    describe_histogram!(
        "inventory_sync_duration_seconds",
        "Time taken by one feed pull including reconciliation"
    );

    // Store
    describe_gauge!("inventory_events_tracked", "Events currently in the store");
}

/// Reservation outcome recorder.
pub struct ReservationMetrics;

impl ReservationMetrics {
    /// Record a committed book or cancel.
    pub fn record_commit(action: SeatAction) {
        match action {
            SeatAction::Book => counter!("inventory_bookings_total").increment(1),
            SeatAction::Cancel => counter!("inventory_cancellations_total").increment(1),
        }
    }

    /// Record a rejected request.
    pub fn record_rejection() {
        counter!("inventory_rejections_total").increment(1);
    }

    /// Record an unreachable authority.
    pub fn record_sink_failure() {
        counter!("inventory_sink_failures_total").increment(1);
    }
}

/// Reconciliation recorder.
pub struct SyncMetrics;

impl SyncMetrics {
    /// Record an applied pull.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_reconciliation(report: &ReconcileReport, events: usize, duration: Duration) {
        counter!("inventory_reconciliations_total").increment(1);
        let changed = report.inserted + report.updated + report.removed;
        counter!("inventory_records_changed_total").increment(changed as u64);
        histogram!("inventory_sync_duration_seconds").record(duration.as_secs_f64());
        gauge!("inventory_events_tracked").set(events as f64);
    }

    /// Record a failed pull.
    pub fn record_feed_failure(duration: Duration) {
        counter!("inventory_feed_failures_total").increment(1);
        histogram!("inventory_sync_duration_seconds").record(duration.as_secs_f64());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let addr = "127.0.0.1:9090".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.render().is_none());
        assert_eq!(server.addr(), addr);
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let mut server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        assert!(matches!(server.start(), Err(MetricsError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_metrics_server_start_is_repeatable() {
        let mut first = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        let mut second = MetricsServer::new("127.0.0.1:0".parse().unwrap());

        assert!(first.start().is_ok());
        assert!(second.start().is_ok());
        assert!(first.render().is_none() || second.render().is_none());
    }

    #[tokio::test]
    async fn test_inventory_metrics_render() {
        let mut server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        server.start().unwrap();

        ReservationMetrics::record_commit(SeatAction::Book);
        ReservationMetrics::record_commit(SeatAction::Cancel);
        ReservationMetrics::record_rejection();
        SyncMetrics::record_reconciliation(
            &ReconcileReport {
                inserted: 3,
                ..ReconcileReport::default()
            },
            3,
            Duration::from_millis(500),
        );
        SyncMetrics::record_feed_failure(Duration::from_millis(20));

        // Another test may have installed the recorder first
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("inventory_bookings_total"));
            assert!(rendered.contains("inventory_cancellations_total"));
            assert!(rendered.contains("inventory_reconciliations_total"));
            assert!(rendered.contains("inventory_feed_failures_total"));
        }
    }
}
