//! Seat marketplace demo.
//!
//! A terminal stand-in for the presentation layer: renders the store's
//! snapshot, shows the transient booking status and drives the engine.

pub mod config;

use seat_inventory_core::{BookingStatus, EventRecord, InventorySnapshot};
use std::fmt::Write as _;
use std::time::Duration;
use tokio::sync::watch;

pub use config::Config;

/// One line per event with its counts and which actions are enabled.
#[must_use]
pub fn render_row(record: &EventRecord) -> String {
    let book = if record.can_book() { "[Book]" } else { "[----]" };
    let cancel = if record.can_cancel() { "[Cancel]" } else { "[------]" };
    format!(
        "{:>3}  {:<18} total {:>4}  booked {:>4}  available {:>4}  {book} {cancel}",
        record.id(),
        record.name(),
        record.total_seats(),
        record.booked_seats(),
        record.available_seats(),
    )
}

/// Render the whole catalogue, or a placeholder while nothing is loaded.
#[must_use]
pub fn render_snapshot(snapshot: &InventorySnapshot) -> String {
    if snapshot.is_empty() {
        return "  (no events loaded)\n".to_string();
    }
    let mut out = String::new();
    for record in snapshot {
        let _ = writeln!(out, "  {}", render_row(record));
    }
    out
}

/// Print status messages as they change.
///
/// A terminal status is shown for `display` and then cleared, unless a newer
/// status replaced it first. Returns when the engine is dropped.
pub async fn print_status(mut status: watch::Receiver<BookingStatus>, display: Duration) {
    loop {
        let current = *status.borrow_and_update();
        if let Some(message) = current.message() {
            println!("  >> {message}");
        }

        let next = if matches!(current, BookingStatus::Booked | BookingStatus::Cancelled) {
            match tokio::time::timeout(display, status.changed()).await {
                Ok(changed) => changed,
                Err(_) => {
                    tracing::trace!("Status message expired");
                    status.changed().await
                },
            }
        } else {
            status.changed().await
        };

        if next.is_err() {
            break;
        }
    }
}
