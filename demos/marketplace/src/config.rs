//! Configuration for the marketplace demo.
//!
//! Loads configuration from environment variables with sensible defaults.

use seat_inventory_runtime::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Demo configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Sync loop configuration
    pub sync: SyncConfig,
    /// Simulated authority configuration
    pub authority: AuthorityConfig,
    /// Metrics configuration
    pub metrics: MetricsConfig,
    /// How long a terminal status message stays visible, in milliseconds
    pub status_display_ms: u64,
}

/// Sync loop configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between reconciliation pulls (default: 30)
    pub interval_secs: u64,
    /// Seconds to wait for the loop on shutdown (default: 5)
    pub shutdown_timeout_secs: u64,
    /// Consecutive failures before the loop reports degraded (default: 3)
    pub degraded_after: u32,
}

/// Simulated authority configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityConfig {
    /// Snapshot fetch latency in milliseconds (default: 500)
    pub feed_latency_ms: u64,
    /// Mutation latency in milliseconds (default: 400)
    pub sink_latency_ms: u64,
}

/// Metrics configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Metrics host (default: 127.0.0.1)
    pub host: IpAddr,
    /// Metrics port (default: 9090)
    pub port: u16,
}

impl Config {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse().ok());

        Self {
            sync: SyncConfig {
                interval_secs: parsed("SYNC_INTERVAL_SECS").unwrap_or(30),
                shutdown_timeout_secs: parsed("SHUTDOWN_TIMEOUT_SECS").unwrap_or(5),
                degraded_after: lookup("SYNC_DEGRADED_AFTER")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(3),
            },
            authority: AuthorityConfig {
                feed_latency_ms: parsed("FEED_LATENCY_MS").unwrap_or(500),
                sink_latency_ms: parsed("SINK_LATENCY_MS").unwrap_or(400),
            },
            metrics: MetricsConfig {
                host: lookup("METRICS_HOST")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
                port: lookup("METRICS_PORT")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(9090),
            },
            status_display_ms: parsed("STATUS_DISPLAY_MS").unwrap_or(2000),
        }
    }

    /// Scheduler configuration derived from the sync settings
    #[must_use]
    pub const fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.sync.interval_secs),
            stop_timeout: Duration::from_secs(self.sync.shutdown_timeout_secs),
            degraded_after: self.sync.degraded_after,
        }
    }

    /// Simulated fetch latency
    #[must_use]
    pub const fn feed_latency(&self) -> Duration {
        Duration::from_millis(self.authority.feed_latency_ms)
    }

    /// Simulated mutation latency
    #[must_use]
    pub const fn sink_latency(&self) -> Duration {
        Duration::from_millis(self.authority.sink_latency_ms)
    }

    /// Metrics address
    #[must_use]
    pub const fn metrics_addr(&self) -> SocketAddr {
        SocketAddr::new(self.metrics.host, self.metrics.port)
    }

    /// How long a status message stays up
    #[must_use]
    pub const fn status_display(&self) -> Duration {
        Duration::from_millis(self.status_display_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
