//! Component health for the store and the sync loop.

use chrono::{DateTime, Utc};
use std::fmt;

/// Health level, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    /// Working normally
    Healthy,
    /// Serving possibly outdated data
    Degraded,
    /// Not serving
    Unhealthy,
}

impl HealthStatus {
    /// True for [`HealthStatus::Healthy`]
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        })
    }
}

/// One component's health with an optional reason and key/value details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    /// Component name, e.g. `sync_scheduler`
    pub component: &'static str,
    /// Current level
    pub status: HealthStatus,
    /// Why the component is not healthy
    pub message: Option<String>,
    /// Counters and timestamps behind the status
    pub metadata: Vec<(&'static str, String)>,
}

impl HealthCheck {
    /// A check at `status` with no message.
    #[must_use]
    pub const fn new(component: &'static str, status: HealthStatus) -> Self {
        Self {
            component,
            status,
            message: None,
            metadata: Vec::new(),
        }
    }

    /// Attach a reason.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach a detail.
    #[must_use]
    pub fn with_metadata(mut self, key: &'static str, value: impl ToString) -> Self {
        self.metadata.push((key, value.to_string()));
        self
    }

    /// Look up a detail by key.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find_map(|(k, v)| (*k == key).then_some(v.as_str()))
    }
}

/// Overall health: the worst of its checks.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Worst status across `checks`; healthy when there are none
    pub status: HealthStatus,
    /// Individual checks, in the order given
    pub checks: Vec<HealthCheck>,
    /// When the report was assembled
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    /// Assemble a report from component checks.
    #[must_use]
    pub fn new(checks: Vec<HealthCheck>) -> Self {
        let status = checks
            .iter()
            .map(|check| check.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);
        Self {
            status,
            checks,
            timestamp: Utc::now(),
        }
    }
}
