// ── Domain model ──
//
// Wire types come straight from sentinel-api; the only client-derived
// entity is the PPS time-series point.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

pub use sentinel_api::types::{Alert, AlertsSnapshot, MetricsSnapshot, Severity};
pub use sentinel_api::websocket::ConnectionStatus;

/// One sample of the packets-per-second history.
///
/// `time` is the wall clock when the metrics event was applied; the sensor
/// does not timestamp its metrics ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub time: DateTime<Utc>,
    pub pps: f64,
}

impl TimeSeriesPoint {
    /// Local `HH:MM:SS` label for chart axes.
    pub fn display_time(&self) -> String {
        self.time.with_timezone(&Local).format("%H:%M:%S").to_string()
    }
}
