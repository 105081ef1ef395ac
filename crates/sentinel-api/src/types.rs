//! Wire types shared by the live stream and the REST snapshot endpoints.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ── MetricsSnapshot ──────────────────────────────────────────────────

/// Point-in-time traffic counters computed by the sensor.
///
/// Each snapshot replaces the previous one wholesale; counters are never
/// merged client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_packets: u64,

    #[serde(default)]
    pub packets_per_protocol: HashMap<String, u64>,

    #[serde(default)]
    pub packets_per_source_ip: HashMap<String, u64>,

    #[serde(default)]
    pub packets_per_destination_ip: HashMap<String, u64>,

    pub packets_per_second: f64,
}

impl MetricsSnapshot {
    /// Protocol counts sorted by descending packet count, then name.
    pub fn protocols_by_volume(&self) -> Vec<(&str, u64)> {
        by_volume(&self.packets_per_protocol)
    }

    pub fn sources_by_volume(&self) -> Vec<(&str, u64)> {
        by_volume(&self.packets_per_source_ip)
    }

    pub fn destinations_by_volume(&self) -> Vec<(&str, u64)> {
        by_volume(&self.packets_per_destination_ip)
    }
}

fn by_volume(counts: &HashMap<String, u64>) -> Vec<(&str, u64)> {
    let mut rows: Vec<(&str, u64)> = counts
        .iter()
        .map(|(name, count)| (name.as_str(), *count))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    rows
}

// ── Severity ─────────────────────────────────────────────────────────

/// Alert severity. Unknown strings are kept verbatim in [`Severity::Other`]
/// so a round trip never loses what the sensor sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    High,
    Medium,
    Low,
    Other(String),
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.as_str() {
            "HIGH" => Self::High,
            "MEDIUM" => Self::Medium,
            "LOW" => Self::Low,
            _ => Self::Other(value),
        }
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        match value {
            Severity::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Alert ────────────────────────────────────────────────────────────

/// A detection alert as enriched and stored by the sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Sensor-assigned unique id; the client's dedup key.
    pub id: String,

    /// Detector tag, e.g. `"PORT_SCAN"`, `"HIGH_TRAFFIC"`.
    #[serde(rename = "type")]
    pub alert_type: String,

    #[serde(default)]
    pub source_ip: Option<String>,

    pub severity: Severity,

    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

// ── AlertsSnapshot ───────────────────────────────────────────────────

/// Body of `GET /alerts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertsSnapshot {
    pub total_alerts: u64,

    #[serde(default)]
    pub recent_alerts: Vec<Alert>,

    #[serde(default)]
    pub alerts_by_type: HashMap<String, u64>,
}
