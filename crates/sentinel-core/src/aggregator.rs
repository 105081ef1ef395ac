// ── Rolling aggregator ──
//
// Folds decoded stream events into bounded, display-ready state. All
// mutation goes through `apply`; readers get immutable snapshots.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, trace};

use sentinel_api::event::{DecodeError, Event, decode};

use crate::model::{Alert, AlertsSnapshot, MetricsSnapshot, TimeSeriesPoint};
use crate::rolling::RollingWindow;

/// PPS samples retained (one per metrics tick, ~1s each).
pub const PPS_HISTORY_SIZE: usize = 30;

/// Alerts shown in the threat feed.
pub const FEED_SIZE: usize = 20;

/// What an [`Aggregator::apply`] call did.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Metrics snapshot replaced and a PPS sample appended.
    Metrics,
    /// A new alert was logged and counted.
    Alert(Arc<Alert>),
    /// The alert id was already logged; nothing changed.
    DuplicateAlert,
}

/// Derived client-side state for one monitoring session.
#[derive(Debug)]
pub struct Aggregator {
    metrics: Option<Arc<MetricsSnapshot>>,
    pps_history: RollingWindow<TimeSeriesPoint>,
    alerts: Arc<Vec<Arc<Alert>>>,
    seen: HashSet<String>,
    total_alerts: u64,
    feed_size: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::with_limits(PPS_HISTORY_SIZE, FEED_SIZE)
    }

    pub fn with_limits(pps_history: usize, feed_size: usize) -> Self {
        Self {
            metrics: None,
            pps_history: RollingWindow::new(pps_history),
            alerts: Arc::new(Vec::new()),
            seen: HashSet::new(),
            total_alerts: 0,
            feed_size,
        }
    }

    /// Apply one event, stamping PPS samples with the current wall clock.
    pub fn apply(&mut self, event: Event) -> Applied {
        self.apply_at(event, Utc::now())
    }

    /// Apply one event with an explicit display time for PPS samples.
    pub fn apply_at(&mut self, event: Event, now: DateTime<Utc>) -> Applied {
        match event {
            Event::Metrics(m) => {
                let point = TimeSeriesPoint {
                    time: now,
                    pps: m.packets_per_second,
                };
                self.metrics = Some(Arc::new(m));
                self.pps_history.push(point);
                trace!(pps = point.pps, "metrics applied");
                Applied::Metrics
            }
            Event::AlertReceived(alert) => {
                if self.seen.contains(&alert.id) {
                    debug!(id = %alert.id, "duplicate alert ignored");
                    return Applied::DuplicateAlert;
                }
                self.seen.insert(alert.id.clone());
                let alert = Arc::new(alert);
                // Copy-on-write: only clones when a published snapshot still
                // shares the log.
                Arc::make_mut(&mut self.alerts).push(Arc::clone(&alert));
                self.total_alerts += 1;
                debug!(
                    id = %alert.id,
                    alert_type = %alert.alert_type,
                    severity = %alert.severity,
                    "alert accepted"
                );
                Applied::Alert(alert)
            }
        }
    }

    /// Decode and apply a raw stream frame. Undecodable frames leave the
    /// state untouched; the caller decides whether to log and drop.
    pub fn apply_frame(&mut self, raw: &str) -> Result<Applied, DecodeError> {
        let event = decode(raw)?;
        Ok(self.apply(event))
    }

    /// Initial paint from `GET /metrics`.
    pub fn seed_metrics(&mut self, metrics: MetricsSnapshot) -> Applied {
        self.apply(Event::Metrics(metrics))
    }

    /// Initial paint from `GET /alerts`. Returns the newly accepted alerts,
    /// in log order.
    pub fn seed_alerts(&mut self, snapshot: AlertsSnapshot) -> Vec<Arc<Alert>> {
        snapshot
            .recent_alerts
            .into_iter()
            .filter_map(|alert| match self.apply(Event::AlertReceived(alert)) {
                Applied::Alert(a) => Some(a),
                Applied::Metrics | Applied::DuplicateAlert => None,
            })
            .collect()
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn metrics(&self) -> Option<&Arc<MetricsSnapshot>> {
        self.metrics.as_ref()
    }

    pub fn pps_history(&self) -> &RollingWindow<TimeSeriesPoint> {
        &self.pps_history
    }

    pub fn alert_log(&self) -> &[Arc<Alert>] {
        &self.alerts
    }

    pub fn total_alerts(&self) -> u64 {
        self.total_alerts
    }

    pub fn contains_alert(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Point-in-time copy for consumers.
    pub fn snapshot(&self) -> AggregateState {
        AggregateState {
            metrics: self.metrics.clone(),
            pps_history: self.pps_history.to_vec(),
            alerts: Arc::clone(&self.alerts),
            total_alerts: self.total_alerts,
            feed_size: self.feed_size,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

// ── AggregateState ───────────────────────────────────────────────────

/// Immutable view of the aggregator handed to presentation.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateState {
    pub metrics: Option<Arc<MetricsSnapshot>>,
    /// Oldest first.
    pub pps_history: Vec<TimeSeriesPoint>,
    /// Full alert log in arrival order.
    pub alerts: Arc<Vec<Arc<Alert>>>,
    pub total_alerts: u64,
    #[serde(skip)]
    feed_size: usize,
}

impl Default for AggregateState {
    fn default() -> Self {
        Aggregator::new().snapshot()
    }
}

impl AggregateState {
    /// The most recent alerts, newest first.
    pub fn threat_feed(&self) -> impl Iterator<Item = &Arc<Alert>> {
        self.alerts.iter().rev().take(self.feed_size)
    }

    /// Logged alerts counted per detector type, busiest first. Ties keep
    /// first-seen order.
    pub fn alerts_by_type(&self) -> IndexMap<&str, u64> {
        let mut counts: IndexMap<&str, u64> = IndexMap::new();
        for alert in self.alerts.iter() {
            *counts.entry(alert.alert_type.as_str()).or_insert(0) += 1;
        }
        counts.sort_by(|_, a, _, b| b.cmp(a));
        counts
    }

    pub fn latest_pps(&self) -> Option<f64> {
        self.pps_history.last().map(|p| p.pps)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::Severity;

    fn metrics(pps: f64) -> Event {
        Event::Metrics(MetricsSnapshot {
            total_packets: 100,
            packets_per_protocol: HashMap::from([("TCP".to_owned(), 100)]),
            packets_per_source_ip: HashMap::new(),
            packets_per_destination_ip: HashMap::new(),
            packets_per_second: pps,
        })
    }

    fn alert(id: &str, alert_type: &str) -> Event {
        Event::AlertReceived(Alert {
            id: id.to_owned(),
            alert_type: alert_type.to_owned(),
            source_ip: Some("10.0.0.66".to_owned()),
            severity: Severity::High,
            timestamp: 1_700_000_000.0,
        })
    }

    fn pps_values(agg: &Aggregator) -> Vec<f64> {
        agg.pps_history().iter().map(|p| p.pps).collect()
    }

    // ── Metrics path ─────────────────────────────────────────────────

    #[test]
    fn two_metrics_events_keep_arrival_order() {
        let mut agg = Aggregator::new();
        agg.apply(metrics(12.3));
        agg.apply(metrics(15.0));

        assert_eq!(pps_values(&agg), vec![12.3, 15.0]);
        assert!((agg.metrics().unwrap().packets_per_second - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn thirty_first_metrics_event_evicts_the_first() {
        let mut agg = Aggregator::new();
        for i in 1..=31_i32 {
            agg.apply(metrics(f64::from(i)));
        }

        let expected: Vec<f64> = (2..=31_i32).map(f64::from).collect();
        assert_eq!(pps_values(&agg), expected);
    }

    #[test]
    fn pps_window_length_is_bounded() {
        for n in 0..65_i32 {
            let mut agg = Aggregator::new();
            for i in 0..n {
                agg.apply(metrics(f64::from(i)));
            }
            assert_eq!(agg.pps_history().len(), usize::try_from(n).unwrap().min(30));
        }
    }

    #[test]
    fn metrics_snapshot_is_replaced_not_merged() {
        let mut agg = Aggregator::new();
        agg.apply(metrics(1.0));
        agg.apply(Event::Metrics(MetricsSnapshot {
            total_packets: 5,
            packets_per_protocol: HashMap::from([("UDP".to_owned(), 5)]),
            packets_per_source_ip: HashMap::new(),
            packets_per_destination_ip: HashMap::new(),
            packets_per_second: 0.5,
        }));

        let m = agg.metrics().unwrap();
        assert_eq!(m.total_packets, 5);
        assert!(!m.packets_per_protocol.contains_key("TCP"));
    }

    #[test]
    fn pps_point_uses_application_time() {
        let mut agg = Aggregator::new();
        let at = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        agg.apply_at(metrics(7.0), at);

        assert_eq!(agg.pps_history().latest().unwrap().time, at);
    }

    #[test]
    fn malformed_frame_between_metrics_changes_nothing() {
        let frame = |pps: f64| {
            serde_json::json!({
                "event": "metrics",
                "data": {
                    "total_packets": 1,
                    "packets_per_protocol": {},
                    "packets_per_source_ip": {},
                    "packets_per_destination_ip": {},
                    "packets_per_second": pps
                }
            })
            .to_string()
        };

        let mut agg = Aggregator::new();
        agg.apply_frame(&frame(1.5)).unwrap();
        assert!(agg.apply_frame("not json").is_err());
        agg.apply_frame(&frame(2.5)).unwrap();

        assert_eq!(pps_values(&agg), vec![1.5, 2.5]);
        assert!((agg.metrics().unwrap().packets_per_second - 2.5).abs() < f64::EPSILON);
        assert_eq!(agg.total_alerts(), 0);
    }

    // ── Alert path ───────────────────────────────────────────────────

    #[test]
    fn duplicate_alert_is_a_no_op() {
        let mut agg = Aggregator::new();
        assert!(matches!(agg.apply(alert("a1", "PORT_SCAN")), Applied::Alert(_)));
        assert_eq!(agg.apply(alert("a1", "PORT_SCAN")), Applied::DuplicateAlert);

        assert_eq!(agg.alert_log().len(), 1);
        assert_eq!(agg.total_alerts(), 1);
    }

    #[test]
    fn counter_equals_distinct_ids_regardless_of_order() {
        let deliveries = ["a3", "a1", "a3", "a2", "a1", "a1", "a4", "a2"];

        let mut agg = Aggregator::new();
        for id in deliveries {
            agg.apply(alert(id, "PORT_SCAN"));
        }

        assert_eq!(agg.total_alerts(), 4);
        let ids: Vec<&str> = agg.alert_log().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a3", "a1", "a2", "a4"]);
    }

    #[test]
    fn snapshot_is_not_affected_by_later_alerts() {
        let mut agg = Aggregator::new();
        agg.apply(alert("a1", "PORT_SCAN"));
        let before = agg.snapshot();

        agg.apply(alert("a2", "HIGH_TRAFFIC"));

        assert_eq!(before.alerts.len(), 1);
        assert_eq!(agg.snapshot().alerts.len(), 2);
    }

    #[test]
    fn threat_feed_is_last_twenty_newest_first() {
        let mut agg = Aggregator::new();
        for i in 0..25 {
            agg.apply(alert(&format!("a{i}"), "PORT_SCAN"));
        }
        let state = agg.snapshot();

        let feed: Vec<&str> = state.threat_feed().map(|a| a.id.as_str()).collect();
        assert_eq!(feed.len(), 20);
        assert_eq!(feed.first(), Some(&"a24"));
        assert_eq!(feed.last(), Some(&"a5"));
        // Projection leaves the log alone.
        assert_eq!(state.alerts.len(), 25);
    }

    #[test]
    fn alerts_by_type_counts_logged_alerts() {
        let mut agg = Aggregator::new();
        agg.apply(alert("a0", "HIGH_TRAFFIC"));
        agg.apply(alert("a1", "PORT_SCAN"));
        agg.apply(alert("a2", "PORT_SCAN"));
        agg.apply(alert("a2", "PORT_SCAN"));
        agg.apply(alert("a3", "DNS_TUNNEL"));

        let state = agg.snapshot();
        let counts: Vec<(&str, u64)> = state
            .alerts_by_type()
            .into_iter()
            .collect();
        assert_eq!(
            counts,
            vec![("PORT_SCAN", 2), ("HIGH_TRAFFIC", 1), ("DNS_TUNNEL", 1)]
        );
    }

    #[test]
    fn seeded_alerts_deduplicate_against_stream() {
        let mut agg = Aggregator::new();
        agg.apply(alert("a1", "PORT_SCAN"));

        let Event::AlertReceived(a1) = alert("a1", "PORT_SCAN") else {
            unreachable!()
        };
        let Event::AlertReceived(a2) = alert("a2", "HIGH_TRAFFIC") else {
            unreachable!()
        };
        let accepted = agg.seed_alerts(AlertsSnapshot {
            total_alerts: 2,
            recent_alerts: vec![a1, a2],
            alerts_by_type: HashMap::new(),
        });

        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].id, "a2");
        assert_eq!(agg.total_alerts(), 2);
    }
}
