//! `sentinel alerts`: recent alerts, newest first.

use std::sync::Arc;

use tabled::Tabled;

use sentinel_config::Config;
use sentinel_core::{Aggregator, Alert, AlertsSnapshot};

use crate::cli::{AlertsArgs, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output::{self, Painter};

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Type")]
    alert_type: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "ID")]
    id: String,
}

impl AlertRow {
    fn new(a: &Alert, paint: Painter) -> Self {
        Self {
            time: output::format_epoch(a.timestamp),
            severity: paint.severity(&a.severity),
            alert_type: a.alert_type.clone(),
            source: a.source_ip.clone().unwrap_or_else(|| "-".into()),
            id: a.id.clone(),
        }
    }
}

#[derive(Tabled)]
struct TypeRow {
    #[tabled(rename = "Type")]
    alert_type: String,
    #[tabled(rename = "Count")]
    count: u64,
}

/// Sensor-wide counts per type, busiest first.
fn type_rows(snapshot: &AlertsSnapshot) -> Vec<TypeRow> {
    let mut rows: Vec<TypeRow> = snapshot
        .alerts_by_type
        .iter()
        .map(|(t, n)| TypeRow {
            alert_type: t.clone(),
            count: *n,
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.alert_type.cmp(&b.alert_type)));
    rows
}

fn plain_line(a: &Arc<Alert>) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        a.id,
        a.alert_type,
        a.severity.as_str(),
        a.source_ip.as_deref().unwrap_or("-")
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(cfg: &Config, args: &AlertsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let client = config::rest_client(cfg)?;
    let snapshot = client.alerts().await?;
    let total = snapshot.total_alerts;

    // Same dedup and ordering rules as the live view.
    let mut aggregator = Aggregator::with_limits(1, args.limit.max(1));
    aggregator.seed_alerts(snapshot.clone());
    let state = aggregator.snapshot();
    let feed: Vec<Arc<Alert>> = state.threat_feed().cloned().collect();

    let paint = Painter::new(global.color);
    let out = match global.output {
        OutputFormat::Table => {
            let mut out = output::render_list(
                OutputFormat::Table,
                &feed,
                |a| AlertRow::new(a, paint),
                plain_line,
            )?;
            let types = type_rows(&snapshot);
            if !types.is_empty() {
                out.push_str("\n\n");
                out.push_str(&output::render_table(&types));
            }
            out.push_str(&format!(
                "\n{} of {total} alerts shown",
                feed.len()
            ));
            out
        }
        OutputFormat::Plain => output::render_list(
            OutputFormat::Plain,
            &feed,
            |a| AlertRow::new(a, paint),
            plain_line,
        )?,
        structured => output::render_single(
            structured,
            &AlertsSnapshot {
                recent_alerts: feed.iter().map(|a| (**a).clone()).collect(),
                ..snapshot
            },
            |_| String::new(),
            |_| String::new(),
        )?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
