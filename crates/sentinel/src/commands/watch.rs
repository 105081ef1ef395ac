//! `sentinel watch`: follow the live stream until interrupted.
//!
//! Text formats print one line per notable event; JSON and YAML emit each
//! [`MonitorEvent`] as a record so the output can be piped.

use std::fmt::Write as _;
use std::io::{self, Write as _};

use chrono::Local;
use tokio::sync::broadcast::error::RecvError;

use sentinel_config::Config;
use sentinel_core::{Alert, MetricsSnapshot, Monitor, MonitorEvent, TimeSeriesPoint, ToastChange};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output::{self, Painter};

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub async fn handle(cfg: &Config, args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut monitor_cfg = cfg.to_monitor_config()?;
    monitor_cfg.seed_from_rest = !args.no_seed;

    let monitor = Monitor::start(monitor_cfg)?;
    let result = follow(&monitor, args, global).await;
    monitor.close().await;
    result
}

async fn follow(monitor: &Monitor, args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut events = monitor.events();
    let paint = Painter::new(global.color);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let event = tokio::select! {
            _ = &mut ctrl_c => {
                tracing::debug!("interrupted");
                return Ok(());
            }
            event = events.recv() => event,
        };
        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "output fell behind the stream, events dropped");
                continue;
            }
            Err(RecvError::Closed) => return Err(CliError::StreamClosed),
        };

        if let MonitorEvent::SeedFailed(ref message) = event {
            warn_seed_failed(message, global.quiet);
        }
        let done = args.once_connected && matches!(event, MonitorEvent::Metrics { .. });

        let line = match global.output {
            OutputFormat::Table | OutputFormat::Plain => text_line(&event, paint),
            structured => Some(output::render_record(structured, &event)?),
        };
        if let Some(line) = line {
            output::print_output(&line, global.quiet);
        }
        if done {
            return Ok(());
        }
    }
}

fn warn_seed_failed(message: &str, quiet: bool) {
    if quiet {
        return;
    }
    let _ = writeln!(
        io::stderr().lock(),
        "warning: initial snapshot unavailable ({message}); waiting for live data"
    );
}

// ── Text rendering ──────────────────────────────────────────────────

fn text_line(event: &MonitorEvent, paint: Painter) -> Option<String> {
    let body = match event {
        MonitorEvent::Status(status) => paint.status(*status),
        MonitorEvent::Metrics {
            metrics,
            pps_history,
        } => metrics_line(metrics, pps_history, paint),
        MonitorEvent::Alert(alert) => alert_line(alert, paint),
        MonitorEvent::Seeded { metrics, alerts } => paint.dim(&format!(
            "seeded: metrics={metrics} alerts={alerts}"
        )),
        MonitorEvent::Toast(change) => {
            // Alerts already get their own line; toasts only matter to
            // interactive views.
            tracing::trace!(?change, "toast");
            if let ToastChange::Dropped(id) = change {
                tracing::debug!(%id, "toast dropped for a newer alert");
            }
            return None;
        }
        MonitorEvent::SeedFailed(_) => return None,
    };
    Some(format!("{}  {body}", paint.dim(&Local::now().format("%H:%M:%S").to_string())))
}

fn metrics_line(m: &MetricsSnapshot, history: &[TimeSeriesPoint], paint: Painter) -> String {
    let mut line = format!(
        "{:>9.1} pkt/s  {}  total {}",
        m.packets_per_second,
        sparkline(history),
        output::format_count(m.total_packets),
    );
    let protocols = m.protocols_by_volume();
    if !protocols.is_empty() {
        let top: Vec<String> = protocols
            .iter()
            .take(3)
            .map(|(name, count)| format!("{name} {}", output::format_count(*count)))
            .collect();
        let _ = write!(line, "  {}", paint.dim(&top.join(" · ")));
    }
    line
}

fn alert_line(alert: &Alert, paint: Painter) -> String {
    format!(
        "{:<6} {} from {} {}",
        paint.severity(&alert.severity),
        paint.bold(&alert.alert_type),
        alert.source_ip.as_deref().unwrap_or("unknown"),
        paint.dim(&format!("[{}]", alert.id)),
    )
}

/// Rate history scaled to the window's own min..max.
fn sparkline(history: &[TimeSeriesPoint]) -> String {
    let values: Vec<f64> = history.iter().map(|p| p.pps).collect();
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    let span = max - min;
    values
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                return SPARK[0];
            }
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                clippy::as_conversions
            )]
            let level = (((v - min) / span) * 7.0).round() as usize;
            SPARK[level.min(SPARK.len() - 1)]
        })
        .collect()
}
