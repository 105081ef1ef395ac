//! `sentinel metrics`: one-shot traffic snapshot.

use std::fmt::Write as _;

use tabled::Tabled;

use sentinel_config::Config;
use sentinel_core::MetricsSnapshot;

use crate::cli::{GlobalOpts, MetricsArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, Painter};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Packets")]
    packets: String,
    #[tabled(rename = "Share")]
    share: String,
}

fn count_rows(rows: &[(&str, u64)], total: u64, top: usize) -> Vec<CountRow> {
    rows.iter()
        .take(top)
        .map(|(name, count)| CountRow {
            name: (*name).to_owned(),
            packets: output::format_count(*count),
            share: share(*count, total),
        })
        .collect()
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn share(count: u64, total: u64) -> String {
    if total == 0 {
        return "-".into();
    }
    format!("{:.1}%", count as f64 * 100.0 / total as f64)
}

// ── Rendering ───────────────────────────────────────────────────────

fn detail(m: &MetricsSnapshot, top: usize, paint: Painter) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}  {:.1} pkt/s    {}  {}",
        paint.bold("Rate"),
        m.packets_per_second,
        paint.bold("Total"),
        output::format_count(m.total_packets),
    );

    for (title, rows) in [
        ("Protocols", m.protocols_by_volume()),
        ("Top sources", m.sources_by_volume()),
        ("Top destinations", m.destinations_by_volume()),
    ] {
        if rows.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{}", paint.bold(title));
        let _ = writeln!(
            out,
            "{}",
            output::render_table(&count_rows(&rows, m.total_packets, top))
        );
    }
    out.trim_end().to_owned()
}

fn plain(m: &MetricsSnapshot) -> String {
    let mut out = format!(
        "total_packets\t{}\npackets_per_second\t{}",
        m.total_packets, m.packets_per_second
    );
    for (name, count) in m.protocols_by_volume() {
        let _ = write!(out, "\nprotocol:{name}\t{count}");
    }
    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(cfg: &Config, args: &MetricsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let client = config::rest_client(cfg)?;
    let metrics = client.metrics().await?;
    tracing::debug!(total = metrics.total_packets, "fetched metrics");

    let paint = Painter::new(global.color);
    let out = output::render_single(
        global.output,
        &metrics,
        |m| detail(m, args.top, paint),
        plain,
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
