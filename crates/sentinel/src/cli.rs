//! Clap derive structures for the `sentinel` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sentinel -- live terminal monitor for the SentinelDPI sensor
#[derive(Debug, Parser)]
#[command(
    name = "sentinel",
    version,
    about = "Watch SentinelDPI traffic metrics and security alerts from the command line",
    long_about = "Streams live metrics and alerts from a SentinelDPI sensor over WebSocket,\n\
        reconnecting with exponential backoff, and queries point-in-time\n\
        snapshots over the sensor's REST API.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Live stream endpoint (overrides config)
    #[arg(long, env = "SENTINEL_WS_URL", global = true)]
    pub ws_url: Option<String>,

    /// REST API base URL (overrides config)
    #[arg(long, env = "SENTINEL_API_URL", global = true)]
    pub api_url: Option<String>,

    /// REST request timeout in milliseconds (overrides config)
    #[arg(long, env = "SENTINEL_TIMEOUT_MS", global = true)]
    pub timeout_ms: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SENTINEL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream live metrics and alerts until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Show the sensor's current traffic metrics
    #[command(alias = "m")]
    Metrics(MetricsArgs),

    /// Show recent security alerts
    #[command(alias = "a")]
    Alerts(AlertsArgs),

    /// Check that the sensor API is up
    Health,

    /// Inspect CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Skip the initial REST snapshot
    #[arg(long)]
    pub no_seed: bool,

    /// Exit successfully after the first metrics update
    #[arg(long)]
    pub once_connected: bool,
}

#[derive(Debug, Args)]
pub struct MetricsArgs {
    /// Number of protocols and hosts to show in tables
    #[arg(long, short = 'n', default_value = "10")]
    pub top: usize,
}

#[derive(Debug, Args)]
pub struct AlertsArgs {
    /// Max alerts to show, newest first
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,
    /// Print the effective configuration (defaults, file, env, flags)
    Show,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
