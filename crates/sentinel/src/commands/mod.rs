//! Command dispatch: bridges CLI args -> sentinel core -> output formatting.

pub mod alerts;
pub mod config_cmd;
pub mod health;
pub mod metrics;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Dispatch a sensor-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::effective_config(global)?;
    match cmd {
        Command::Watch(args) => watch::handle(&cfg, &args, global).await,
        Command::Metrics(args) => metrics::handle(&cfg, &args, global).await,
        Command::Alerts(args) => alerts::handle(&cfg, &args, global).await,
        Command::Health => health::handle(&cfg, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not talk to the sensor".into(),
        )),
    }
}
