//! `sentinel health`: sensor liveness check.

use sentinel_api::HealthStatus;
use sentinel_config::Config;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let client = config::rest_client(cfg)?;
    let health = client.health().await?;
    tracing::debug!(status = %health.status, "health check");
    check(&health)?;

    let out = output::render_single(
        global.output,
        &health,
        |h| h.status.clone(),
        |h| h.status.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn check(health: &HealthStatus) -> Result<(), CliError> {
    if health.is_ok() {
        Ok(())
    } else {
        Err(CliError::Unhealthy {
            status: health.status.clone(),
        })
    }
}
