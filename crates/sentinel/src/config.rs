//! CLI-side config resolution: file + env from `sentinel-config`, then
//! global flag overrides.

use std::time::Duration;

use sentinel_api::SentinelClient;
use sentinel_api::transport::TransportConfig;
use sentinel_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load config and apply `--ws-url`, `--api-url`, `--timeout-ms`.
pub fn effective_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = sentinel_config::load_config()?;
    apply_overrides(&mut cfg, global);
    cfg.validate()?;
    Ok(cfg)
}

fn apply_overrides(cfg: &mut Config, global: &GlobalOpts) {
    if let Some(ref ws_url) = global.ws_url {
        cfg.endpoint.ws_url.clone_from(ws_url);
    }
    if let Some(ref api_url) = global.api_url {
        cfg.endpoint.api_url.clone_from(api_url);
    }
    if let Some(timeout_ms) = global.timeout_ms {
        cfg.endpoint.timeout_ms = timeout_ms;
    }
}

/// REST client for one-shot snapshot commands.
pub fn rest_client(cfg: &Config) -> Result<SentinelClient, CliError> {
    let transport =
        TransportConfig::default().with_timeout(Duration::from_millis(cfg.endpoint.timeout_ms));
    Ok(SentinelClient::new(cfg.api_url()?, &transport)?)
}
