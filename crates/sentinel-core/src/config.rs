// ── Runtime monitor configuration ──
//
// Describes where the sensor lives and how the client behaves. Never
// touches disk; `sentinel-config` or the caller builds one and hands it in.

use std::time::Duration;

use url::Url;

use sentinel_api::ReconnectConfig;

use crate::aggregator::{FEED_SIZE, PPS_HISTORY_SIZE};
use crate::error::CoreError;
use crate::toast::ToastTiming;

/// Bounds of the display-ready state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    pub pps_history: usize,
    pub feed_size: usize,
    pub toasts: ToastTiming,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            pps_history: PPS_HISTORY_SIZE,
            feed_size: FEED_SIZE,
            toasts: ToastTiming::default(),
        }
    }
}

/// Everything a [`Monitor`](crate::Monitor) needs to run.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Stream endpoint (e.g. `ws://127.0.0.1:8000/ws`).
    pub ws_url: Url,
    /// REST base for initial-paint snapshots.
    pub api_url: Url,
    /// REST request timeout.
    pub timeout: Duration,
    pub reconnect: ReconnectConfig,
    pub display: DisplayConfig,
    /// Fetch `/metrics` and `/alerts` once at startup.
    pub seed_from_rest: bool,
}

impl MonitorConfig {
    pub fn new(ws_url: Url, api_url: Url) -> Self {
        Self {
            ws_url,
            api_url,
            timeout: sentinel_api::transport::DEFAULT_TIMEOUT,
            reconnect: ReconnectConfig::default(),
            display: DisplayConfig::default(),
            seed_from_rest: true,
        }
    }

    /// Compile-time default endpoints on localhost.
    pub fn local() -> Result<Self, CoreError> {
        let parse = |raw: &str| {
            Url::parse(raw).map_err(|e| CoreError::Config {
                message: format!("invalid default URL {raw}: {e}"),
            })
        };
        Ok(Self::new(
            parse(sentinel_api::DEFAULT_WS_URL)?,
            parse(sentinel_api::DEFAULT_API_URL)?,
        ))
    }
}
