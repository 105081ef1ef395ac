//! Configuration for the SentinelDPI client.
//!
//! TOML file plus `SENTINEL_*` environment overrides, layered over
//! compile-time defaults, and translation to `sentinel_core::MonitorConfig`.
//! The CLI applies its own flag overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use sentinel_api::ReconnectConfig;
use sentinel_core::{DisplayConfig, MonitorConfig, ToastTiming};

/// Environment variable that points at an alternative config file.
pub const CONFIG_PATH_ENV: &str = "SENTINEL_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub endpoint: Endpoint,

    #[serde(default)]
    pub reconnect: Reconnect,

    #[serde(default)]
    pub display: Display,
}

/// Where the sensor lives.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Endpoint {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// REST request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            api_url: default_api_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_ws_url() -> String {
    sentinel_api::DEFAULT_WS_URL.into()
}
fn default_api_url() -> String {
    sentinel_api::DEFAULT_API_URL.into()
}
fn default_timeout_ms() -> u64 {
    5000
}

/// Stream reconnect backoff.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Reconnect {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Fraction of the base delay, `0.0..=1.0`.
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// A handshake slower than this fails and is retried.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for Reconnect {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_jitter() -> f64 {
    0.2
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Display {
    #[serde(default = "default_pps_history")]
    pub pps_history: usize,

    #[serde(default = "default_feed_size")]
    pub feed_size: usize,

    #[serde(default = "default_max_toasts")]
    pub max_toasts: usize,

    #[serde(default = "default_toast_dismiss_ms")]
    pub toast_dismiss_ms: u64,

    #[serde(default = "default_toast_exit_ms")]
    pub toast_exit_ms: u64,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            pps_history: default_pps_history(),
            feed_size: default_feed_size(),
            max_toasts: default_max_toasts(),
            toast_dismiss_ms: default_toast_dismiss_ms(),
            toast_exit_ms: default_toast_exit_ms(),
        }
    }
}

fn default_pps_history() -> usize {
    30
}
fn default_feed_size() -> usize {
    20
}
fn default_max_toasts() -> usize {
    5
}
fn default_toast_dismiss_ms() -> u64 {
    5000
}
fn default_toast_exit_ms() -> u64 {
    300
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `SENTINEL_CONFIG`, else the platform
/// config directory.
pub fn config_path() -> PathBuf {
    if let Some(explicit) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(explicit);
    }
    ProjectDirs::from("io", "sentinel-dpi", "sentinel").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("sentinel");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load defaults, then the config file, then `SENTINEL_*` env vars.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Like [`load_config`] with an explicit file. A missing file is not an
/// error. Nested keys use a double underscore in env var names, e.g.
/// `SENTINEL_ENDPOINT__WS_URL`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SENTINEL_").split("__"))
        .extract()?;
    config.validate()?;
    Ok(config)
}

/// Render the effective config as TOML.
pub fn to_toml(cfg: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(cfg)?)
}

// ── Validation & translation ────────────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ws_url()?;
        self.api_url()?;

        if self.endpoint.timeout_ms == 0 {
            return Err(invalid("endpoint.timeout_ms", "must be greater than zero"));
        }

        let r = &self.reconnect;
        if r.initial_delay_ms == 0 {
            return Err(invalid("reconnect.initial_delay_ms", "must be greater than zero"));
        }
        if r.connect_timeout_ms == 0 {
            return Err(invalid("reconnect.connect_timeout_ms", "must be greater than zero"));
        }
        if r.max_delay_ms < r.initial_delay_ms {
            return Err(invalid(
                "reconnect.max_delay_ms",
                format!("{} is below initial_delay_ms {}", r.max_delay_ms, r.initial_delay_ms),
            ));
        }
        if !(0.0..=1.0).contains(&r.jitter) {
            return Err(invalid(
                "reconnect.jitter",
                format!("{} is outside 0.0..=1.0", r.jitter),
            ));
        }

        let d = &self.display;
        for (field, value) in [
            ("display.pps_history", d.pps_history),
            ("display.feed_size", d.feed_size),
            ("display.max_toasts", d.max_toasts),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        // A zero exit phase is fine: the toast is just removed at once.
        if d.toast_dismiss_ms == 0 {
            return Err(invalid("display.toast_dismiss_ms", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn ws_url(&self) -> Result<Url, ConfigError> {
        parse_url("endpoint.ws_url", &self.endpoint.ws_url, &["ws", "wss"])
    }

    pub fn api_url(&self) -> Result<Url, ConfigError> {
        parse_url("endpoint.api_url", &self.endpoint.api_url, &["http", "https"])
    }

    /// Build the runtime monitor configuration.
    pub fn to_monitor_config(&self) -> Result<MonitorConfig, ConfigError> {
        self.validate()?;

        let mut cfg = MonitorConfig::new(self.ws_url()?, self.api_url()?);
        cfg.timeout = Duration::from_millis(self.endpoint.timeout_ms);
        cfg.reconnect = ReconnectConfig {
            initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
            max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
            jitter: self.reconnect.jitter,
            connect_timeout: Duration::from_millis(self.reconnect.connect_timeout_ms),
        };
        cfg.display = DisplayConfig {
            pps_history: self.display.pps_history,
            feed_size: self.display.feed_size,
            toasts: ToastTiming {
                max_toasts: self.display.max_toasts,
                dismiss_after: Duration::from_millis(self.display.toast_dismiss_ms),
                exit_duration: Duration::from_millis(self.display.toast_exit_ms),
            },
        };
        Ok(cfg)
    }
}

fn parse_url(field: &str, raw: &str, schemes: &[&str]) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| invalid(field, format!("{raw}: {e}")))?;
    if !schemes.contains(&url.scheme()) {
        return Err(invalid(
            field,
            format!("scheme '{}' not one of {}", url.scheme(), schemes.join(", ")),
        ));
    }
    Ok(url)
}
