//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use sentinel_config::ConfigError;
use sentinel_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(dead_code, unused_assignments)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to sensor at {url}")]
    #[diagnostic(
        code(sentinel::connection_failed),
        help(
            "Check that the sensor is running and reachable.\n\
             Override the endpoint with --api-url / --ws-url or in the config file\n\
             (see: sentinel config path)."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Request timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(sentinel::timeout),
        help("Increase the timeout with --timeout-ms or check sensor responsiveness.")
    )]
    Timeout { timeout_ms: u64 },

    // ── Sensor ───────────────────────────────────────────────────────

    #[error("Sensor error: {message}")]
    #[diagnostic(code(sentinel::api_error))]
    Api { message: String, status: Option<u16> },

    #[error("Sensor sent an unreadable response: {message}")]
    #[diagnostic(
        code(sentinel::invalid_payload),
        help("The sensor and this client may be running incompatible versions.")
    )]
    InvalidPayload { message: String },

    #[error("Sensor reported status '{status}'")]
    #[diagnostic(code(sentinel::unhealthy))]
    Unhealthy { status: String },

    #[error("Live stream ended unexpectedly")]
    #[diagnostic(code(sentinel::stream_closed))]
    StreamClosed,

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(sentinel::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(sentinel::config),
        help("Inspect the effective settings with: sentinel config show")
    )]
    Config(Box<ConfigError>),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {message}")]
    #[diagnostic(code(sentinel::render))]
    Render { message: String },

    #[error("Internal error: {0}")]
    #[diagnostic(code(sentinel::internal))]
    Internal(String),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },
            CoreError::Timeout { timeout_ms } => CliError::Timeout { timeout_ms },
            CoreError::NotRunning => CliError::StreamClosed,
            CoreError::Api { message, status } => CliError::Api { message, status },
            CoreError::InvalidPayload { message } => CliError::InvalidPayload { message },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<sentinel_api::Error> for CliError {
    fn from(err: sentinel_api::Error) -> Self {
        CoreError::from(err).into()
    }
}
