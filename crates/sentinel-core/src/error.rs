// ── Core error types ──
//
// Errors surfaced by the monitoring core. Consumers see "could not reach
// the sensor" or "sensor answered badly", never raw reqwest or serde
// failures; the `From<sentinel_api::Error>` impl does the translation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to sensor at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Sensor request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Monitor is not running")]
    NotRunning,

    // ── Sensor errors ────────────────────────────────────────────────
    #[error("Sensor error: {message}")]
    Api { message: String, status: Option<u16> },

    #[error("Sensor sent an unreadable payload: {message}")]
    InvalidPayload { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the error means the sensor could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::Timeout { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<sentinel_api::Error> for CoreError {
    fn from(err: sentinel_api::Error) -> Self {
        match err {
            sentinel_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_ms: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            sentinel_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            sentinel_api::Error::Timeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            sentinel_api::Error::Status { status, path } => CoreError::Api {
                message: format!("HTTP {status} for {path}"),
                status: Some(status),
            },
            sentinel_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            sentinel_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            sentinel_api::Error::Deserialization { message, body: _ } => {
                CoreError::InvalidPayload { message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_maps_to_api_with_code() {
        let err: CoreError = sentinel_api::Error::Status {
            status: 503,
            path: "/metrics".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Api { status: Some(503), .. }));
        assert!(!err.is_unreachable());
    }

    #[test]
    fn timeout_is_unreachable() {
        let err: CoreError = sentinel_api::Error::Timeout { timeout_ms: 5000 }.into();
        assert!(err.is_unreachable());
        assert_eq!(err.to_string(), "Sensor request timed out after 5000ms");
    }

    #[test]
    fn deserialization_drops_body() {
        let err: CoreError = sentinel_api::Error::Deserialization {
            message: "expected value".into(),
            body: "<html>".into(),
        }
        .into();
        assert!(matches!(err, CoreError::InvalidPayload { .. }));
        assert!(!err.to_string().contains("<html>"));
    }
}
