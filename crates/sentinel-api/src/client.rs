// REST client for the sensor's point-in-time snapshot endpoints.
//
// Single-attempt requests with a hard timeout; failures are returned to
// the caller untouched. Used for initial paint and one-shot CLI queries.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;
use crate::types::{AlertsSnapshot, MetricsSnapshot};

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// HTTP client for the sensor's read-only REST API.
#[derive(Debug, Clone)]
pub struct SentinelClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_ms: u64,
}

impl SentinelClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
            timeout_ms: u64::try_from(transport.timeout.as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: with_trailing_slash(base_url),
            timeout_ms: 0,
        }
    }

    /// The sensor base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /metrics`
    pub async fn metrics(&self) -> Result<MetricsSnapshot, Error> {
        self.get("metrics").await
    }

    /// `GET /alerts`
    pub async fn alerts(&self) -> Result<AlertsSnapshot, Error> {
        self.get("alerts").await
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthStatus, Error> {
        self.get("health").await
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                path: url.path().to_owned(),
            });
        }

        // The timeout covers the body too, not just the headers.
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(e) => Err(Error::Deserialization {
                message: e.to_string(),
                body,
            }),
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                timeout_ms: self.timeout_ms,
            }
        } else {
            Error::Transport(e)
        }
    }
}

/// `Url::join` replaces the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
