// sentinel-api: Async client for the SentinelDPI sensor (live stream + REST snapshots)

pub mod client;
pub mod error;
pub mod event;
pub mod transport;
pub mod types;
pub mod websocket;

pub use client::{HealthStatus, SentinelClient};
pub use error::Error;
pub use event::{DecodeError, Event, decode};
pub use types::{Alert, AlertsSnapshot, MetricsSnapshot, Severity};
pub use websocket::{
    ConnectionHandle, ConnectionManager, ConnectionStatus, ReconnectConfig, StreamEvent,
};

/// Stream endpoint of the reference sensor deployment.
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8000/ws";

/// REST base URL of the reference sensor deployment.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
