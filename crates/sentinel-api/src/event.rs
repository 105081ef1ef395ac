//! Stream envelope decoding.
//!
//! Every text frame the sensor pushes has the shape
//! `{ "event": "metrics" | "alert", "data": { ... } }`. Decoding is
//! all-or-nothing: a frame either yields a typed [`Event`] or a
//! [`DecodeError`] that the caller drops.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Alert, MetricsSnapshot};

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum Event {
    #[serde(rename = "metrics")]
    Metrics(MetricsSnapshot),

    #[serde(rename = "alert")]
    AlertReceived(Alert),
}

/// A frame that could not be turned into an [`Event`].
#[derive(Debug, Error)]
#[error("undecodable frame: {source}")]
pub struct DecodeError {
    #[from]
    source: serde_json::Error,
}

/// Parse one raw text frame.
pub fn decode(raw: &str) -> Result<Event, DecodeError> {
    Ok(serde_json::from_str(raw)?)
}
