// sentinel-core: Live state layer between sentinel-api and consumers (CLI).

pub mod aggregator;
pub mod config;
pub mod error;
pub mod model;
pub mod monitor;
pub mod rolling;
pub mod stream;
pub mod toast;

// ── Primary re-exports ──────────────────────────────────────────────
pub use aggregator::{AggregateState, Aggregator, Applied};
pub use config::{DisplayConfig, MonitorConfig};
pub use error::CoreError;
pub use monitor::{Monitor, MonitorEvent};
pub use rolling::RollingWindow;
pub use stream::{StateStream, StateWatchStream};
pub use toast::{Toast, ToastChange, ToastPhase, ToastQueue, ToastTiming};

pub use model::{
    Alert, AlertsSnapshot, ConnectionStatus, MetricsSnapshot, Severity, TimeSeriesPoint,
};
