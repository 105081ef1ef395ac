// ── Monitor ──
//
// Lifecycle of one live monitoring session: opens the stream, seeds from
// REST, and runs the pipeline task that decodes frames, applies them to
// the aggregator, drives toast timers, and publishes snapshots.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sentinel_api::SentinelClient;
use sentinel_api::event::decode;
use sentinel_api::transport::TransportConfig;
use sentinel_api::websocket::{
    ConnectionHandle, ConnectionManager, Connector, StreamEvent, WsConnector,
};

use crate::aggregator::{AggregateState, Aggregator, Applied};
use crate::config::MonitorConfig;
use crate::error::CoreError;
use crate::model::{Alert, AlertsSnapshot, ConnectionStatus, MetricsSnapshot, TimeSeriesPoint};
use crate::stream::StateStream;
use crate::toast::{Toast, ToastChange, ToastQueue};

const EVENT_CHANNEL_SIZE: usize = 256;

// ── MonitorEvent ─────────────────────────────────────────────────────

/// Notable things that happened in the pipeline, in order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MonitorEvent {
    Status(ConnectionStatus),
    /// A metrics tick with the rate history as it stood right after it.
    Metrics {
        metrics: Arc<MetricsSnapshot>,
        pps_history: Vec<TimeSeriesPoint>,
    },
    Alert(Arc<Alert>),
    Toast(ToastChange),
    Seeded { metrics: bool, alerts: usize },
    SeedFailed(String),
}

enum Command {
    DismissToast(String),
}

struct Seed {
    metrics: Result<MetricsSnapshot, CoreError>,
    alerts: Result<AlertsSnapshot, CoreError>,
}

// ── Monitor ──────────────────────────────────────────────────────────

/// Handle to a running monitoring session.
///
/// Cheaply cloneable. State is published as immutable snapshots; the
/// pipeline task is the only writer.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    config: MonitorConfig,
    state: watch::Receiver<Arc<AggregateState>>,
    toasts: watch::Receiver<Arc<Vec<Toast>>>,
    status: watch::Receiver<ConnectionStatus>,
    events: broadcast::Sender<MonitorEvent>,
    first_events: Mutex<Option<broadcast::Receiver<MonitorEvent>>>,
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Monitor {
    /// Open the live stream over a real WebSocket and start the pipeline.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: MonitorConfig) -> Result<Self, CoreError> {
        Self::start_with(config, Arc::new(WsConnector))
    }

    /// Start over a caller-supplied stream transport.
    pub fn start_with(
        config: MonitorConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, CoreError> {
        let client = if config.seed_from_rest {
            let transport = TransportConfig::default().with_timeout(config.timeout);
            Some(SentinelClient::new(config.api_url.clone(), &transport)?)
        } else {
            None
        };

        let cancel = CancellationToken::new();
        let (handle, frames) = ConnectionManager::open_with(
            config.ws_url.clone(),
            config.reconnect.clone(),
            connector,
            cancel.child_token(),
        );

        let aggregator =
            Aggregator::with_limits(config.display.pps_history, config.display.feed_size);
        let toast_queue = ToastQueue::new(config.display.toasts);

        let (state_tx, state_rx) = watch::channel(Arc::new(aggregator.snapshot()));
        let (toasts_tx, toasts_rx) = watch::channel(Arc::new(Vec::new()));
        let (events_tx, first_events) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let status = handle.status();

        let pipeline = Pipeline {
            aggregator,
            toast_queue,
            last_status: ConnectionStatus::default(),
            state: state_tx,
            toasts: toasts_tx,
            events: events_tx.clone(),
        };
        let seed = client.map(spawn_seed);

        info!(
            ws_url = %config.ws_url,
            api_url = %config.api_url,
            seed = config.seed_from_rest,
            "starting monitor"
        );
        let task = tokio::spawn(pipeline.run(
            handle,
            frames,
            commands_rx,
            seed,
            cancel.clone(),
        ));

        Ok(Self {
            inner: Arc::new(MonitorInner {
                config,
                state: state_rx,
                toasts: toasts_rx,
                status,
                events: events_tx,
                first_events: Mutex::new(Some(first_events)),
                commands: commands_tx,
                cancel,
                task: tokio::sync::Mutex::new(Some(task)),
            }),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Aggregated metrics and alert state.
    pub fn state(&self) -> StateStream<AggregateState> {
        StateStream::new(self.inner.state.clone())
    }

    pub fn snapshot(&self) -> Arc<AggregateState> {
        self.inner.state.borrow().clone()
    }

    /// Present toasts, oldest first.
    pub fn toasts(&self) -> StateStream<Vec<Toast>> {
        StateStream::new(self.inner.toasts.clone())
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.clone()
    }

    pub fn current_status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }

    /// Pipeline events. The first subscriber sees everything since start;
    /// later ones see events published after they subscribe.
    pub fn events(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner
            .first_events
            .lock()
            .ok()
            .and_then(|mut first| first.take())
            .unwrap_or_else(|| self.inner.events.subscribe())
    }

    // ── Control ──────────────────────────────────────────────────────

    /// Start the exit of a visible toast now.
    pub fn dismiss_toast(&self, id: &str) -> Result<(), CoreError> {
        self.inner
            .commands
            .send(Command::DismissToast(id.to_owned()))
            .map_err(|_| CoreError::NotRunning)
    }

    /// Stop the pipeline and the connection manager without waiting.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    /// Stop and wait for teardown to complete.
    pub async fn close(&self) {
        self.inner.cancel.cancel();
        let task = self.inner.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "monitor pipeline ended abnormally");
            }
        }
        debug!("monitor closed");
    }
}

// ── REST seed ────────────────────────────────────────────────────────

fn spawn_seed(client: SentinelClient) -> oneshot::Receiver<Seed> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let (metrics, alerts) = tokio::join!(client.metrics(), client.alerts());
        let _ = tx.send(Seed {
            metrics: metrics.map_err(CoreError::from),
            alerts: alerts.map_err(CoreError::from),
        });
    });
    rx
}

// ── Pipeline task ────────────────────────────────────────────────────

struct Pipeline {
    aggregator: Aggregator,
    toast_queue: ToastQueue,
    last_status: ConnectionStatus,
    state: watch::Sender<Arc<AggregateState>>,
    toasts: watch::Sender<Arc<Vec<Toast>>>,
    events: broadcast::Sender<MonitorEvent>,
}

impl Pipeline {
    async fn run(
        mut self,
        connection: ConnectionHandle,
        mut stream: mpsc::UnboundedReceiver<StreamEvent>,
        mut commands: mpsc::UnboundedReceiver<Command>,
        seed: Option<oneshot::Receiver<Seed>>,
        cancel: CancellationToken,
    ) {
        let mut seed_pending = seed.is_some();
        let mut seed = seed.unwrap_or_else(|| oneshot::channel().1);
        // The manager starts out connecting and reports every later
        // transition in order with the frames.
        self.emit(MonitorEvent::Status(self.last_status));

        loop {
            let deadline = self.toast_queue.next_deadline();
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = stream.recv() => match event {
                    Some(StreamEvent::Frame(raw)) => self.on_frame(&raw),
                    Some(StreamEvent::Status(status)) => self.on_status(status),
                    None => break,
                },
                result = &mut seed, if seed_pending => {
                    seed_pending = false;
                    match result {
                        Ok(seed) => self.on_seed(seed),
                        Err(_) => warn!("seed task dropped before reporting"),
                    }
                }
                Some(command) = commands.recv() => self.on_command(command),
                () = toast_timer(deadline) => {
                    let changes = self.toast_queue.advance(Instant::now());
                    self.publish_toasts(changes);
                }
            }
        }

        connection.close().await;
        self.on_status(ConnectionStatus::Disconnected);
        debug!("monitor pipeline exiting");
    }

    fn on_status(&mut self, status: ConnectionStatus) {
        if status == self.last_status {
            return;
        }
        debug!(%status, "connection status changed");
        self.last_status = status;
        self.emit(MonitorEvent::Status(status));
    }

    fn on_frame(&mut self, raw: &str) {
        let event = match decode(raw) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, len = raw.len(), "dropping undecodable frame");
                return;
            }
        };
        let applied = self.aggregator.apply(event);
        self.on_applied(applied);
    }

    fn on_applied(&mut self, applied: Applied) {
        match applied {
            Applied::Metrics => {
                self.publish_state();
                if let Some(m) = self.aggregator.metrics() {
                    self.emit(MonitorEvent::Metrics {
                        metrics: Arc::clone(m),
                        pps_history: self.aggregator.pps_history().to_vec(),
                    });
                }
            }
            Applied::Alert(alert) => {
                self.publish_state();
                self.emit(MonitorEvent::Alert(Arc::clone(&alert)));
                let changes = self.toast_queue.push(alert, Instant::now());
                self.publish_toasts(changes);
            }
            Applied::DuplicateAlert => {}
        }
    }

    fn on_seed(&mut self, seed: Seed) {
        let mut seeded_metrics = false;
        let mut seeded_alerts = 0;
        let mut failures = Vec::new();

        match seed.metrics {
            // The stream may already be ahead of the snapshot.
            Ok(m) if self.aggregator.metrics().is_none() => {
                self.aggregator.seed_metrics(m);
                seeded_metrics = true;
            }
            Ok(_) => debug!("stream delivered metrics first, skipping seeded snapshot"),
            Err(e) => failures.push(format!("metrics: {e}")),
        }
        match seed.alerts {
            Ok(snapshot) => {
                let accepted = self.aggregator.seed_alerts(snapshot);
                seeded_alerts = accepted.len();
                for alert in accepted {
                    self.emit(MonitorEvent::Alert(alert));
                }
            }
            Err(e) => failures.push(format!("alerts: {e}")),
        }

        if seeded_metrics || seeded_alerts > 0 {
            self.publish_state();
        }
        info!(metrics = seeded_metrics, alerts = seeded_alerts, "seeded from REST");
        self.emit(MonitorEvent::Seeded {
            metrics: seeded_metrics,
            alerts: seeded_alerts,
        });
        if !failures.is_empty() {
            let message = failures.join("; ");
            warn!(%message, "REST seed failed");
            self.emit(MonitorEvent::SeedFailed(message));
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::DismissToast(id) => {
                if self.toast_queue.dismiss(&id, Instant::now()) {
                    self.publish_toasts(vec![ToastChange::Exiting(id)]);
                }
            }
        }
    }

    fn publish_state(&self) {
        self.state.send_replace(Arc::new(self.aggregator.snapshot()));
    }

    fn publish_toasts(&self, changes: Vec<ToastChange>) {
        if changes.is_empty() {
            return;
        }
        self.toasts.send_replace(Arc::new(self.toast_queue.to_vec()));
        for change in changes {
            self.emit(MonitorEvent::Toast(change));
        }
    }

    fn emit(&self, event: MonitorEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

async fn toast_timer(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
