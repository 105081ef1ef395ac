//! WebSocket stream with auto-reconnect.
//!
//! Connects to the sensor's `/ws` endpoint and forwards every text frame,
//! in arrival order, through an unbounded channel of [`StreamEvent`]s that
//! also carries status transitions. Reconnects forever with exponential
//! backoff + jitter, bounding each handshake by a connect timeout, and
//! publishes the tri-state [`ConnectionStatus`] over a
//! [`tokio::sync::watch`] channel as well.
//!
//! The manager is a single-task actor. Each transport instance runs in its
//! own reader task and reports lifecycle events tagged with a generation
//! id; events whose generation is not the live transport's are discarded,
//! so a superseded connection can never leak frames into a newer session.
//!
//! # Example
//!
//! ```rust,ignore
//! use sentinel_api::websocket::{ConnectionManager, ReconnectConfig, StreamEvent};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let ws_url = Url::parse("ws://127.0.0.1:8000/ws")?;
//! let (handle, mut events) =
//!     ConnectionManager::open(ws_url, ReconnectConfig::default(), CancellationToken::new());
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         StreamEvent::Status(status) => println!("● {status}"),
//!         StreamEvent::Frame(frame) => println!("{frame}"),
//!     }
//! }
//!
//! handle.shutdown();
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, StreamExt};
use rand::Rng;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── ConnectionStatus ─────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

// ── StreamEvent ──────────────────────────────────────────────────────

/// What the manager delivers downstream, in the order it happened.
///
/// Status transitions share the channel with frames so a consumer never
/// sees a frame before the `Connected` that preceded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Status(ConnectionStatus),
    Frame(String),
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on the un-jittered delay. Default: 30s.
    pub max_delay: Duration,

    /// Symmetric jitter as a fraction of the base delay. Default: 0.2 (±20%).
    pub jitter: f64,

    /// How long one handshake may take before it counts as failed. Default: 10s.
    pub connect_timeout: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: 0.2,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Un-jittered delay for a 0-indexed attempt: `min(initial * 2^attempt, max)`.
pub fn backoff_base(attempt: u32, config: &ReconnectConfig) -> Duration {
    let factor = 2.0_f64.powi(i32::try_from(attempt.min(32)).unwrap_or(32));
    let base = (config.initial_delay.as_secs_f64() * factor).min(config.max_delay.as_secs_f64());
    Duration::from_secs_f64(base)
}

/// Jittered delay for `attempt` given a sample `unit` in `[-1, 1]`.
///
/// `delay = base + base * jitter * unit`
pub fn backoff_delay(attempt: u32, config: &ReconnectConfig, unit: f64) -> Duration {
    let base = backoff_base(attempt, config).as_secs_f64();
    let spread = config.jitter.clamp(0.0, 1.0) * unit.clamp(-1.0, 1.0);
    Duration::from_secs_f64((base + base * spread).max(0.0))
}

/// [`backoff_delay`] with `unit` drawn uniformly from `[-1, 1]`.
pub fn jittered_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let unit = rand::thread_rng().gen_range(-1.0..=1.0);
    backoff_delay(attempt, config, unit)
}

// ── Connector ────────────────────────────────────────────────────────

/// Text frames from one transport instance. The stream ends on a clean
/// close; an `Err` item means the transport failed.
pub type FrameStream = BoxStream<'static, Result<String, Error>>;

/// Opens one transport instance. Implemented by [`WsConnector`] for real
/// sockets; tests substitute scripted connectors.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<FrameStream, Error>>;
}

/// tokio-tungstenite transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<FrameStream, Error>> {
        let url = url.clone();
        async move {
            tracing::info!(url = %url, "Connecting to WebSocket");

            let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

            let (_write, mut read) = ws_stream.split();

            let frames = async_stream::stream! {
                while let Some(frame) = read.next().await {
                    match frame {
                        Ok(tungstenite::Message::Text(text)) => {
                            yield Ok(text.as_str().to_owned());
                        }
                        Ok(tungstenite::Message::Ping(_)) => {
                            // tungstenite handles pong replies automatically
                            tracing::trace!("WebSocket ping");
                        }
                        Ok(tungstenite::Message::Close(frame)) => {
                            if let Some(ref cf) = frame {
                                tracing::info!(
                                    code = %cf.code,
                                    reason = %cf.reason,
                                    "WebSocket close frame received"
                                );
                            } else {
                                tracing::info!("WebSocket close frame received (no payload)");
                            }
                            break;
                        }
                        Ok(_) => {
                            // Binary, Pong, Frame -- ignore
                        }
                        Err(e) => {
                            yield Err(Error::WebSocketConnect(e.to_string()));
                            break;
                        }
                    }
                }
            };

            Ok::<FrameStream, Error>(frames.boxed())
        }
        .boxed()
    }
}

// ── ConnectionHandle ─────────────────────────────────────────────────

/// Handle to a running connection manager.
pub struct ConnectionHandle {
    status: watch::Receiver<ConnectionStatus>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Subscribe to status transitions.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// The status right now.
    pub fn current_status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Stop reconnecting and close the live transport.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Shut down and wait for the actor to finish tearing down.
    pub async fn close(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "connection manager task ended abnormally");
        }
    }
}

// ── ConnectionManager ────────────────────────────────────────────────

#[derive(Debug)]
enum TransportEvent {
    Opened,
    Frame(String),
    Closed,
    Failed(Error),
}

#[derive(Debug)]
struct Tagged {
    generation: u64,
    event: TransportEvent,
}

struct LiveTransport {
    generation: u64,
    cancel: CancellationToken,
}

/// Owns at most one transport and at most one pending retry timer.
pub struct ConnectionManager {
    url: Url,
    config: ReconnectConfig,
    connector: Arc<dyn Connector>,
    status: watch::Sender<ConnectionStatus>,
    frames: mpsc::UnboundedSender<StreamEvent>,
    events_tx: mpsc::UnboundedSender<Tagged>,
    events_rx: mpsc::UnboundedReceiver<Tagged>,
    transport: Option<LiveTransport>,
    retry: Option<Pin<Box<Sleep>>>,
    attempt: u32,
    generation: u64,
    cancel: CancellationToken,
}

impl ConnectionManager {
    /// Open the stream over a real WebSocket and spawn the actor.
    ///
    /// Returns immediately; the first handshake happens asynchronously.
    /// Must be called from within a tokio runtime.
    pub fn open(
        url: Url,
        config: ReconnectConfig,
        cancel: CancellationToken,
    ) -> (ConnectionHandle, mpsc::UnboundedReceiver<StreamEvent>) {
        Self::open_with(url, config, Arc::new(WsConnector), cancel)
    }

    /// Open the stream over a caller-supplied [`Connector`].
    pub fn open_with(
        url: Url,
        config: ReconnectConfig,
        connector: Arc<dyn Connector>,
        cancel: CancellationToken,
    ) -> (ConnectionHandle, mpsc::UnboundedReceiver<StreamEvent>) {
        let (manager, status, frames) = Self::new(url, config, connector, cancel.clone());
        let task = tokio::spawn(manager.run());
        (
            ConnectionHandle {
                status,
                cancel,
                task,
            },
            frames,
        )
    }

    fn new(
        url: Url,
        config: ReconnectConfig,
        connector: Arc<dyn Connector>,
        cancel: CancellationToken,
    ) -> (
        Self,
        watch::Receiver<ConnectionStatus>,
        mpsc::UnboundedReceiver<StreamEvent>,
    ) {
        let (status, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let (frames, frames_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let manager = Self {
            url,
            config,
            connector,
            status,
            frames,
            events_tx,
            events_rx,
            transport: None,
            retry: None,
            attempt: 0,
            generation: 0,
            cancel,
        };
        (manager, status_rx, frames_rx)
    }

    /// Main loop: connect → consume lifecycle events → on close, backoff → reconnect.
    async fn run(mut self) {
        self.connect();

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                Some(tagged) = self.events_rx.recv() => self.handle(tagged),
                () = retry_elapsed(&mut self.retry) => {
                    self.retry = None;
                    self.connect();
                }
            }
        }

        self.teardown();
        tracing::debug!("WebSocket manager exiting");
    }

    /// Start a new transport unless one is already live.
    fn connect(&mut self) {
        if self.transport.is_some() {
            tracing::debug!(generation = self.generation, "transport already live, ignoring connect");
            return;
        }

        self.retry = None;
        self.generation += 1;
        self.set_status(ConnectionStatus::Connecting);

        let cancel = self.cancel.child_token();
        tokio::spawn(run_transport(
            Arc::clone(&self.connector),
            self.url.clone(),
            self.config.connect_timeout,
            self.generation,
            self.events_tx.clone(),
            cancel.clone(),
        ));

        self.transport = Some(LiveTransport {
            generation: self.generation,
            cancel,
        });
    }

    fn handle(&mut self, Tagged { generation, event }: Tagged) {
        let live = self.transport.as_ref().map(|t| t.generation);
        if live != Some(generation) {
            tracing::debug!(generation, ?live, "dropping event from superseded transport");
            return;
        }

        match event {
            TransportEvent::Opened => {
                tracing::info!(generation, "WebSocket connected");
                self.attempt = 0;
                self.set_status(ConnectionStatus::Connected);
            }
            TransportEvent::Frame(text) => {
                // Ignore send errors -- just means nobody is consuming right now
                let _ = self.frames.send(StreamEvent::Frame(text));
            }
            TransportEvent::Failed(e) => {
                tracing::warn!(error = %e, attempt = self.attempt, "WebSocket error");
                self.close_transport();
                self.on_closed();
            }
            TransportEvent::Closed => {
                tracing::info!(generation, "WebSocket disconnected");
                self.transport = None;
                self.on_closed();
            }
        }
    }

    /// Cancel the live reader task and forget it; its later events fail the
    /// generation check.
    fn close_transport(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.cancel.cancel();
        }
    }

    /// The single reconnect-scheduling path.
    fn on_closed(&mut self) {
        self.set_status(ConnectionStatus::Disconnected);

        let delay = jittered_backoff(self.attempt, &self.config);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt = self.attempt,
            "Waiting before reconnect"
        );
        self.attempt = self.attempt.saturating_add(1);
        self.retry = Some(Box::pin(tokio::time::sleep(delay)));
    }

    /// Timer first, then the transport, so nothing can schedule a retry
    /// after shutdown.
    fn teardown(&mut self) {
        self.retry = None;
        self.close_transport();
        self.set_status(ConnectionStatus::Disconnected);
    }

    /// Publish on the watch and, when it changed, in order on the frame
    /// channel.
    fn set_status(&self, status: ConnectionStatus) {
        if self.status.send_replace(status) != status {
            let _ = self.frames.send(StreamEvent::Status(status));
        }
    }
}

async fn retry_elapsed(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

// ── Single transport lifecycle ───────────────────────────────────────

/// Establish one transport and report its lifecycle until it ends or is
/// cancelled. Cancellation is silent: the manager already disowned it.
async fn run_transport(
    connector: Arc<dyn Connector>,
    url: Url,
    connect_timeout: Duration,
    generation: u64,
    events: mpsc::UnboundedSender<Tagged>,
    cancel: CancellationToken,
) {
    let emit = |event: TransportEvent| {
        let _ = events.send(Tagged { generation, event });
    };

    let mut stream = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        result = tokio::time::timeout(connect_timeout, connector.connect(&url)) => match result {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                emit(TransportEvent::Failed(e));
                return;
            }
            Err(_) => {
                emit(TransportEvent::Failed(Error::Timeout {
                    timeout_ms: u64::try_from(connect_timeout.as_millis()).unwrap_or(u64::MAX),
                }));
                return;
            }
        },
    };

    emit(TransportEvent::Opened);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            frame = stream.next() => match frame {
                Some(Ok(text)) => emit(TransportEvent::Frame(text)),
                Some(Err(e)) => {
                    emit(TransportEvent::Failed(e));
                    return;
                }
                None => {
                    emit(TransportEvent::Closed);
                    return;
                }
            },
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use futures_util::stream;
    use tokio::time::Instant;

    use super::*;

    enum Script {
        Refuse,
        /// TCP accepted, but the upgrade never answers.
        Stall,
        /// Handshake succeeds, frames are delivered, then the peer closes.
        Accept(Vec<&'static str>),
        /// Handshake succeeds, frames are delivered, then the socket idles.
        Hold(Vec<&'static str>),
    }

    struct ScriptedConnector {
        script: Mutex<VecDeque<Script>>,
        attempts: Mutex<Vec<Instant>>,
    }

    impl ScriptedConnector {
        fn new(script: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                attempts: Mutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> Vec<Instant> {
            self.attempts.lock().unwrap().clone()
        }
    }

    impl Connector for ScriptedConnector {
        fn connect(&self, _url: &Url) -> BoxFuture<'static, Result<FrameStream, Error>> {
            self.attempts.lock().unwrap().push(Instant::now());
            let next = self.script.lock().unwrap().pop_front().unwrap_or(Script::Refuse);

            async move {
                match next {
                    Script::Refuse => Err(Error::WebSocketConnect("connection refused".into())),
                    Script::Stall => std::future::pending().await,
                    Script::Accept(frames) => {
                        Ok(stream::iter(frames.into_iter().map(|f| Ok::<_, Error>(f.to_owned()))).boxed())
                    }
                    Script::Hold(frames) => Ok(stream::iter(
                        frames.into_iter().map(|f| Ok::<_, Error>(f.to_owned())),
                    )
                    .chain(stream::pending())
                    .boxed()),
                }
            }
            .boxed()
        }
    }

    fn url() -> Url {
        Url::parse("ws://127.0.0.1:8000/ws").unwrap()
    }

    fn no_jitter() -> ReconnectConfig {
        ReconnectConfig {
            jitter: 0.0,
            ..ReconnectConfig::default()
        }
    }

    /// Next frame, skipping status transitions.
    async fn next_frame(events: &mut mpsc::UnboundedReceiver<StreamEvent>) -> Option<String> {
        while let Some(event) = events.recv().await {
            if let StreamEvent::Frame(text) = event {
                return Some(text);
            }
        }
        None
    }

    fn gaps(attempts: &[Instant]) -> Vec<Duration> {
        attempts.windows(2).map(|w| w[1] - w[0]).collect()
    }

    // ── Backoff ──────────────────────────────────────────────────────

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!((config.jitter - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn backoff_base_doubles_then_caps() {
        let config = ReconnectConfig::default();
        let secs: Vec<u64> = (0..7)
            .map(|n| backoff_base(n, &config).as_secs())
            .collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 16, 30, 30]);
        assert_eq!(backoff_base(u32::MAX, &config), Duration::from_secs(30));
    }

    #[test]
    fn jitter_extremes_are_twenty_percent() {
        let config = ReconnectConfig::default();
        for n in 0..8 {
            let base = backoff_base(n, &config).as_secs_f64();
            let low = backoff_delay(n, &config, -1.0).as_secs_f64();
            let high = backoff_delay(n, &config, 1.0).as_secs_f64();
            assert!((low - 0.8 * base).abs() < 1e-9, "attempt {n}: {low} vs {base}");
            assert!((high - 1.2 * base).abs() < 1e-9, "attempt {n}: {high} vs {base}");
        }
    }

    #[test]
    fn random_jitter_stays_in_bounds() {
        let config = ReconnectConfig::default();
        for n in 0..12 {
            let base = backoff_base(n, &config).as_secs_f64();
            for _ in 0..200 {
                let d = jittered_backoff(n, &config).as_secs_f64();
                assert!(
                    d >= 0.8 * base - 1e-9 && d <= 1.2 * base + 1e-9,
                    "attempt {n}: delay {d} outside [{}, {}]",
                    0.8 * base,
                    1.2 * base
                );
            }
        }
    }

    #[test]
    fn status_displays_lowercase() {
        assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionStatus::Disconnected.to_string(), "disconnected");
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Connecting);
    }

    // ── Actor ────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn forwards_frames_in_order_and_reports_connected() {
        let connector = ScriptedConnector::new(vec![Script::Hold(vec!["one", "two", "three"])]);
        let (handle, mut frames) =
            ConnectionManager::open_with(url(), no_jitter(), connector.clone(), CancellationToken::new());

        assert_eq!(
            frames.recv().await,
            Some(StreamEvent::Status(ConnectionStatus::Connected))
        );
        assert_eq!(next_frame(&mut frames).await.as_deref(), Some("one"));
        assert_eq!(next_frame(&mut frames).await.as_deref(), Some("two"));
        assert_eq!(next_frame(&mut frames).await.as_deref(), Some("three"));
        assert_eq!(handle.current_status(), ConnectionStatus::Connected);

        handle.close().await;
        assert_eq!(connector.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_exponential_backoff() {
        let connector = ScriptedConnector::new(vec![
            Script::Refuse,
            Script::Refuse,
            Script::Refuse,
            Script::Hold(vec![]),
        ]);
        let (handle, _frames) =
            ConnectionManager::open_with(url(), no_jitter(), connector.clone(), CancellationToken::new());

        tokio::time::sleep(Duration::from_secs(20)).await;

        let attempts = connector.attempts();
        assert_eq!(attempts.len(), 4);
        assert_eq!(
            gaps(&attempts),
            vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
        );
        assert_eq!(handle.current_status(), ConnectionStatus::Connected);
        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_handshake_times_out_and_retries() {
        let connector = ScriptedConnector::new(vec![Script::Stall, Script::Hold(vec![])]);
        let (handle, mut events) =
            ConnectionManager::open_with(url(), no_jitter(), connector.clone(), CancellationToken::new());

        tokio::time::sleep(Duration::from_secs(12)).await;

        let attempts = connector.attempts();
        assert_eq!(attempts.len(), 2);
        // 10s connect timeout, then the 1s first backoff.
        assert_eq!(gaps(&attempts), vec![Duration::from_secs(11)]);
        assert_eq!(
            events.recv().await,
            Some(StreamEvent::Status(ConnectionStatus::Disconnected))
        );
        assert_eq!(
            events.recv().await,
            Some(StreamEvent::Status(ConnectionStatus::Connecting))
        );
        assert_eq!(
            events.recv().await,
            Some(StreamEvent::Status(ConnectionStatus::Connected))
        );
        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn status_transitions_precede_frames_in_channel() {
        let connector = ScriptedConnector::new(vec![Script::Accept(vec!["a"]), Script::Hold(vec!["b"])]);
        let (handle, mut events) =
            ConnectionManager::open_with(url(), no_jitter(), connector, CancellationToken::new());

        let mut seen = Vec::new();
        while seen.len() < 6 {
            seen.push(events.recv().await.unwrap());
        }
        assert_eq!(
            seen,
            vec![
                StreamEvent::Status(ConnectionStatus::Connected),
                StreamEvent::Frame("a".into()),
                StreamEvent::Status(ConnectionStatus::Disconnected),
                StreamEvent::Status(ConnectionStatus::Connecting),
                StreamEvent::Status(ConnectionStatus::Connected),
                StreamEvent::Frame("b".into()),
            ]
        );
        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_resets_after_successful_session() {
        let connector = ScriptedConnector::new(vec![
            Script::Refuse,
            Script::Refuse,
            // Opens, then the peer closes straight away.
            Script::Accept(vec![]),
            Script::Refuse,
            Script::Hold(vec![]),
        ]);
        let (handle, _frames) =
            ConnectionManager::open_with(url(), no_jitter(), connector.clone(), CancellationToken::new());

        tokio::time::sleep(Duration::from_secs(30)).await;

        let attempts = connector.attempts();
        assert_eq!(attempts.len(), 5);
        assert_eq!(
            gaps(&attempts),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                // Successful session resets the exponent.
                Duration::from_secs(1),
                Duration::from_secs(2),
            ]
        );
        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_with_pending_retry_makes_no_further_attempts() {
        let connector = ScriptedConnector::new(vec![Script::Refuse]);
        let (handle, _frames) =
            ConnectionManager::open_with(url(), no_jitter(), connector.clone(), CancellationToken::new());
        let status = handle.status();

        // Let the first attempt fail and the 1s retry get scheduled.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*status.borrow(), ConnectionStatus::Disconnected);

        handle.close().await;
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(connector.attempts().len(), 1);
        assert_eq!(*status.borrow(), ConnectionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_live_transport_without_reconnect() {
        let connector = ScriptedConnector::new(vec![Script::Hold(vec!["tick"])]);
        let cancel = CancellationToken::new();
        let (handle, mut frames) =
            ConnectionManager::open_with(url(), no_jitter(), connector.clone(), cancel.clone());

        assert_eq!(next_frame(&mut frames).await.as_deref(), Some("tick"));
        cancel.cancel();
        handle.close().await;

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(connector.attempts().len(), 1);
        // Teardown is the last thing reported before the channel closes.
        assert_eq!(
            frames.recv().await,
            Some(StreamEvent::Status(ConnectionStatus::Disconnected))
        );
        assert!(frames.recv().await.is_none());
    }

    #[tokio::test]
    async fn connect_is_idempotent_while_transport_is_live() {
        let connector = ScriptedConnector::new(vec![Script::Hold(vec![])]);
        let (mut manager, _status, _frames) =
            ConnectionManager::new(url(), no_jitter(), connector, CancellationToken::new());

        manager.connect();
        manager.connect();

        assert_eq!(manager.generation, 1);
        manager.teardown();
    }

    #[tokio::test]
    async fn stale_generation_events_are_dropped() {
        let connector = ScriptedConnector::new(vec![Script::Hold(vec![])]);
        let (mut manager, status, mut frames) =
            ConnectionManager::new(url(), no_jitter(), connector, CancellationToken::new());

        manager.connect();
        manager.handle(Tagged {
            generation: 0,
            event: TransportEvent::Frame("stale".into()),
        });
        manager.handle(Tagged {
            generation: 0,
            event: TransportEvent::Closed,
        });
        manager.handle(Tagged {
            generation: 1,
            event: TransportEvent::Frame("fresh".into()),
        });

        assert_eq!(frames.try_recv().unwrap(), StreamEvent::Frame("fresh".into()));
        assert!(frames.try_recv().is_err());
        assert_eq!(*status.borrow(), ConnectionStatus::Connecting);
        assert!(manager.retry.is_none());
        manager.teardown();
    }

    #[tokio::test]
    async fn error_then_close_schedules_one_retry() {
        let connector = ScriptedConnector::new(vec![Script::Hold(vec![])]);
        let (mut manager, status, _frames) =
            ConnectionManager::new(url(), no_jitter(), connector, CancellationToken::new());

        manager.connect();
        manager.handle(Tagged {
            generation: 1,
            event: TransportEvent::Opened,
        });
        assert_eq!(*status.borrow(), ConnectionStatus::Connected);

        manager.handle(Tagged {
            generation: 1,
            event: TransportEvent::Failed(Error::WebSocketConnect("reset by peer".into())),
        });
        manager.handle(Tagged {
            generation: 1,
            event: TransportEvent::Closed,
        });

        assert_eq!(manager.attempt, 1);
        assert!(manager.retry.is_some());
        assert!(manager.transport.is_none());
        assert_eq!(*status.borrow(), ConnectionStatus::Disconnected);
        manager.teardown();
    }
}
