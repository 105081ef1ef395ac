#![allow(clippy::unwrap_used)]
// End-to-end tests for `ConnectionManager` against a local tungstenite server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::SinkExt;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use sentinel_api::{ConnectionManager, ConnectionStatus, ReconnectConfig, StreamEvent, decode};

// ── Helpers ─────────────────────────────────────────────────────────

fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
        jitter: 0.2,
        connect_timeout: Duration::from_millis(500),
    }
}

async fn wait_for(status: &mut watch::Receiver<ConnectionStatus>, want: ConnectionStatus) {
    tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| *s == want))
        .await
        .expect("timed out waiting for status")
        .unwrap();
}

/// Accept `sessions.len()` connections in turn; each sends its frames and
/// then closes cleanly.
async fn serve(sessions: Vec<Vec<String>>) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for frames in sessions {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            for frame in frames {
                ws.send(Message::text(frame)).await.unwrap();
            }
            ws.close(None).await.unwrap();
        }
        // Keep the listener alive so later attempts hang instead of failing.
        std::future::pending::<()>().await;
    });

    Url::parse(&format!("ws://{addr}/ws")).unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_frames_survive_reconnect_in_order() {
    let metrics = |pps: f64| {
        serde_json::json!({
            "event": "metrics",
            "data": {
                "total_packets": 10,
                "packets_per_protocol": {},
                "packets_per_source_ip": {},
                "packets_per_destination_ip": {},
                "packets_per_second": pps
            }
        })
        .to_string()
    };
    let url = serve(vec![vec![metrics(1.0), metrics(2.0)], vec![metrics(3.0)]]).await;
    let (handle, mut frames) =
        ConnectionManager::open(url, fast_reconnect(), CancellationToken::new());

    let mut received = Vec::new();
    while received.len() < 3 {
        let event = tokio::time::timeout(Duration::from_secs(5), frames.recv())
            .await
            .expect("timed out waiting for frame")
            .unwrap();
        if let StreamEvent::Frame(frame) = event {
            received.push(decode(&frame).unwrap());
        }
    }

    let pps: Vec<f64> = received
        .into_iter()
        .map(|event| match event {
            sentinel_api::Event::Metrics(m) => m.packets_per_second,
            sentinel_api::Event::AlertReceived(_) => panic!("unexpected alert"),
        })
        .collect();
    assert_eq!(pps, vec![1.0, 2.0, 3.0]);

    handle.close().await;
}

#[tokio::test]
async fn test_status_follows_session_lifecycle() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (close_tx, close_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        close_rx.await.unwrap();
        ws.close(None).await.unwrap();
        // Later handshakes sit in the backlog and never complete.
        std::future::pending::<()>().await;
    });

    let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
    let (handle, _frames) =
        ConnectionManager::open(url, fast_reconnect(), CancellationToken::new());
    let mut status = handle.status();

    wait_for(&mut status, ConnectionStatus::Connected).await;
    close_tx.send(()).unwrap();
    wait_for(&mut status, ConnectionStatus::Disconnected).await;
    wait_for(&mut status, ConnectionStatus::Connecting).await;

    handle.close().await;
    assert_eq!(*status.borrow(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_refused_connection_reports_disconnected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
    let (handle, _frames) = ConnectionManager::open(url, fast_reconnect(), CancellationToken::new());
    let mut status = handle.status();

    wait_for(&mut status, ConnectionStatus::Disconnected).await;

    handle.close().await;
}

#[tokio::test]
async fn test_silent_peer_hits_connect_timeout_and_retries() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));

    // Accept TCP and never answer the upgrade.
    let counter = Arc::clone(&accepts);
    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            let (tcp, _) = listener.accept().await.unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(tcp);
        }
    });

    let config = ReconnectConfig {
        connect_timeout: Duration::from_millis(200),
        ..fast_reconnect()
    };
    let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
    let (handle, _frames) = ConnectionManager::open(url, config, CancellationToken::new());
    let mut status = handle.status();

    wait_for(&mut status, ConnectionStatus::Disconnected).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while accepts.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("no second handshake attempt");

    handle.close().await;
}
