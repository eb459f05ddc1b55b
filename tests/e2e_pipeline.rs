//! E2E tests for the detection pipeline and live feed client.
//!
//! Stands up an in-process mock backend (report ingestion + WebSocket
//! broadcast) and drives the real components against it: exactly-one
//! report per cooldown window, silence for quiet streams, feed delivery,
//! reconnect after a server-side drop, and deterministic shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;

use quakesense::config::{DetectorConfig, FeedConfig, ReportConfig};
use quakesense::feed::{ConnectionState, LiveFeedClient};
use quakesense::location::NoLocation;
use quakesense::models::EarthquakeEvent;
use quakesense::monitor::MonitorSession;
use quakesense::report::{BackendClient, ReportGateway};
use quakesense::sampler::spawn_replay;

/// Control message that makes the mock server drop the socket.
const DROP_SENTINEL: &str = "__drop__";

#[derive(Clone)]
struct MockBackend {
    reports: Arc<AtomicUsize>,
    feed_tx: broadcast::Sender<String>,
}

async fn report_handler(
    State(state): State<MockBackend>,
    Json(_report): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    state.reports.fetch_add(1, Ordering::SeqCst);
    Json(serde_json::json!({
        "cluster_id": 1,
        "cluster_size": 3,
        "is_likely_earthquake": true,
        "reported_at": "2025-06-01T12:00:00Z"
    }))
}

async fn ws_handler(State(state): State<MockBackend>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| feed_session(socket, state))
}

async fn feed_session(mut socket: WebSocket, state: MockBackend) {
    let mut rx = state.feed_tx.subscribe();
    while let Ok(text) = rx.recv().await {
        if text == DROP_SENTINEL {
            break;
        }
        if socket.send(WsMessage::Text(text.into())).await.is_err() {
            break;
        }
    }
}

async fn start_mock_backend() -> (MockBackend, String, String) {
    let (feed_tx, _) = broadcast::channel(100);
    let state = MockBackend {
        reports: Arc::new(AtomicUsize::new(0)),
        feed_tx,
    };

    let app = Router::new()
        .route("/api/v1/seismic/report", post(report_handler))
        .route("/ws/earthquakes", get(ws_handler))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock backend");
    let addr = listener.local_addr().expect("failed to read local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (
        state,
        format!("http://{addr}"),
        format!("ws://{addr}/ws/earthquakes"),
    )
}

fn test_detector_config() -> DetectorConfig {
    DetectorConfig {
        sample_rate_hz: 10.0,
        sta_window_secs: 0.2,
        lta_window_secs: 1.0,
        ..DetectorConfig::default()
    }
}

fn session_against(http_url: &str, report_config: ReportConfig) -> MonitorSession {
    let client = Arc::new(BackendClient::new(http_url).expect("failed to build client"));
    let gateway = ReportGateway::new(
        client,
        report_config,
        "device-e2e".into(),
        Arc::new(NoLocation),
    );
    MonitorSession::new(&test_detector_config(), gateway).expect("failed to build session")
}

fn sample_lines(value: f64, count: usize) -> String {
    format!("{{\"x\": {value}, \"y\": 0.0, \"z\": 0.0}}\n").repeat(count)
}

async fn run_session_over(session: &mut MonitorSession, data: String) {
    let reader = tokio::io::BufReader::new(std::io::Cursor::new(data.into_bytes()));
    let mut handle = spawn_replay(reader, None);
    session.run(&mut handle).await;
}

async fn wait_for_reports(backend: &MockBackend, want: usize) {
    timeout(Duration::from_secs(5), async {
        loop {
            if backend.reports.load(Ordering::SeqCst) >= want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("backend never received the expected reports");
}

#[tokio::test]
async fn test_quiet_stream_sends_no_reports() {
    let (backend, http_url, _ws_url) = start_mock_backend().await;
    let mut session = session_against(&http_url, ReportConfig::default());

    run_session_over(&mut session, sample_lines(0.0, 150)).await;

    assert_eq!(session.stats().triggers, 0);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.reports.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_two_bursts_inside_cooldown_report_once() {
    let (backend, http_url, _ws_url) = start_mock_backend().await;
    let mut session = session_against(
        &http_url,
        ReportConfig {
            min_peak_acceleration: 0.5,
            cooldown: Duration::from_secs(60),
        },
    );

    // Two strong bursts separated by a quiet spell, all well inside one
    // cooldown window: exactly one report may go out.
    let mut data = String::new();
    data.push_str(&sample_lines(1.0, 30));
    data.push_str(&sample_lines(10.0, 20));
    data.push_str(&sample_lines(1.0, 30));
    data.push_str(&sample_lines(10.0, 20));

    run_session_over(&mut session, data).await;

    let stats = session.stats();
    assert!(stats.triggers >= 2, "expected both bursts to trigger");
    assert_eq!(stats.reports_dispatched, 1);
    assert_eq!(stats.reports_suppressed, stats.triggers - 1);

    wait_for_reports(&backend, 1).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        backend.reports.load(Ordering::SeqCst),
        1,
        "cooldown must hold the second report back"
    );
}

#[tokio::test]
async fn test_zero_cooldown_reports_every_burst() {
    let (backend, http_url, _ws_url) = start_mock_backend().await;
    let mut session = session_against(
        &http_url,
        ReportConfig {
            min_peak_acceleration: 0.5,
            cooldown: Duration::ZERO,
        },
    );

    let mut data = String::new();
    data.push_str(&sample_lines(1.0, 30));
    data.push_str(&sample_lines(10.0, 20));
    data.push_str(&sample_lines(1.0, 30));
    data.push_str(&sample_lines(10.0, 20));

    run_session_over(&mut session, data).await;

    let stats = session.stats();
    assert!(stats.triggers >= 2);
    assert_eq!(stats.reports_dispatched, stats.triggers);
    wait_for_reports(&backend, stats.reports_dispatched as usize).await;
}

fn event_json(id: &str) -> String {
    format!(
        r#"{{"id": "{id}", "source": "test", "magnitude": 4.5, "depth": 10.0,
            "latitude": 39.0, "longitude": 28.0, "location": "Test Region",
            "occurred_at": "2025-06-01T00:00:00Z"}}"#
    )
}

/// Broadcast a payload until the subscriber sees the wanted event.
///
/// The mock server's per-connection task subscribes some time after the
/// client reports `Open`, so a single send can race it; retrying keeps
/// the test deterministic without fixed sleeps.
async fn send_until_received(
    backend: &MockBackend,
    events: &mut broadcast::Receiver<EarthquakeEvent>,
    payload: String,
    want_id: &str,
) -> EarthquakeEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            let _ = backend.feed_tx.send(payload.clone());
            match timeout(Duration::from_millis(100), events.recv()).await {
                Ok(Ok(event)) if event.id == want_id => return event,
                _ => {}
            }
        }
    })
    .await
    .expect("event never delivered")
}

async fn wait_for_state(
    state: &mut tokio::sync::watch::Receiver<ConnectionState>,
    want: ConnectionState,
) {
    timeout(Duration::from_secs(5), async {
        loop {
            if *state.borrow_and_update() == want {
                return;
            }
            state
                .changed()
                .await
                .expect("state channel closed while waiting");
        }
    })
    .await
    .expect("timed out waiting for connection state");
}

#[tokio::test]
async fn test_feed_delivers_reconnects_and_stops_cleanly() {
    let (backend, _http_url, ws_url) = start_mock_backend().await;
    let config = FeedConfig {
        url: ws_url,
        initial_retry_delay: Duration::from_millis(200),
        max_retry_delay: Duration::from_secs(1),
    };
    let mut client = LiveFeedClient::new(config);
    let mut events = client.subscribe();
    let mut state = client.state();
    client.start();

    wait_for_state(&mut state, ConnectionState::Open).await;

    // A second start while connected is a no-op
    client.start();

    // Garbage on the wire must not cost the connection
    let _ = backend.feed_tx.send("definitely not json".to_string());
    let event = send_until_received(&backend, &mut events, event_json("eq-1"), "eq-1").await;
    assert_eq!(event.id, "eq-1");
    assert!((event.magnitude - 4.5).abs() < 1e-9);
    assert_eq!(*state.borrow(), ConnectionState::Open);

    // Server-side drop: the client must notice and reconnect on its own
    let _ = backend.feed_tx.send(DROP_SENTINEL.to_string());
    wait_for_state(&mut state, ConnectionState::Closed).await;
    wait_for_state(&mut state, ConnectionState::Open).await;

    // The backend envelope form decodes too, over the new connection
    let wrapped = format!(r#"{{"type": "NEW_EARTHQUAKE", "data": {}}}"#, event_json("eq-2"));
    let event = send_until_received(&backend, &mut events, wrapped, "eq-2").await;
    assert_eq!(event.id, "eq-2");

    // Shutdown is deterministic and final
    timeout(Duration::from_secs(5), client.stop())
        .await
        .expect("stop must return promptly");
    assert_eq!(*state.borrow(), ConnectionState::Closed);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
        *state.borrow(),
        ConnectionState::Closed,
        "no reconnect may fire after stop"
    );
}

#[tokio::test]
async fn test_stop_cancels_pending_reconnect() {
    // Nothing listens here: the client lives in its retry loop
    let config = FeedConfig {
        url: "ws://127.0.0.1:9/ws/earthquakes".to_string(),
        initial_retry_delay: Duration::from_secs(5),
        max_retry_delay: Duration::from_secs(30),
    };
    let mut client = LiveFeedClient::new(config);
    let mut state = client.state();
    client.start();

    // Let the first connect fail and the backoff sleep begin
    tokio::time::sleep(Duration::from_millis(300)).await;

    timeout(Duration::from_secs(1), client.stop())
        .await
        .expect("stop must cancel the pending retry");
    assert_eq!(*state.borrow_and_update(), ConnectionState::Closed);
}
