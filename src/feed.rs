//! Live earthquake feed client.
//!
//! Keeps one long-lived WebSocket to the backend broadcast channel open,
//! reconnecting with capped exponential backoff. Inbound events fan out
//! through a broadcast channel; connection state is published through a
//! watch channel. Exactly one connection attempt is ever outstanding: the
//! whole lifecycle lives on a single spawned task.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::models::EarthquakeEvent;

/// Capacity of the fan-out event channel.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Default capacity of the in-memory recent-events list.
const EVENT_LOG_CAPACITY: usize = 100;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state of the live feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// Next delay in the backoff schedule: double, capped at `max`.
///
/// The current delay is consumed by the sleep before this is applied, so
/// consecutive failures wait `d, 2d, 4d, ...` up to the cap.
#[must_use]
pub fn next_retry_delay(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}

/// Result of one connection's read loop.
enum SessionEnd {
    /// Remote close or transport error; reconnect applies
    ConnectionLost,
    /// Local shutdown requested; no reconnect
    ShutDown,
}

/// Client for the backend's live earthquake WebSocket broadcast.
pub struct LiveFeedClient {
    config: FeedConfig,
    events_tx: broadcast::Sender<EarthquakeEvent>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl LiveFeedClient {
    #[must_use]
    pub fn new(config: FeedConfig) -> Self {
        let (events_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, _state_rx) = watch::channel(ConnectionState::Closed);
        Self {
            config,
            events_tx,
            state_tx: Arc::new(state_tx),
            shutdown_tx: None,
            task: None,
        }
    }

    /// Subscribe to the stream of newly received events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EarthquakeEvent> {
        self.events_tx.subscribe()
    }

    /// Observe connection state changes.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Ensure the feed task is running. A no-op while a task is already
    /// connecting or connected.
    pub fn start(&mut self) {
        if self.task.is_some() {
            debug!("live feed already running, start is a no-op");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = self.config.clone();
        let events = self.events_tx.clone();
        let state = Arc::clone(&self.state_tx);
        let task = tokio::spawn(run_feed(config, events, state, shutdown_rx));

        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
    }

    /// Shut the feed down deterministically: cancels any pending retry,
    /// closes the active connection, and waits for the task to finish.
    /// No reconnect fires after this returns.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Connection lifecycle task: connect, read until closed, back off, repeat.
async fn run_feed(
    config: FeedConfig,
    events: broadcast::Sender<EarthquakeEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut delay = config.initial_retry_delay;

    loop {
        if *shutdown.borrow() {
            break;
        }

        state.send_replace(ConnectionState::Connecting);
        debug!("connecting to live feed at {}", config.url);

        tokio::select! {
            _ = shutdown.changed() => break,
            connected = connect_async(config.url.as_str()) => match connected {
                Ok((stream, _response)) => {
                    info!("live feed connected");
                    state.send_replace(ConnectionState::Open);
                    // A successful open resets the backoff schedule
                    delay = config.initial_retry_delay;

                    let end = read_until_closed(stream, &events, &mut shutdown).await;
                    state.send_replace(ConnectionState::Closed);
                    if matches!(end, SessionEnd::ShutDown) {
                        return;
                    }
                    warn!("live feed connection lost, retrying in {delay:?}");
                }
                Err(e) => {
                    state.send_replace(ConnectionState::Closed);
                    warn!("live feed connect failed, retrying in {delay:?}: {e}");
                }
            }
        }

        // Backoff sleep, cancelled immediately by shutdown
        tokio::select! {
            _ = shutdown.changed() => break,
            () = tokio::time::sleep(delay) => {}
        }
        delay = next_retry_delay(delay, config.max_retry_delay);
    }

    state.send_replace(ConnectionState::Closed);
}

/// Pump messages off an open connection until it closes or shutdown hits.
async fn read_until_closed(
    mut stream: WsStream,
    events: &broadcast::Sender<EarthquakeEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = stream.close(None).await;
                return SessionEnd::ShutDown;
            }
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => match decode_feed_message(text.as_str()) {
                    Some(event) => {
                        debug!(id = %event.id, magnitude = event.magnitude, "feed event received");
                        let _ = events.send(event);
                    }
                    None => debug!("discarding malformed feed payload"),
                },
                Some(Ok(Message::Close(_))) | None => return SessionEnd::ConnectionLost,
                Some(Ok(_)) => {} // ping/pong/binary keepalive traffic
                Some(Err(e)) => {
                    warn!("live feed transport error: {e}");
                    return SessionEnd::ConnectionLost;
                }
            }
        }
    }
}

/// Backend envelope around a broadcast event.
#[derive(Deserialize)]
#[serde(tag = "type")]
enum FeedEnvelope {
    #[serde(rename = "NEW_EARTHQUAKE")]
    NewEarthquake { data: EarthquakeEvent },
}

/// Decode one inbound text frame into an event.
///
/// Accepts either a bare `EarthquakeEvent` object or the backend envelope
/// `{"type": "NEW_EARTHQUAKE", "data": {...}}`. Anything else (keepalive
/// acks, unknown types, invalid coordinates, broken JSON) is discarded.
fn decode_feed_message(text: &str) -> Option<EarthquakeEvent> {
    let event = if let Ok(event) = serde_json::from_str::<EarthquakeEvent>(text) {
        event
    } else {
        match serde_json::from_str::<FeedEnvelope>(text) {
            Ok(FeedEnvelope::NewEarthquake { data }) => data,
            Err(_) => return None,
        }
    };
    event.validate().ok()?;
    Some(event)
}

/// Bounded in-memory list of the most recent feed events.
#[derive(Debug)]
pub struct EventLog {
    events: VecDeque<EarthquakeEvent>,
    capacity: usize,
}

impl EventLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(EVENT_LOG_CAPACITY)
    }

    /// Append an event, evicting the oldest when full.
    pub fn push(&mut self, event: EarthquakeEvent) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
        debug_assert!(self.events.len() <= self.capacity);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Most recently received event.
    #[must_use]
    pub fn latest(&self) -> Option<&EarthquakeEvent> {
        self.events.back()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_backoff_schedule() {
        // Delays used between consecutive failures: d, 2d, 4d, ..., capped
        let max = Duration::from_secs(30);
        let mut delay = Duration::from_secs(1);
        let mut used = Vec::new();
        for _ in 0..7 {
            used.push(delay);
            delay = next_retry_delay(delay, max);
        }
        let expected: Vec<Duration> =
            [1, 2, 4, 8, 16, 30, 30].iter().map(|&s| Duration::from_secs(s)).collect();
        assert_eq!(used, expected);
    }

    #[test]
    fn test_backoff_is_monotone_until_cap() {
        let max = Duration::from_secs(30);
        let mut delay = Duration::from_millis(250);
        for _ in 0..20 {
            let next = next_retry_delay(delay, max);
            assert!(next >= delay);
            assert!(next <= max);
            delay = next;
        }
        assert_eq!(delay, max);
    }

    fn sample_event_json() -> String {
        r#"{
            "id": "eq-42",
            "source": "afad",
            "magnitude": 4.7,
            "depth": 7.0,
            "latitude": 40.8,
            "longitude": 29.1,
            "location": "Marmara Sea",
            "occurred_at": "2025-06-01T03:00:00Z"
        }"#
        .to_string()
    }

    #[test]
    fn test_decode_bare_event() {
        let event = decode_feed_message(&sample_event_json()).expect("bare event must decode");
        assert_eq!(event.id, "eq-42");
    }

    #[test]
    fn test_decode_enveloped_event() {
        let wrapped = format!(r#"{{"type": "NEW_EARTHQUAKE", "data": {}}}"#, sample_event_json());
        let event = decode_feed_message(&wrapped).expect("enveloped event must decode");
        assert_eq!(event.id, "eq-42");
    }

    #[test]
    fn test_decode_discards_noise() {
        assert!(decode_feed_message("not json at all").is_none());
        assert!(decode_feed_message(r#"{"type": "PONG"}"#).is_none());
        assert!(decode_feed_message(r#"{"type": "SET_FILTER", "regions": []}"#).is_none());
        assert!(decode_feed_message("{}").is_none());
    }

    #[test]
    fn test_decode_discards_invalid_coordinates() {
        let bad = sample_event_json().replace("40.8", "400.8");
        assert!(decode_feed_message(&bad).is_none());
    }

    #[test]
    fn test_event_log_bounded() {
        let mut log = EventLog::new(3);
        for n in 0..5 {
            log.push(EarthquakeEvent {
                id: format!("eq-{n}"),
                source: "test".into(),
                magnitude: 3.0,
                depth: 5.0,
                latitude: 0.0,
                longitude: 0.0,
                location: "test".into(),
                occurred_at: Utc::now(),
            });
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.latest().map(|e| e.id.as_str()), Some("eq-4"));
    }
}
