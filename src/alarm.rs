//! Confirmation-push alarm dispatch.
//!
//! The backend confirms an earthquake out-of-band through a push data
//! payload, delivered whether or not a live feed connection exists. The
//! dispatcher type-gates the payload, renders a maximum-urgency full-screen
//! notification through the `AlarmSink` capability, then tries to force
//! device volume to maximum. Volume is strictly best-effort: its failure
//! must never cost the notification.

use std::io::Write;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::QuakeError;

/// Payload type value that identifies a confirmed earthquake.
pub const CONFIRMATION_TYPE: &str = "EARTHQUAKE_CONFIRMED";

// ANSI codes for the console alarm surface
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const ALERT_RED: &str = "\x1b[41;97m"; // Red background, bright white text
const BELL: &str = "\x07";

/// Push data payload for a confirmed earthquake.
///
/// Push transports deliver data payloads as string maps, so every field
/// except `type` is an optional string.
#[derive(Debug, Clone, Deserialize)]
pub struct AlarmPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub timestamp: Option<String>,
    pub device_count: Option<String>,
}

/// A rendered alarm, ready for the notification surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmNotification {
    pub title: String,
    pub body: String,
    /// Request an interrupting full-screen presentation, not a banner
    pub full_screen: bool,
}

/// Device notification surface.
pub trait AlarmSink {
    /// Present the alarm to the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface rejects the notification.
    fn deliver(&mut self, notification: &AlarmNotification) -> Result<(), QuakeError>;
}

/// Device output volume control.
pub trait VolumeOverride {
    /// Push media volume to maximum for the duration of the alert.
    ///
    /// # Errors
    ///
    /// Returns an error when the platform withholds volume control.
    fn raise_to_max(&mut self) -> Result<(), QuakeError>;
}

/// What the dispatcher did with a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Alarm delivered to the notification surface
    Raised,
    /// Payload type was not a confirmation; nothing shown
    Ignored,
    /// Payload could not be parsed; nothing shown
    Malformed,
}

/// Turns confirmation pushes into unmissable alarms.
pub struct AlarmDispatcher<S, V> {
    sink: S,
    volume: V,
}

impl<S: AlarmSink, V: VolumeOverride> AlarmDispatcher<S, V> {
    #[must_use]
    pub fn new(sink: S, volume: V) -> Self {
        Self { sink, volume }
    }

    /// Handle one raw push payload (JSON text).
    pub fn dispatch(&mut self, payload_json: &str) -> DispatchOutcome {
        let payload: AlarmPayload = match serde_json::from_str(payload_json) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("discarding unparseable push payload: {e}");
                return DispatchOutcome::Malformed;
            }
        };
        self.dispatch_payload(&payload)
    }

    /// Handle one already-decoded push payload.
    pub fn dispatch_payload(&mut self, payload: &AlarmPayload) -> DispatchOutcome {
        if payload.kind != CONFIRMATION_TYPE {
            debug!(kind = %payload.kind, "ignoring non-confirmation push");
            return DispatchOutcome::Ignored;
        }

        let notification = build_notification(payload);
        if let Err(e) = self.sink.deliver(&notification) {
            warn!("alarm delivery failed: {e}");
        }

        // Best-effort only; a muted device losing this is acceptable,
        // a missing notification is not.
        if let Err(e) = self.volume.raise_to_max() {
            debug!("volume override unavailable: {e}");
        }

        DispatchOutcome::Raised
    }
}

/// Render the notification body from whatever fields the push carried.
fn build_notification(payload: &AlarmPayload) -> AlarmNotification {
    let latitude = payload.latitude.as_deref().unwrap_or("?");
    let longitude = payload.longitude.as_deref().unwrap_or("?");
    let timestamp = payload
        .timestamp
        .clone()
        .unwrap_or_else(|| Utc::now().to_rfc3339());

    let body = match payload.device_count.as_deref() {
        Some(count) => {
            format!("Location: {latitude}, {longitude} | {timestamp} | {count} devices reporting")
        }
        None => format!("Location: {latitude}, {longitude} | {timestamp}"),
    };

    AlarmNotification {
        title: "Earthquake confirmed".to_string(),
        body,
        full_screen: true,
    }
}

/// Terminal notification surface: red full-width banner plus bell.
pub struct ConsoleAlarmSink<W: Write> {
    writer: W,
}

impl<W: Write> ConsoleAlarmSink<W> {
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> AlarmSink for ConsoleAlarmSink<W> {
    fn deliver(&mut self, notification: &AlarmNotification) -> Result<(), QuakeError> {
        writeln!(
            self.writer,
            "{BELL}{ALERT_RED}{BOLD}  ⚠ {}  {RESET}",
            notification.title
        )?;
        writeln!(self.writer, "{ALERT_RED}  {}  {RESET}", notification.body)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Console stand-in for the platform volume API.
///
/// The real surface is a platform audio manager; here raising the volume
/// just logs, and a disabled control reports the capability as missing.
pub struct ConsoleVolume {
    enabled: bool,
}

impl ConsoleVolume {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl VolumeOverride for ConsoleVolume {
    fn raise_to_max(&mut self) -> Result<(), QuakeError> {
        if !self.enabled {
            return Err(QuakeError::Validation(
                "volume control disabled".to_string(),
            ));
        }
        debug!("media volume raised to maximum for alarm");
        Ok(())
    }
}
