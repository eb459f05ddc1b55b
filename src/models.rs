//! Data models for the detection pipeline and backend wire formats.
//!
//! The report/confirmation shapes match the backend's seismic ingestion
//! endpoint; the feed event shape matches the live broadcast channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::QuakeError;

/// One raw tri-axial accelerometer sample in m/s².
///
/// Ephemeral: consumed by the filter stage as soon as it arrives.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RawSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl RawSample {
    /// Vector magnitude `sqrt(x² + y² + z²)`.
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// A single device's shake report, sent once per accepted trigger.
///
/// Location is best-effort: `None` when no position is available, the
/// backend clusters location-free reports by device and time regardless.
#[derive(Debug, Clone, Serialize)]
pub struct ShakeReport {
    pub device_id: String,
    pub peak_acceleration: f64,
    pub sta_lta_ratio: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Backend response to a shake report: cluster correlation metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfirmation {
    pub cluster_id: Option<i64>,
    pub cluster_size: u32,
    pub is_likely_earthquake: bool,
    pub reported_at: DateTime<Utc>,
}

/// An earthquake record from the live feed or a confirmation push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarthquakeEvent {
    /// Unique event ID (stable dedup key)
    pub id: String,

    /// Originating catalog/network
    pub source: String,

    /// Magnitude value
    pub magnitude: f64,

    /// Depth in kilometers (positive down)
    pub depth: f64,

    /// Epicenter latitude (degrees)
    pub latitude: f64,

    /// Epicenter longitude (degrees)
    pub longitude: f64,

    /// Human-readable place description
    pub location: String,

    /// Event origin time
    pub occurred_at: DateTime<Utc>,
}

impl EarthquakeEvent {
    /// Validate the event structure.
    pub fn validate(&self) -> Result<(), QuakeError> {
        if self.id.is_empty() {
            return Err(QuakeError::Validation("empty event ID".into()));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(QuakeError::Validation(format!(
                "latitude {} out of range [-90, 90]",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(QuakeError::Validation(format!(
                "longitude {} out of range [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }
}

/// One detected trigger from an offline scan, relative to stream start.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerRecord {
    /// Seconds from the first sample to the triggering sample
    pub offset_secs: f64,

    /// Raw vector magnitude at the trigger sample (m/s²)
    pub peak_acceleration: f64,

    /// STA/LTA ratio at the trigger sample
    pub sta_lta_ratio: f64,
}
