//! Device location capability.
//!
//! The report gateway reads a last-known position through the
//! `LocationProvider` seam; a missing position is normal and a report is
//! still sent without coordinates.

use std::str::FromStr;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl FromStr for GeoPoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 2 {
            return Err(format!(
                "location requires 2 values (lat,lon), got {}",
                parts.len()
            ));
        }

        let vals: Result<Vec<f64>, _> = parts.iter().map(|p| p.trim().parse::<f64>()).collect();
        let vals = vals.map_err(|e| format!("invalid number in location: {e}"))?;

        let point = Self {
            latitude: vals[0],
            longitude: vals[1],
        };

        // Validate ranges
        if point.latitude < -90.0 || point.latitude > 90.0 {
            return Err(format!(
                "latitude {} out of range [-90, 90]",
                point.latitude
            ));
        }
        if point.longitude < -180.0 || point.longitude > 180.0 {
            return Err(format!(
                "longitude {} out of range [-180, 180]",
                point.longitude
            ));
        }

        Ok(point)
    }
}

/// Read-only source of the most recently known device position.
pub trait LocationProvider: Send + Sync {
    /// Last known position, if any.
    fn last_known(&self) -> Option<GeoPoint>;
}

/// A provider pinned to one configured position.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    point: GeoPoint,
}

impl FixedLocation {
    #[must_use]
    pub fn new(point: GeoPoint) -> Self {
        Self { point }
    }
}

impl LocationProvider for FixedLocation {
    fn last_known(&self) -> Option<GeoPoint> {
        Some(self.point)
    }
}

/// A provider for devices without location permission or hardware.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl LocationProvider for NoLocation {
    fn last_known(&self) -> Option<GeoPoint> {
        None
    }
}
