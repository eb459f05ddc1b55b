//! Recursive single-pole filters for the sensor pipeline.
//!
//! Two linear recursions, kept as pure functions so each is deterministic
//! under test:
//! - high-pass: rejects the near-DC component from gravity and sustained
//!   handling motion while passing oscillatory seismic-band energy;
//! - low-pass: exponential smoothing, used upstream of magnitude
//!   computation to blunt isolated shock impulses such as device drops.

use crate::models::RawSample;

/// Single-pole recursive high-pass step.
///
/// `filtered_n = alpha * (filtered_{n-1} + raw_n - raw_{n-1})`
#[inline]
#[must_use]
pub fn high_pass(raw: f64, prev_raw: f64, prev_filtered: f64, alpha: f64) -> f64 {
    alpha * (prev_filtered + raw - prev_raw)
}

/// Exponential low-pass step.
///
/// `filtered = alpha * prev + (1 - alpha) * raw`
#[inline]
#[must_use]
pub fn low_pass(prev: f64, raw: f64, alpha: f64) -> f64 {
    alpha * prev + (1.0 - alpha) * raw
}

/// Scalar high-pass filter state carried across samples.
#[derive(Debug, Clone, Default)]
pub struct HighPassFilter {
    alpha: f64,
    prev_raw: f64,
    prev_filtered: f64,
}

impl HighPassFilter {
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            prev_raw: 0.0,
            prev_filtered: 0.0,
        }
    }

    /// Advance the filter by one sample and return the filtered value.
    pub fn apply(&mut self, raw: f64) -> f64 {
        let filtered = high_pass(raw, self.prev_raw, self.prev_filtered, self.alpha);
        self.prev_raw = raw;
        self.prev_filtered = filtered;
        filtered
    }
}

/// Tri-axial low-pass filter state, smoothing each axis independently.
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    alpha: f64,
    prev: RawSample,
}

impl LowPassFilter {
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            prev: RawSample {
                x: 0.0,
                y: 0.0,
                z: 0.0,
            },
        }
    }

    /// Advance the filter by one sample and return the smoothed sample.
    pub fn apply(&mut self, raw: &RawSample) -> RawSample {
        let smoothed = RawSample {
            x: low_pass(self.prev.x, raw.x, self.alpha),
            y: low_pass(self.prev.y, raw.y, self.alpha),
            z: low_pass(self.prev.z, raw.z, self.alpha),
        };
        self.prev = smoothed;
        smoothed
    }
}
