//! Tunable configuration for the detection pipeline, report gateway, and
//! live feed client.
//!
//! Defaults follow the field-tuned constants of the deployed client:
//! 50 Hz sampling, 1 s / 10 s STA/LTA windows, 3.0 / 1.5 hysteresis band.
//! All invariants are checked once at startup via `validate()`; a
//! misconfiguration is a hard error, never a runtime surprise.

use std::time::Duration;

use crate::errors::QuakeError;

/// Configuration for the filter stage and STA/LTA trigger engine.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Accelerometer sampling rate (Hz).
    pub sample_rate_hz: f64,

    /// Short-term window length (seconds). Typical: 1.0.
    pub sta_window_secs: f64,

    /// Long-term window length (seconds). Typical: 10.0.
    /// Also the warm-up period: no trigger can fire before one full
    /// long window of samples has been observed.
    pub lta_window_secs: f64,

    /// STA/LTA ratio at or above which the engine triggers.
    pub trigger_ratio: f64,

    /// STA/LTA ratio below which a triggered engine releases.
    /// Must be strictly less than `trigger_ratio` (hysteresis band).
    pub detrigger_ratio: f64,

    /// High-pass filter coefficient in (0,1). Rejects gravity and slow
    /// handling drift. Typical: 0.9.
    pub highpass_alpha: f64,

    /// Optional low-pass smoothing coefficient in (0,1), applied per axis
    /// before magnitude computation to blunt drop impulses. `None` disables
    /// the smoothing stage.
    pub lowpass_alpha: Option<f64>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 50.0,
            sta_window_secs: 1.0,
            lta_window_secs: 10.0,
            trigger_ratio: 3.0,
            detrigger_ratio: 1.5,
            highpass_alpha: 0.9,
            lowpass_alpha: None,
        }
    }
}

impl DetectorConfig {
    /// Short window length in samples.
    #[must_use]
    pub fn sta_samples(&self) -> usize {
        window_samples(self.sta_window_secs, self.sample_rate_hz)
    }

    /// Long window length in samples.
    #[must_use]
    pub fn lta_samples(&self) -> usize {
        window_samples(self.lta_window_secs, self.sample_rate_hz)
    }

    /// Check all detector invariants.
    ///
    /// # Errors
    ///
    /// Returns `QuakeError::Config` naming the violated invariant.
    pub fn validate(&self) -> Result<(), QuakeError> {
        if !(self.sample_rate_hz > 0.0) {
            return Err(QuakeError::Config(format!(
                "sample rate must be positive, got {}",
                self.sample_rate_hz
            )));
        }
        if self.sta_samples() == 0 {
            return Err(QuakeError::Config(format!(
                "STA window of {}s holds no samples at {} Hz",
                self.sta_window_secs, self.sample_rate_hz
            )));
        }
        if self.sta_samples() >= self.lta_samples() {
            return Err(QuakeError::Config(format!(
                "STA window ({} samples) must be shorter than LTA window ({} samples)",
                self.sta_samples(),
                self.lta_samples()
            )));
        }
        if self.trigger_ratio <= self.detrigger_ratio {
            return Err(QuakeError::Config(format!(
                "trigger ratio {} must be strictly greater than detrigger ratio {}",
                self.trigger_ratio, self.detrigger_ratio
            )));
        }
        check_alpha("high-pass", self.highpass_alpha)?;
        if let Some(alpha) = self.lowpass_alpha {
            check_alpha("low-pass", alpha)?;
        }
        Ok(())
    }
}

/// Configuration for the report gateway.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Minimum peak acceleration (m/s²) a trigger must reach before a
    /// report is worth sending.
    pub min_peak_acceleration: f64,

    /// Hard rate limit between two dispatched reports. Triggers inside
    /// the window are suppressed, not queued.
    pub cooldown: Duration,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            min_peak_acceleration: 0.5,
            cooldown: Duration::from_secs(30),
        }
    }
}

impl ReportConfig {
    /// Check report gateway invariants.
    ///
    /// # Errors
    ///
    /// Returns `QuakeError::Config` naming the violated invariant.
    pub fn validate(&self) -> Result<(), QuakeError> {
        if self.min_peak_acceleration < 0.0 {
            return Err(QuakeError::Config(format!(
                "minimum peak acceleration must be non-negative, got {}",
                self.min_peak_acceleration
            )));
        }
        Ok(())
    }
}

/// Configuration for the live feed client.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket URL of the backend's live earthquake broadcast.
    pub url: String,

    /// Retry delay floor; the first reconnect after a failure waits this
    /// long, and a successful open resets the schedule to it.
    pub initial_retry_delay: Duration,

    /// Retry delay cap for the exponential backoff schedule.
    pub max_retry_delay: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/ws/earthquakes".to_string(),
            initial_retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

impl FeedConfig {
    /// Check feed client invariants.
    ///
    /// # Errors
    ///
    /// Returns `QuakeError::Config` naming the violated invariant.
    pub fn validate(&self) -> Result<(), QuakeError> {
        if self.url.is_empty() {
            return Err(QuakeError::Config("feed URL must not be empty".into()));
        }
        if self.initial_retry_delay.is_zero() {
            return Err(QuakeError::Config(
                "initial retry delay must be positive".into(),
            ));
        }
        if self.initial_retry_delay > self.max_retry_delay {
            return Err(QuakeError::Config(format!(
                "initial retry delay {:?} exceeds maximum {:?}",
                self.initial_retry_delay, self.max_retry_delay
            )));
        }
        Ok(())
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn window_samples(secs: f64, rate_hz: f64) -> usize {
    if secs <= 0.0 || rate_hz <= 0.0 {
        return 0;
    }
    (secs * rate_hz).round() as usize
}

fn check_alpha(name: &str, alpha: f64) -> Result<(), QuakeError> {
    if alpha <= 0.0 || alpha >= 1.0 {
        return Err(QuakeError::Config(format!(
            "{name} coefficient must be in (0, 1), got {alpha}"
        )));
    }
    Ok(())
}
