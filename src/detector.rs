//! Streaming STA/LTA trigger engine.
//!
//! Maintains a bounded ring of filtered magnitude samples sized to the
//! long window, computes the short-over-long average ratio every sample,
//! and runs an Idle/Triggered hysteresis state machine. The engine never
//! reads the clock; callers own timestamps.

use std::collections::VecDeque;

use crate::config::DetectorConfig;
use crate::errors::QuakeError;

/// Hysteresis state of the trigger engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Triggered,
}

/// Emitted on an Idle -> Triggered transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerEvent {
    /// Raw (unfiltered) vector magnitude at the trigger sample (m/s²)
    pub peak_acceleration: f64,

    /// STA/LTA ratio at the trigger sample
    pub sta_lta_ratio: f64,
}

/// Outcome of feeding one sample to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// Idle and staying idle
    Quiet,

    /// Transitioned Idle -> Triggered on this sample
    Triggered(TriggerEvent),

    /// Still triggered; peak updated
    Sustained,

    /// Transitioned Triggered -> Idle on this sample
    Released,
}

/// STA/LTA (Short-Term Average / Long-Term Average) streaming detector.
///
/// The industry-standard seismic onset detector: a sustained rise of
/// short-term signal energy over its long-term background flags P-wave
/// style broadband shaking, while slow drift and brief knocks do not.
#[derive(Debug, Clone)]
pub struct StaLtaEngine {
    sta_samples: usize,
    lta_samples: usize,
    trigger_ratio: f64,
    detrigger_ratio: f64,
    /// Ring of filtered magnitudes, oldest at front (bounded to lta_samples)
    window: VecDeque<f64>,
    state: TriggerState,
    peak: f64,
    last_ratio: f64,
}

impl StaLtaEngine {
    /// Create an engine from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `QuakeError::Config` if the configuration violates an
    /// invariant (hysteresis band, window ordering, coefficient ranges).
    pub fn new(config: &DetectorConfig) -> Result<Self, QuakeError> {
        config.validate()?;
        Ok(Self {
            sta_samples: config.sta_samples(),
            lta_samples: config.lta_samples(),
            trigger_ratio: config.trigger_ratio,
            detrigger_ratio: config.detrigger_ratio,
            window: VecDeque::with_capacity(config.lta_samples()),
            state: TriggerState::Idle,
            peak: 0.0,
            last_ratio: 0.0,
        })
    }

    /// Feed one sample: the raw vector magnitude (for peak tracking) and
    /// the filtered scalar (for the ratio).
    pub fn on_sample(&mut self, raw_magnitude: f64, filtered: f64) -> SampleOutcome {
        self.push(filtered);
        let ratio = self.compute_ratio();
        self.last_ratio = ratio;

        match self.state {
            TriggerState::Idle if ratio >= self.trigger_ratio => {
                self.state = TriggerState::Triggered;
                self.peak = raw_magnitude;
                SampleOutcome::Triggered(TriggerEvent {
                    peak_acceleration: raw_magnitude,
                    sta_lta_ratio: ratio,
                })
            }
            TriggerState::Idle => SampleOutcome::Quiet,
            TriggerState::Triggered if ratio < self.detrigger_ratio => {
                self.state = TriggerState::Idle;
                self.peak = 0.0;
                SampleOutcome::Released
            }
            TriggerState::Triggered => {
                self.peak = self.peak.max(raw_magnitude);
                SampleOutcome::Sustained
            }
        }
    }

    /// Current hysteresis state.
    #[must_use]
    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// STA/LTA ratio computed for the most recent sample.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        self.last_ratio
    }

    /// Peak raw magnitude accumulated while triggered (0 when idle).
    #[must_use]
    pub fn peak(&self) -> f64 {
        self.peak
    }

    fn push(&mut self, filtered: f64) {
        // Evict oldest when full (FIFO ring)
        if self.window.len() >= self.lta_samples {
            self.window.pop_front();
        }
        self.window.push_back(filtered);
        debug_assert!(self.window.len() <= self.lta_samples);
    }

    /// Ratio is 0 until a full long window of history exists, and 0 when
    /// the long-window mean is 0 (no division by zero).
    fn compute_ratio(&self) -> f64 {
        if self.window.len() < self.lta_samples {
            return 0.0;
        }

        #[allow(clippy::cast_precision_loss)]
        let lta = self.window.iter().map(|s| s.abs()).sum::<f64>() / self.lta_samples as f64;
        if lta <= 0.0 {
            return 0.0;
        }

        #[allow(clippy::cast_precision_loss)]
        let sta = self
            .window
            .iter()
            .rev()
            .take(self.sta_samples)
            .map(|s| s.abs())
            .sum::<f64>()
            / self.sta_samples as f64;

        sta / lta
    }
}
