//! Monitoring session: the continuous detection pipeline.
//!
//! One sample at a time flows synchronously through the optional low-pass
//! smoother, the magnitude high-pass, and the STA/LTA engine; triggers go
//! to the report gateway. Per-sample work is a handful of arithmetic ops
//! and never awaits, so a 50 Hz callback rate has headroom to spare. The
//! only suspension point is the gateway's spawned network call, which
//! runs on its own task.

use tracing::info;

use crate::config::DetectorConfig;
use crate::detector::{SampleOutcome, StaLtaEngine};
use crate::errors::QuakeError;
use crate::filter::{HighPassFilter, LowPassFilter};
use crate::models::RawSample;
use crate::report::{ReportDecision, ReportGateway};
use crate::sampler::SamplerHandle;

/// Counters for one monitoring session.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionStats {
    pub samples: u64,
    pub triggers: u64,
    pub reports_dispatched: u64,
    pub reports_suppressed: u64,
}

/// Owns all detection state for one monitoring session.
///
/// Every mutable piece (filter state, ring buffer, hysteresis, cooldown
/// clock) lives here and is touched only by the session's own loop, so
/// independent sessions never interfere and no locking exists.
pub struct MonitorSession {
    lowpass: Option<LowPassFilter>,
    highpass: HighPassFilter,
    engine: StaLtaEngine,
    gateway: ReportGateway,
    stats: SessionStats,
}

impl MonitorSession {
    /// Build a session from a validated detector configuration.
    ///
    /// # Errors
    ///
    /// Returns `QuakeError::Config` if the configuration is invalid.
    pub fn new(config: &DetectorConfig, gateway: ReportGateway) -> Result<Self, QuakeError> {
        let engine = StaLtaEngine::new(config)?;
        Ok(Self {
            lowpass: config.lowpass_alpha.map(LowPassFilter::new),
            highpass: HighPassFilter::new(config.highpass_alpha),
            engine,
            gateway,
            stats: SessionStats::default(),
        })
    }

    /// Process one sample through the full pipeline.
    pub fn process_sample(&mut self, sample: &RawSample) -> SampleOutcome {
        self.stats.samples += 1;

        let smoothed = match self.lowpass.as_mut() {
            Some(filter) => filter.apply(sample),
            None => *sample,
        };
        let magnitude = smoothed.magnitude();
        let filtered = self.highpass.apply(magnitude);

        let outcome = self.engine.on_sample(magnitude, filtered);
        if let SampleOutcome::Triggered(trigger) = outcome {
            self.stats.triggers += 1;
            info!(
                ratio = trigger.sta_lta_ratio,
                peak = trigger.peak_acceleration,
                "seismic trigger"
            );
            match self.gateway.handle_trigger(&trigger) {
                ReportDecision::Dispatched => self.stats.reports_dispatched += 1,
                ReportDecision::Cooldown | ReportDecision::BelowFloor => {
                    self.stats.reports_suppressed += 1;
                }
            }
        }
        outcome
    }

    /// Drain a sample source to exhaustion.
    pub async fn run(&mut self, handle: &mut SamplerHandle) {
        while let Some(sample) = handle.next_sample().await {
            self.process_sample(&sample);
        }
        let stats = self.stats;
        info!(
            samples = stats.samples,
            triggers = stats.triggers,
            reports_dispatched = stats.reports_dispatched,
            reports_suppressed = stats.reports_suppressed,
            "monitoring session ended"
        );
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportConfig;
    use crate::location::NoLocation;
    use crate::report::BackendClient;
    use std::sync::Arc;
    use std::time::Duration;

    fn test_session(report_config: ReportConfig) -> MonitorSession {
        let config = DetectorConfig {
            sample_rate_hz: 10.0,
            sta_window_secs: 0.2,
            lta_window_secs: 1.0,
            ..DetectorConfig::default()
        };
        let client =
            Arc::new(BackendClient::new("http://127.0.0.1:1").expect("client must build"));
        let gateway = ReportGateway::new(
            client,
            report_config,
            "device-test".into(),
            Arc::new(NoLocation),
        );
        MonitorSession::new(&config, gateway).expect("test config must validate")
    }

    fn sample(value: f64) -> RawSample {
        RawSample {
            x: value,
            y: 0.0,
            z: 0.0,
        }
    }

    #[tokio::test]
    async fn test_quiet_stream_produces_nothing() {
        let mut session = test_session(ReportConfig::default());
        for _ in 0..200 {
            session.process_sample(&sample(0.0));
        }
        let stats = session.stats();
        assert_eq!(stats.samples, 200);
        assert_eq!(stats.triggers, 0);
        assert_eq!(stats.reports_dispatched, 0);
    }

    #[tokio::test]
    async fn test_constant_gravity_never_triggers() {
        // A resting device sees a constant offset; the high-pass must
        // keep it from ever looking like shaking.
        let mut session = test_session(ReportConfig::default());
        for _ in 0..300 {
            session.process_sample(&sample(9.81));
        }
        assert_eq!(session.stats().triggers, 0);
    }

    #[tokio::test]
    async fn test_energy_burst_triggers_once_and_reports() {
        let mut session = test_session(ReportConfig {
            min_peak_acceleration: 0.5,
            cooldown: Duration::from_secs(60),
        });

        // Settle on a quiet baseline
        for _ in 0..30 {
            session.process_sample(&sample(1.0));
        }
        // Sustained strong shaking
        for _ in 0..20 {
            session.process_sample(&sample(10.0));
        }

        let stats = session.stats();
        assert_eq!(stats.triggers, 1, "burst should trigger exactly once");
        assert_eq!(stats.reports_dispatched, 1);
        assert_eq!(stats.reports_suppressed, 0);
    }

    #[tokio::test]
    async fn test_weak_burst_suppressed_by_floor() {
        let mut session = test_session(ReportConfig {
            min_peak_acceleration: 50.0,
            cooldown: Duration::from_secs(60),
        });

        for _ in 0..30 {
            session.process_sample(&sample(1.0));
        }
        for _ in 0..20 {
            session.process_sample(&sample(10.0));
        }

        let stats = session.stats();
        assert!(stats.triggers >= 1);
        assert_eq!(stats.reports_dispatched, 0);
        assert!(stats.reports_suppressed >= 1);
    }
}
