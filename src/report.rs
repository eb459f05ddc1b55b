//! Backend report submission.
//!
//! `BackendClient` wraps the HTTP surface of the ingestion endpoint;
//! `ReportGateway` decides, per trigger, whether a report goes out at all
//! (hard cooldown, minimum-peak floor) and dispatches it without blocking
//! the sampling path. Submission failures are logged and dropped: a stale
//! shake signal re-sent later would only pollute backend clustering.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::config::ReportConfig;
use crate::detector::TriggerEvent;
use crate::errors::QuakeError;
use crate::location::LocationProvider;
use crate::models::{ReportConfirmation, ShakeReport};

/// Default request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// User agent string for API requests.
const USER_AGENT: &str = concat!("quakesense/", env!("CARGO_PKG_VERSION"));

/// Path of the backend's seismic report endpoint.
const REPORT_PATH: &str = "/api/v1/seismic/report";

/// Async HTTP client for the ingestion backend.
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(base_url: impl Into<String>) -> Result<Self, QuakeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Submit one shake report.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be
    /// parsed.
    #[instrument(skip(self, report), fields(device = %report.device_id))]
    pub async fn submit_report(
        &self,
        report: &ShakeReport,
    ) -> Result<ReportConfirmation, QuakeError> {
        let url = format!("{}{}", self.base_url, REPORT_PATH);

        debug!("submitting shake report to {}", url);

        let response = self.client.post(&url).json(report).send().await?;

        // Check status before parsing
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuakeError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let confirmation: ReportConfirmation = response.json().await?;
        Ok(confirmation)
    }
}

/// What the gateway did with a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDecision {
    /// Report built and dispatched to the backend
    Dispatched,
    /// Suppressed: previous report was too recent
    Cooldown,
    /// Suppressed: peak acceleration below the reportable floor
    BelowFloor,
}

/// Rate-limited, fire-and-forget report dispatch.
///
/// Owns the cooldown clock; the only mutator is `handle_trigger`, called
/// from the sampling task, so no locking is needed.
pub struct ReportGateway {
    client: Arc<BackendClient>,
    config: ReportConfig,
    device_id: String,
    location: Arc<dyn LocationProvider>,
    last_report: Option<Instant>,
}

impl ReportGateway {
    #[must_use]
    pub fn new(
        client: Arc<BackendClient>,
        config: ReportConfig,
        device_id: String,
        location: Arc<dyn LocationProvider>,
    ) -> Self {
        Self {
            client,
            config,
            device_id,
            location,
            last_report: None,
        }
    }

    /// Apply cooldown and floor gates; advance the cooldown clock only
    /// when the trigger is accepted.
    pub fn decide(&mut self, trigger: &TriggerEvent) -> ReportDecision {
        if let Some(at) = self.last_report {
            if at.elapsed() < self.config.cooldown {
                debug!("trigger suppressed by cooldown");
                return ReportDecision::Cooldown;
            }
        }
        if trigger.peak_acceleration < self.config.min_peak_acceleration {
            debug!(
                peak = trigger.peak_acceleration,
                floor = self.config.min_peak_acceleration,
                "trigger below reportable floor"
            );
            return ReportDecision::BelowFloor;
        }
        self.last_report = Some(Instant::now());
        ReportDecision::Dispatched
    }

    /// Handle an Idle -> Triggered transition.
    ///
    /// When accepted, the submission runs on its own task so the sampling
    /// callback never waits on the network. Failures are swallowed after
    /// logging; the trigger state machine must not notice them.
    pub fn handle_trigger(&mut self, trigger: &TriggerEvent) -> ReportDecision {
        let decision = self.decide(trigger);
        if decision != ReportDecision::Dispatched {
            return decision;
        }

        let report = self.build_report(trigger);
        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            match client.submit_report(&report).await {
                Ok(confirmation) => {
                    info!(
                        cluster_id = ?confirmation.cluster_id,
                        cluster_size = confirmation.cluster_size,
                        likely_earthquake = confirmation.is_likely_earthquake,
                        "shake report accepted"
                    );
                }
                Err(e) => {
                    warn!("shake report dropped after submission failure: {e}");
                }
            }
        });

        decision
    }

    fn build_report(&self, trigger: &TriggerEvent) -> ShakeReport {
        let position = self.location.last_known();
        ShakeReport {
            device_id: self.device_id.clone(),
            peak_acceleration: trigger.peak_acceleration,
            sta_lta_ratio: trigger.sta_lta_ratio,
            latitude: position.map(|p| p.latitude),
            longitude: position.map(|p| p.longitude),
            timestamp: Utc::now(),
        }
    }
}
