//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing. Every tunable of the
//! detection pipeline is a flag here; nothing is hard-coded at a call
//! site.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::DetectorConfig;
use crate::location::GeoPoint;
use crate::output::Format;

/// Crowd-sourced earthquake sensing and alerting client.
#[derive(Parser, Debug)]
#[command(name = "quakesense")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the detection pipeline and report triggers to the backend
    Monitor(MonitorArgs),

    /// Tail the backend's live earthquake feed
    Feed(FeedArgs),

    /// Run the detector over a recorded sample file (offline one-shot)
    Scan(ScanArgs),

    /// Raise alarms for confirmation pushes read from stdin
    Alarm(AlarmArgs),
}

/// Filter and trigger tunables shared by `monitor` and `scan`.
#[derive(Args, Debug, Clone)]
pub struct DetectorTuning {
    /// Sampling rate in Hz
    #[arg(long, default_value = "50.0")]
    pub sample_rate: f64,

    /// Short-term window length in seconds
    #[arg(long, default_value = "1.0")]
    pub sta_window: f64,

    /// Long-term window length in seconds (also the warm-up period)
    #[arg(long, default_value = "10.0")]
    pub lta_window: f64,

    /// STA/LTA ratio that arms a trigger
    #[arg(long, default_value = "3.0")]
    pub trigger_ratio: f64,

    /// STA/LTA ratio below which a trigger releases
    #[arg(long, default_value = "1.5")]
    pub detrigger_ratio: f64,

    /// High-pass filter coefficient in (0,1)
    #[arg(long, default_value = "0.9")]
    pub highpass_alpha: f64,

    /// Optional per-axis low-pass smoothing coefficient in (0,1)
    #[arg(long)]
    pub lowpass_alpha: Option<f64>,
}

impl DetectorTuning {
    /// Map CLI flags into the owned detector configuration.
    #[must_use]
    pub fn to_config(&self) -> DetectorConfig {
        DetectorConfig {
            sample_rate_hz: self.sample_rate,
            sta_window_secs: self.sta_window,
            lta_window_secs: self.lta_window,
            trigger_ratio: self.trigger_ratio,
            detrigger_ratio: self.detrigger_ratio,
            highpass_alpha: self.highpass_alpha,
            lowpass_alpha: self.lowpass_alpha,
        }
    }
}

/// Arguments for the `monitor` command.
#[derive(Parser, Debug)]
pub struct MonitorArgs {
    /// Sample stream: NDJSON file path, or "-" for stdin
    #[arg(long, short = 'i', default_value = "-")]
    pub input: String,

    #[command(flatten)]
    pub tuning: DetectorTuning,

    /// Backend ingestion base URL
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    pub backend_url: String,

    /// Device identifier sent with reports (generated when omitted)
    #[arg(long)]
    pub device_id: Option<String>,

    /// Last-known device position: lat,lon
    #[arg(long, value_parser = parse_location)]
    pub location: Option<GeoPoint>,

    /// Minimum reportable peak acceleration (m/s²)
    #[arg(long, default_value = "0.5")]
    pub min_peak: f64,

    /// Report cooldown in seconds
    #[arg(long, default_value = "30")]
    pub cooldown: u64,

    /// Pace the replay at the configured sample rate
    #[arg(long)]
    pub realtime: bool,
}

/// Arguments for the `feed` command.
#[derive(Parser, Debug)]
pub struct FeedArgs {
    /// WebSocket URL of the live earthquake broadcast
    #[arg(long, default_value = "ws://127.0.0.1:8000/ws/earthquakes")]
    pub url: String,

    /// Initial reconnect delay in seconds
    #[arg(long, default_value = "1")]
    pub initial_retry: u64,

    /// Maximum reconnect delay in seconds
    #[arg(long, default_value = "30")]
    pub max_retry: u64,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,

    /// Exit after this many unique events
    #[arg(long, short = 'n')]
    pub limit: Option<u64>,
}

/// Arguments for the `scan` command.
#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// Recorded NDJSON sample file
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    #[command(flatten)]
    pub tuning: DetectorTuning,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `alarm` command.
#[derive(Parser, Debug)]
pub struct AlarmArgs {
    /// Skip the best-effort volume override
    #[arg(long)]
    pub no_volume: bool,
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}

/// Parse a lat,lon location from string.
fn parse_location(s: &str) -> Result<GeoPoint, String> {
    s.parse()
}
