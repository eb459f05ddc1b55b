//! QuakeSense - crowd-sourced earthquake sensing and alerting client.
//!
//! A terminal-first client for the quake sensing pipeline: monitor a
//! sample stream, tail the live earthquake feed, scan recorded captures,
//! and raise alarms for backend confirmation pushes.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::error;

use quakesense::alarm::{AlarmDispatcher, ConsoleAlarmSink, ConsoleVolume, DispatchOutcome};
use quakesense::cli::{AlarmArgs, Cli, Command, FeedArgs, MonitorArgs, ScanArgs};
use quakesense::config::{DetectorConfig, FeedConfig, ReportConfig};
use quakesense::dedup::DedupRing;
use quakesense::detector::{SampleOutcome, StaLtaEngine};
use quakesense::feed::{EventLog, LiveFeedClient};
use quakesense::filter::{HighPassFilter, LowPassFilter};
use quakesense::location::{FixedLocation, LocationProvider, NoLocation};
use quakesense::models::{RawSample, TriggerRecord};
use quakesense::monitor::MonitorSession;
use quakesense::output;
use quakesense::report::{BackendClient, ReportGateway};
use quakesense::sampler;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Monitor(args) => cmd_monitor(args),
        Command::Feed(args) => cmd_feed(args),
        Command::Scan(args) => cmd_scan(args),
        Command::Alarm(args) => cmd_alarm(args),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the `monitor` command - continuous detection and reporting.
fn cmd_monitor(args: MonitorArgs) -> Result<()> {
    let detector_config = args.tuning.to_config();
    detector_config
        .validate()
        .context("invalid detector configuration")?;

    let report_config = ReportConfig {
        min_peak_acceleration: args.min_peak,
        cooldown: Duration::from_secs(args.cooldown),
    };
    report_config
        .validate()
        .context("invalid report configuration")?;

    // Run the async pipeline on a tokio runtime
    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(run_monitor(args, detector_config, report_config))
}

async fn run_monitor(
    args: MonitorArgs,
    detector_config: DetectorConfig,
    report_config: ReportConfig,
) -> Result<()> {
    let device_id = args.device_id.clone().unwrap_or_else(default_device_id);
    let client = Arc::new(
        BackendClient::new(args.backend_url.clone()).context("failed to create backend client")?,
    );
    let location: Arc<dyn LocationProvider> = match args.location {
        Some(point) => Arc::new(FixedLocation::new(point)),
        None => Arc::new(NoLocation),
    };
    let gateway = ReportGateway::new(client, report_config, device_id.clone(), location);
    let mut session = MonitorSession::new(&detector_config, gateway)
        .context("failed to build monitoring session")?;

    let pacing = args.realtime.then_some(detector_config.sample_rate_hz);

    tracing::info!(
        device = %device_id,
        input = %args.input,
        backend = %args.backend_url,
        "monitoring started"
    );

    let mut handle = if args.input == "-" {
        sampler::spawn_replay(tokio::io::BufReader::new(tokio::io::stdin()), pacing)
    } else {
        let file = tokio::fs::File::open(&args.input)
            .await
            .with_context(|| format!("failed to open sample file {}", args.input))?;
        sampler::spawn_replay(tokio::io::BufReader::new(file), pacing)
    };

    session.run(&mut handle).await;

    let stats = session.stats();
    println!(
        "{} samples | {} triggers | {} reports sent, {} suppressed",
        stats.samples, stats.triggers, stats.reports_dispatched, stats.reports_suppressed
    );
    Ok(())
}

/// Execute the `feed` command - tail the live earthquake broadcast.
fn cmd_feed(args: FeedArgs) -> Result<()> {
    let config = FeedConfig {
        url: args.url.clone(),
        initial_retry_delay: Duration::from_secs(args.initial_retry),
        max_retry_delay: Duration::from_secs(args.max_retry),
    };
    config.validate().context("invalid feed configuration")?;

    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(run_feed_tail(args, config))
}

async fn run_feed_tail(args: FeedArgs, config: FeedConfig) -> Result<()> {
    let mut client = LiveFeedClient::new(config);
    let mut events = BroadcastStream::new(client.subscribe());
    let mut state = client.state();
    client.start();

    let mut dedup = DedupRing::with_default_capacity();
    let mut log = EventLog::with_default_capacity();
    let mut emitted: u64 = 0;

    let stdout = io::stdout();

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                tracing::info!(state = current.as_str(), "feed connection state");
            }
            item = events.next() => match item {
                Some(Ok(event)) => {
                    // Rebroadcasts after a reconnect are dropped here
                    if !dedup.check_and_mark(&event.id) {
                        continue;
                    }
                    log.push(event.clone());

                    let mut handle = stdout.lock();
                    output::write_events(&mut handle, std::slice::from_ref(&event), args.format)?;
                    let _ = handle.flush();

                    emitted += 1;
                    if args.limit.is_some_and(|n| emitted >= n) {
                        break;
                    }
                }
                Some(Err(BroadcastStreamRecvError::Lagged(n))) => {
                    tracing::warn!("feed consumer lagged, {n} events dropped");
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    client.stop().await;
    tracing::info!(
        unique_events = emitted,
        duplicates = dedup.total_dupes(),
        "feed closed"
    );
    Ok(())
}

/// Execute the `scan` command - offline detection over a recorded capture.
fn cmd_scan(args: ScanArgs) -> Result<()> {
    let config = args.tuning.to_config();
    config.validate().context("invalid detector configuration")?;

    let file = std::fs::File::open(&args.input)
        .with_context(|| format!("failed to open sample file {}", args.input.display()))?;
    let reader = io::BufReader::new(file);

    let mut lowpass = config.lowpass_alpha.map(LowPassFilter::new);
    let mut highpass = HighPassFilter::new(config.highpass_alpha);
    let mut engine =
        StaLtaEngine::new(&config).context("failed to build trigger engine")?;

    let mut triggers: Vec<TriggerRecord> = Vec::new();
    let mut index: u64 = 0;
    let mut skipped: u64 = 0;

    for line in reader.lines() {
        let line = line.context("failed to read sample file")?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        let Ok(sample) = serde_json::from_str::<RawSample>(text) else {
            skipped += 1;
            continue;
        };

        let smoothed = match lowpass.as_mut() {
            Some(filter) => filter.apply(&sample),
            None => sample,
        };
        let magnitude = smoothed.magnitude();
        let filtered = highpass.apply(magnitude);

        if let SampleOutcome::Triggered(trigger) = engine.on_sample(magnitude, filtered) {
            #[allow(clippy::cast_precision_loss)]
            triggers.push(TriggerRecord {
                offset_secs: index as f64 / config.sample_rate_hz,
                peak_acceleration: trigger.peak_acceleration,
                sta_lta_ratio: trigger.sta_lta_ratio,
            });
        }
        index += 1;
    }

    if skipped > 0 {
        tracing::warn!(skipped, "malformed sample lines skipped");
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_triggers(&mut handle, &triggers, args.format)?;

    tracing::info!(samples = index, triggers = triggers.len(), "scan complete");
    Ok(())
}

/// Execute the `alarm` command - dispatch confirmation pushes from stdin.
fn cmd_alarm(args: AlarmArgs) -> Result<()> {
    let sink = ConsoleAlarmSink::new(io::stderr());
    let volume = ConsoleVolume::new(!args.no_volume);
    let mut dispatcher = AlarmDispatcher::new(sink, volume);

    let stdin = io::stdin();
    let mut raised: u64 = 0;
    let mut discarded: u64 = 0;

    for line in stdin.lock().lines() {
        let line = line.context("failed to read push payload")?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        match dispatcher.dispatch(text) {
            DispatchOutcome::Raised => raised += 1,
            DispatchOutcome::Ignored | DispatchOutcome::Malformed => discarded += 1,
        }
    }

    tracing::info!(raised, discarded, "push stream ended");
    Ok(())
}

/// Device identifier used when none is configured.
fn default_device_id() -> String {
    format!(
        "device-{}-{:x}",
        std::env::consts::OS,
        chrono::Utc::now().timestamp_millis()
    )
}
