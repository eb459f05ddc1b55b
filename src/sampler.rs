//! Sample acquisition.
//!
//! On a handset the sampler is the platform accelerometer; here the
//! equivalent capability reads NDJSON `RawSample` lines from a file,
//! stdin, or a recorded capture, optionally paced at the configured
//! sample rate. Samples are delivered strictly in stream order through a
//! bounded channel; the subscription handle's `stop` guarantees nothing
//! is delivered after it returns.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::models::RawSample;

/// Capacity of the sample delivery channel. Bounded so a stalled consumer
/// applies backpressure instead of growing a queue.
const SAMPLE_CHANNEL_CAPACITY: usize = 256;

/// Subscription handle for a running sample source.
pub struct SamplerHandle {
    samples: mpsc::Receiver<RawSample>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    /// Receive the next sample, in arrival order. `None` means the
    /// stream ended.
    pub async fn next_sample(&mut self) -> Option<RawSample> {
        self.samples.recv().await
    }

    /// Stop the source. Consumes the handle, so no sample can be
    /// observed after this returns.
    pub async fn stop(self) {
        let Self {
            samples,
            shutdown_tx,
            task,
        } = self;
        // Dropping the receiver unblocks any in-flight send
        drop(samples);
        let _ = shutdown_tx.send(true);
        let _ = task.await;
    }
}

/// Start a replay sample source over any buffered byte stream.
///
/// `pacing_hz` of `Some(rate)` replays in real time at that rate; `None`
/// delivers as fast as the consumer drains.
pub fn spawn_replay<R>(reader: R, pacing_hz: Option<f64>) -> SamplerHandle
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(SAMPLE_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(read_samples(reader, pacing_hz, tx, shutdown_rx));
    SamplerHandle {
        samples: rx,
        shutdown_tx,
        task,
    }
}

async fn read_samples<R>(
    reader: R,
    pacing_hz: Option<f64>,
    tx: mpsc::Sender<RawSample>,
    mut shutdown: watch::Receiver<bool>,
) where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let mut lines = reader.lines();
    let mut ticker = pacing_hz.map(|hz| {
        let mut ticker = interval(Duration::from_secs_f64(1.0 / hz));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    let mut delivered: u64 = 0;
    let mut skipped: u64 = 0;

    loop {
        let line = tokio::select! {
            _ = shutdown.changed() => break,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                match serde_json::from_str::<RawSample>(text) {
                    Ok(sample) => {
                        if let Some(ticker) = ticker.as_mut() {
                            tokio::select! {
                                _ = shutdown.changed() => break,
                                _ = ticker.tick() => {}
                            }
                        }
                        if tx.send(sample).await.is_err() {
                            break;
                        }
                        delivered += 1;
                    }
                    Err(e) => {
                        skipped += 1;
                        debug!("skipping malformed sample line: {e}");
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("sample stream read failed: {e}");
                break;
            }
        }
    }

    debug!(delivered, skipped, "sample stream ended");
}
