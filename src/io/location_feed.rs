//! Location feed - reads JSON-line fixes and forwards them to the tracker
//!
//! Each line is either a fix `{"lat":..,"lng":..,"ts":..,"speed":..}` or
//! `null` for a cycle where the provider had no fix. Unparsable lines count
//! as no fix.
//!
//! Live mode uses `try_send` so a slow tracker never blocks the reader;
//! dropped fixes are counted in metrics. Replay mode applies backpressure.
//! In live mode a missing line within the update interval is sent as a
//! no-fix cycle.

use crate::domain::types::LocationSample;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::services::tracker::TrackerCmd;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

/// Feed pacing options
#[derive(Debug, Clone, Copy)]
pub struct FeedOptions {
    /// Expected time between fixes; silence longer than this is a no-fix cycle
    pub update_interval: Duration,
    /// Fixes closer than this to the previous forwarded fix (by sample time) are ignored
    pub min_update_interval_ms: u64,
    /// Wait for queue space instead of dropping
    pub replay: bool,
}

impl FeedOptions {
    pub fn from_config(config: &Config, replay: bool) -> Self {
        Self {
            update_interval: Duration::from_millis(config.location_update_interval_ms().max(1)),
            min_update_interval_ms: config.location_min_update_interval_ms(),
            replay,
        }
    }
}

/// Counts reported when the feed ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub forwarded: u64,
    pub no_fix: u64,
    pub throttled: u64,
    pub dropped: u64,
}

/// Parse one feed line. None for `null`, blank or malformed lines.
pub fn parse_fix(line: &str) -> Option<LocationSample> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<Option<LocationSample>>(line) {
        Ok(sample) => sample,
        Err(e) => {
            debug!(error = %e, "feed_line_unparsable");
            None
        }
    }
}

/// Read fixes from `reader` until EOF or until the tracker goes away
pub async fn run_location_feed<R>(
    reader: R,
    cmd_tx: mpsc::Sender<TrackerCmd>,
    metrics: Arc<Metrics>,
    options: FeedOptions,
) -> FeedStats
where
    R: AsyncBufRead + Unpin,
{
    let update_interval = options.update_interval.max(Duration::from_millis(1));
    let mut lines = reader.lines();
    let mut stats = FeedStats::default();
    let mut last_forwarded_ts: Option<u64> = None;
    let mut last_drop_warn =
        Instant::now().checked_sub(Duration::from_secs(1)).unwrap_or_else(Instant::now);

    info!(replay = %options.replay, "location_feed_started");

    loop {
        let next = if options.replay {
            lines.next_line().await
        } else {
            match tokio::time::timeout(update_interval, lines.next_line()).await {
                Ok(next) => next,
                Err(_) => {
                    debug!("feed_silent_no_fix");
                    stats.no_fix += 1;
                    let sent =
                        forward(&cmd_tx, None, &options, &metrics, &mut stats, &mut last_drop_warn)
                            .await;
                    if sent == Forwarded::Closed {
                        break;
                    }
                    continue;
                }
            }
        };

        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "location_feed_read_error");
                break;
            }
        };

        let sample = parse_fix(&line);
        let sample_ts = sample.as_ref().map(|s| s.timestamp_ms);
        match sample_ts {
            None => stats.no_fix += 1,
            Some(ts) => {
                let too_soon = last_forwarded_ts.is_some_and(|last| {
                    ts >= last && ts - last < options.min_update_interval_ms
                });
                if too_soon {
                    stats.throttled += 1;
                    debug!(ts = %ts, "fix_throttled");
                    continue;
                }
            }
        }

        match forward(&cmd_tx, sample, &options, &metrics, &mut stats, &mut last_drop_warn).await {
            Forwarded::Sent => {
                if sample_ts.is_some() {
                    last_forwarded_ts = sample_ts;
                }
            }
            Forwarded::Dropped => {}
            Forwarded::Closed => break,
        }
    }

    info!(
        forwarded = %stats.forwarded,
        no_fix = %stats.no_fix,
        throttled = %stats.throttled,
        dropped = %stats.dropped,
        "location_feed_finished"
    );
    stats
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Forwarded {
    Sent,
    /// Queue full in live mode
    Dropped,
    Closed,
}

async fn forward(
    cmd_tx: &mpsc::Sender<TrackerCmd>,
    sample: Option<LocationSample>,
    options: &FeedOptions,
    metrics: &Metrics,
    stats: &mut FeedStats,
    last_drop_warn: &mut Instant,
) -> Forwarded {
    if options.replay {
        if cmd_tx.send(TrackerCmd::Fix(sample)).await.is_err() {
            warn!("tracker_channel_closed");
            return Forwarded::Closed;
        }
        stats.forwarded += 1;
        return Forwarded::Sent;
    }

    match cmd_tx.try_send(TrackerCmd::Fix(sample)) {
        Ok(()) => {
            stats.forwarded += 1;
            Forwarded::Sent
        }
        Err(TrySendError::Full(_)) => {
            metrics.record_fix_dropped();
            stats.dropped += 1;
            if last_drop_warn.elapsed() > Duration::from_secs(1) {
                warn!("fix_dropped: channel full");
                *last_drop_warn = Instant::now();
            }
            Forwarded::Dropped
        }
        Err(TrySendError::Closed(_)) => {
            warn!("tracker_channel_closed");
            Forwarded::Closed
        }
    }
}
