//! Walk tracker - detects on-foot trips between Home and University
//!
//! Module structure:
//! - `domain/` - Core value types (zones, samples, trip state, records)
//! - `io/` - External interfaces (store, notifications, journal, location feed)
//! - `services/` - Business logic (classifier, state machine, ledger, tracker)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use walk_tracker::domain::types::{epoch_ms, AnchorKind, GeoPoint, LocationSample, TripType};
use walk_tracker::infra::{Config, Metrics};
use walk_tracker::io::{run_location_feed, FeedOptions, JsonFileStore, Journal, LogObserver};
use walk_tracker::services::{create_tracker, CycleOutcome, Tracker, TrackerError, TripDecision};

/// Walk tracker - infers walked trips from location fixes
#[derive(Parser, Debug)]
#[command(name = "walk-tracker", version, about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE or config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Track continuously from JSON-line fixes on stdin, or replay a file
    Run {
        /// Replay fixes from this file instead of reading stdin live
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Run one full pass for a single fix and print the detected zone
    Check {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Reported speed in m/s
        #[arg(long)]
        speed: Option<f64>,
        /// Fix time in epoch ms (default: now)
        #[arg(long)]
        ts: Option<u64>,
    },
    /// Set the Home or University anchor
    SetAnchor {
        #[arg(value_enum)]
        kind: AnchorKind,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// Record a trip manually
    Record {
        #[arg(value_enum)]
        trip_type: TripType,
    },
    /// Undo the last automatic record
    Undo { record_id: u64 },
    /// Clear today's counters
    ResetToday,
    /// Clear all records and journey state (anchors are kept)
    ResetAll,
    /// Print today's and all-time trip counts
    Summary,
    /// Print anchors, journey state and the last automatic record
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        revision = env!("WALK_TRACKER_REVISION"),
        "walk-tracker starting"
    );

    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };

    info!(
        config_file = %config.config_file(),
        zone_radius_m = %config.zone_radius_m(),
        arrival_confirm_ms = %config.arrival_confirm_ms(),
        arrival_min_samples = %config.arrival_min_samples(),
        cooldown_ms = %config.auto_record_cooldown_ms(),
        store_path = %config.store_path(),
        "config_loaded"
    );

    let metrics = Arc::new(Metrics::new());
    let mut tracker = build_tracker(&config, metrics.clone());

    match args.command {
        Command::Run { input } => run(tracker, &config, metrics, input).await?,
        Command::Check { lat, lng, speed, ts } => {
            let mut sample = LocationSample::new(lat, lng, ts.unwrap_or_else(epoch_ms));
            if let Some(speed) = speed {
                sample = sample.with_speed(speed);
            }
            print_outcome(tracker.check_now(Some(sample)));
        }
        Command::SetAnchor { kind, lat, lng } => {
            tracker.set_anchor(kind, GeoPoint::new(lat, lng))?;
            println!("{} anchor set to {lat}, {lng}", kind.zone());
        }
        Command::Record { trip_type } => {
            tracker.record_manual(trip_type)?;
            println!("recorded {trip_type}");
        }
        Command::Undo { record_id } => {
            if tracker.request_undo(record_id)? {
                println!("record {record_id} undone");
            } else {
                println!("nothing to undo for record {record_id}");
            }
        }
        Command::ResetToday => {
            tracker.reset_today()?;
            println!("today's counts cleared");
        }
        Command::ResetAll => {
            tracker.reset_all()?;
            println!("all records cleared");
        }
        Command::Summary => {
            println!("{}", serde_json::to_string_pretty(&tracker.summary()?)?);
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&tracker.status()?)?);
        }
    }

    Ok(())
}

fn build_tracker(config: &Config, metrics: Arc<Metrics>) -> Tracker {
    let store = JsonFileStore::new(config.store_path());
    let mut tracker = Tracker::new(config.clone(), Box::new(store), metrics)
        .with_observer(Box::new(LogObserver));
    if config.journal_enabled() {
        tracker = tracker.with_observer(Box::new(Journal::new(config.journal_path())));
    }
    tracker
}

async fn run(
    tracker: Tracker,
    config: &Config,
    metrics: Arc<Metrics>,
    input: Option<String>,
) -> anyhow::Result<()> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input {path}"))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    // Create tracker command channel (bounded for backpressure)
    let (handle, worker) = create_tracker(tracker, 1000);
    let worker_task = tokio::spawn(worker.run());

    match handle.start_tracking(None).await {
        Ok(_) => {}
        Err(TrackerError::AnchorsMissing) => {
            bail!("set both anchors with `walk-tracker set-anchor` before tracking")
        }
        Err(e) => return Err(e).context("Failed to start tracking"),
    }

    let options = FeedOptions::from_config(config, input.is_some());
    let feed = run_location_feed(reader, handle.sender(), metrics.clone(), options);

    tokio::select! {
        stats = feed => {
            info!(forwarded = %stats.forwarded, "location_feed_ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown_signal_received");
        }
    }

    handle.stop_tracking().await.context("Failed to stop tracking")?;
    let summary = handle.summary().await?;
    drop(handle);
    worker_task.await.context("Tracker task failed")?;

    metrics.report().log();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    info!("walk-tracker shutdown complete");
    Ok(())
}

fn print_outcome(outcome: CycleOutcome) {
    match outcome {
        CycleOutcome::Processed { zone, event, decision } => {
            println!("zone: {zone}");
            println!("event: {}", event.as_str());
            match decision {
                Some(TripDecision::Committed { record_id }) => {
                    println!("trip recorded (undo with `walk-tracker undo {record_id}`)")
                }
                Some(TripDecision::SkippedNotWalking) => println!("trip skipped: not walking"),
                Some(TripDecision::SkippedCooldown) => println!("trip skipped: cooldown"),
                None => {}
            }
        }
        CycleOutcome::Skipped => println!("no fix"),
        CycleOutcome::Invalid => println!("invalid fix"),
        CycleOutcome::PersistenceFailed => println!("state could not be saved, try again"),
    }
}
