//! Walk tracker orchestration
//!
//! The Tracker owns the persistence collaborator and the notification
//! observers, and runs every trigger as one load, step, store unit:
//! - Location fixes (periodic feed, on-demand check, first fix on start)
//! - Manual actions (record, undo, resets, anchors)
//!
//! Observers are called only after the new snapshot has been stored.

mod handle;
mod handlers;

pub use handle::{create_tracker, TrackerCmd, TrackerHandle, TrackerWorker};

use crate::domain::records::TripRecord;
use crate::domain::snapshot::Anchors;
use crate::domain::trip::TripEvent;
use crate::domain::types::{epoch_ms, Zone};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::notifier::TripObserver;
use crate::io::store::{StateStore, StoreError};
use crate::services::ledger::TripRecordLedger;
use crate::services::motion::MotionSampleEvaluator;
use crate::services::trip_machine::TripStateMachine;
use crate::services::walkiness::WalkinessGate;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::info;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
    #[error("both home and university anchors must be set")]
    AnchorsMissing,
    #[error("invalid anchor coordinates")]
    InvalidAnchor,
    #[error("tracker is not running")]
    Closed,
}

/// What a completed journey led to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum TripDecision {
    Committed { record_id: u64 },
    SkippedNotWalking,
    SkippedCooldown,
}

/// Result of one location cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No fix, or tracking disabled for periodic fixes
    Skipped,
    /// Fix with unusable coordinates, dropped without mutation
    Invalid,
    Processed {
        zone: Zone,
        event: TripEvent,
        decision: Option<TripDecision>,
    },
    /// Load or store failed, nothing changed
    PersistenceFailed,
}

/// Snapshot of the tracker for the status command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerStatus {
    pub anchors: Anchors,
    pub stable_zone: Zone,
    pub journey_origin: Option<Zone>,
    pub tracking_enabled: bool,
    pub last_fix_ms: Option<u64>,
    pub last_auto_record: Option<TripRecord>,
}

/// Central orchestrator for location cycles and manual actions
pub struct Tracker {
    /// Persisted state, loaded and stored as a whole
    pub(crate) store: Box<dyn StateStore>,
    /// Notified after each successful store
    pub(crate) observers: Vec<Box<dyn TripObserver>>,
    pub(crate) zone_radius_m: f64,
    pub(crate) motion: MotionSampleEvaluator,
    pub(crate) machine: TripStateMachine,
    pub(crate) walkiness: WalkinessGate,
    pub(crate) ledger: TripRecordLedger,
    pub(crate) config: Config,
    pub(crate) metrics: Arc<Metrics>,
    /// Wall clock for manual actions (epoch ms)
    pub(crate) clock: fn() -> u64,
}

impl Tracker {
    pub fn new(config: Config, store: Box<dyn StateStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            observers: Vec::new(),
            zone_radius_m: config.zone_radius_m(),
            motion: MotionSampleEvaluator::from_config(&config),
            machine: TripStateMachine::from_config(&config),
            walkiness: WalkinessGate::from_config(&config),
            ledger: TripRecordLedger::from_config(&config),
            config,
            metrics,
            clock: epoch_ms,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn TripObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Run the tracker, consuming commands until every sender is dropped
    pub async fn run(mut self, mut cmd_rx: mpsc::Receiver<TrackerCmd>) {
        let mut metrics_interval =
            interval(Duration::from_secs(self.config.metrics_interval_secs().max(1)));
        metrics_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("tracker_started");

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_cmd(cmd),
                        None => break,
                    }
                }
                _ = metrics_interval.tick() => {
                    self.metrics.report().log();
                }
            }
        }

        info!("tracker_stopped");
    }

    fn handle_cmd(&mut self, cmd: TrackerCmd) {
        match cmd {
            TrackerCmd::Fix(sample) => {
                self.process_fix(sample);
            }
            TrackerCmd::CheckNow { sample, reply } => {
                let _ = reply.send(self.check_now(sample));
            }
            TrackerCmd::StartTracking { first_fix, reply } => {
                let _ = reply.send(self.start_tracking(first_fix));
            }
            TrackerCmd::StopTracking { reply } => {
                let _ = reply.send(self.stop_tracking());
            }
            TrackerCmd::RecordManual { trip_type, reply } => {
                let _ = reply.send(self.record_manual(trip_type));
            }
            TrackerCmd::SetAnchor { kind, point, reply } => {
                let _ = reply.send(self.set_anchor(kind, point));
            }
            TrackerCmd::Undo { record_id, reply } => {
                let _ = reply.send(self.request_undo(record_id));
            }
            TrackerCmd::ResetToday { reply } => {
                let _ = reply.send(self.reset_today());
            }
            TrackerCmd::ResetAll { reply } => {
                let _ = reply.send(self.reset_all());
            }
            TrackerCmd::Summary { reply } => {
                let _ = reply.send(self.summary());
            }
            TrackerCmd::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }
}
