//! Command channel into the tracker actor
//!
//! Every trigger goes through one bounded channel drained by `Tracker::run`,
//! so location cycles and manual actions never interleave.

use super::{CycleOutcome, Tracker, TrackerError, TrackerStatus};
use crate::domain::types::{AnchorKind, AnchorPoint, LocationSample, TripType};
use crate::services::ledger::TripSummary;
use tokio::sync::{mpsc, oneshot};

type Reply<T> = oneshot::Sender<Result<T, TrackerError>>;

/// A command for the tracker actor
#[derive(Debug)]
pub enum TrackerCmd {
    /// Periodic fix from the location feed; `None` means no fix was available
    Fix(Option<LocationSample>),
    CheckNow { sample: Option<LocationSample>, reply: oneshot::Sender<CycleOutcome> },
    StartTracking { first_fix: Option<LocationSample>, reply: Reply<CycleOutcome> },
    StopTracking { reply: Reply<()> },
    RecordManual { trip_type: TripType, reply: Reply<()> },
    SetAnchor { kind: AnchorKind, point: AnchorPoint, reply: Reply<()> },
    Undo { record_id: u64, reply: Reply<bool> },
    ResetToday { reply: Reply<()> },
    ResetAll { reply: Reply<()> },
    Summary { reply: Reply<TripSummary> },
    Status { reply: Reply<TrackerStatus> },
}

/// Cloneable handle for sending commands to a running tracker
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    tx: mpsc::Sender<TrackerCmd>,
}

impl TrackerHandle {
    pub fn new(tx: mpsc::Sender<TrackerCmd>) -> Self {
        Self { tx }
    }

    /// Raw sender, used by the location feed
    pub fn sender(&self) -> mpsc::Sender<TrackerCmd> {
        self.tx.clone()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> TrackerCmd,
    ) -> Result<T, TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).await.map_err(|_| TrackerError::Closed)?;
        rx.await.map_err(|_| TrackerError::Closed)?
    }

    pub async fn check_now(
        &self,
        sample: Option<LocationSample>,
    ) -> Result<CycleOutcome, TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(TrackerCmd::CheckNow { sample, reply })
            .await
            .map_err(|_| TrackerError::Closed)?;
        rx.await.map_err(|_| TrackerError::Closed)
    }

    pub async fn start_tracking(
        &self,
        first_fix: Option<LocationSample>,
    ) -> Result<CycleOutcome, TrackerError> {
        self.request(|reply| TrackerCmd::StartTracking { first_fix, reply }).await
    }

    pub async fn stop_tracking(&self) -> Result<(), TrackerError> {
        self.request(|reply| TrackerCmd::StopTracking { reply }).await
    }

    pub async fn record_manual(&self, trip_type: TripType) -> Result<(), TrackerError> {
        self.request(|reply| TrackerCmd::RecordManual { trip_type, reply }).await
    }

    pub async fn set_anchor(&self, kind: AnchorKind, point: AnchorPoint) -> Result<(), TrackerError> {
        self.request(|reply| TrackerCmd::SetAnchor { kind, point, reply }).await
    }

    pub async fn request_undo(&self, record_id: u64) -> Result<bool, TrackerError> {
        self.request(|reply| TrackerCmd::Undo { record_id, reply }).await
    }

    pub async fn reset_today(&self) -> Result<(), TrackerError> {
        self.request(|reply| TrackerCmd::ResetToday { reply }).await
    }

    pub async fn reset_all(&self) -> Result<(), TrackerError> {
        self.request(|reply| TrackerCmd::ResetAll { reply }).await
    }

    pub async fn summary(&self) -> Result<TripSummary, TrackerError> {
        self.request(|reply| TrackerCmd::Summary { reply }).await
    }

    pub async fn status(&self) -> Result<TrackerStatus, TrackerError> {
        self.request(|reply| TrackerCmd::Status { reply }).await
    }
}

/// Tracker bound to its command receiver, ready to be spawned
pub struct TrackerWorker {
    tracker: Tracker,
    cmd_rx: mpsc::Receiver<TrackerCmd>,
}

impl TrackerWorker {
    pub async fn run(self) {
        self.tracker.run(self.cmd_rx).await;
    }
}

/// Create a tracker command channel and worker
///
/// Returns the handle (for producers) and the worker (to be spawned)
pub fn create_tracker(tracker: Tracker, buffer_size: usize) -> (TrackerHandle, TrackerWorker) {
    let (tx, cmd_rx) = mpsc::channel(buffer_size);
    (TrackerHandle::new(tx), TrackerWorker { tracker, cmd_rx })
}
