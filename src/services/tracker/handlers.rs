//! Cycle and manual-action handlers for the Tracker
//!
//! Each handler loads the snapshot, applies the pure services to it, stores
//! it back as one unit and only then notifies observers.

use super::{CycleOutcome, Tracker, TrackerError, TrackerStatus, TripDecision};
use crate::domain::snapshot::TrackerSnapshot;
use crate::domain::trip::{JourneyMotionStats, TripEvent};
use crate::domain::types::{local_date, AnchorKind, AnchorPoint, LocationSample, TripType};
use crate::io::notifier::TripNotification;
use crate::services::ledger::TripSummary;
use crate::services::zone_classifier::classify;
use smallvec::SmallVec;
use std::time::Instant;
use tracing::{debug, info, warn};

type Notifications = SmallVec<[TripNotification; 2]>;

impl Tracker {
    /// Handle a periodic fix. Ignored while tracking is disabled.
    pub fn process_fix(&mut self, sample: Option<LocationSample>) -> CycleOutcome {
        self.run_cycle(sample, true)
    }

    /// One full pass on demand, regardless of the tracking flag
    pub fn check_now(&mut self, sample: Option<LocationSample>) -> CycleOutcome {
        let outcome = self.run_cycle(sample, false);
        if let CycleOutcome::Processed { zone, .. } = outcome {
            info!(zone = %zone, "check_now_zone");
        }
        outcome
    }

    fn run_cycle(&mut self, sample: Option<LocationSample>, require_tracking: bool) -> CycleOutcome {
        let process_start = Instant::now();

        let Some(sample) = sample else {
            self.metrics.record_fix_skipped();
            debug!("fix_unavailable");
            return CycleOutcome::Skipped;
        };

        if !sample.point().is_valid() {
            self.metrics.record_fix_invalid();
            warn!(
                lat = %sample.latitude,
                lng = %sample.longitude,
                ts = %sample.timestamp_ms,
                "fix_invalid_dropped"
            );
            return CycleOutcome::Invalid;
        }

        let lock = match self.store.lock() {
            Ok(lock) => lock,
            Err(e) => {
                self.metrics.record_persistence_failure();
                warn!(error = %e, "cycle_lock_failed");
                return CycleOutcome::PersistenceFailed;
            }
        };

        let mut snapshot = match self.store.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.metrics.record_persistence_failure();
                warn!(error = %e, "cycle_load_failed");
                return CycleOutcome::PersistenceFailed;
            }
        };

        if require_tracking && !snapshot.tracking_enabled {
            self.metrics.record_fix_skipped();
            debug!(ts = %sample.timestamp_ms, "fix_ignored_tracking_disabled");
            return CycleOutcome::Skipped;
        }

        let now_ms = sample.timestamp_ms;
        let zone = classify(
            &sample.point(),
            snapshot.anchors.home.as_ref(),
            snapshot.anchors.university.as_ref(),
            self.zone_radius_m,
        );

        let step = self.machine.step(&snapshot.trip_state, zone, now_ms);
        let mut decision = None;

        match step.event {
            TripEvent::JourneyStarted { .. } => {
                snapshot.motion = JourneyMotionStats::default();
                self.motion.observe(&mut snapshot.motion, &sample);
            }
            TripEvent::JourneyCancelled { .. } => {
                snapshot.motion = JourneyMotionStats::default();
            }
            TripEvent::TripCompleted { origin, .. } => {
                self.motion.observe(&mut snapshot.motion, &sample);
                decision = TripType::from_origin(origin)
                    .map(|trip_type| self.decide_trip(&mut snapshot, trip_type, now_ms));
                snapshot.motion = JourneyMotionStats::default();
            }
            TripEvent::None => {
                if step.state.is_mid_journey() {
                    self.motion.observe(&mut snapshot.motion, &sample);
                }
            }
        }

        snapshot.trip_state = step.state;
        snapshot.last_fix_ms = Some(now_ms);

        if let Err(e) = self.store.store(&snapshot) {
            self.metrics.record_persistence_failure();
            warn!(error = %e, event = %step.event.as_str(), "cycle_store_failed");
            return CycleOutcome::PersistenceFailed;
        }
        drop(lock);

        let notifications = self.record_cycle_effects(step.event, decision);
        self.notify(&notifications);

        self.metrics.record_cycle(process_start.elapsed().as_micros() as u64);
        debug!(
            zone = %zone,
            event = %step.event.as_str(),
            stable_zone = %snapshot.trip_state.stable_zone,
            "cycle_processed"
        );

        CycleOutcome::Processed { zone, event: step.event, decision }
    }

    /// Cooldown first, then walkiness, then commit
    fn decide_trip(
        &self,
        snapshot: &mut TrackerSnapshot,
        trip_type: TripType,
        now_ms: u64,
    ) -> TripDecision {
        if !self.ledger.can_commit(&snapshot.ledger, now_ms) {
            debug!(
                trip_type = %trip_type,
                last_commit_ms = ?snapshot.ledger.last_auto_commit_ms,
                "trip_skipped_cooldown"
            );
            return TripDecision::SkippedCooldown;
        }

        if !self.walkiness.accepts(&snapshot.motion) {
            info!(
                trip_type = %trip_type,
                moving = %snapshot.motion.moving_sample_count,
                high_speed = %snapshot.motion.high_speed_sample_count,
                max_speed_mps = format!("{:.2}", snapshot.motion.max_speed_mps),
                "trip_skipped_not_walking"
            );
            return TripDecision::SkippedNotWalking;
        }

        let record_id =
            self.ledger.commit_auto(&mut snapshot.ledger, trip_type, now_ms, local_date(now_ms));
        TripDecision::Committed { record_id }
    }

    fn record_cycle_effects(
        &self,
        event: TripEvent,
        decision: Option<TripDecision>,
    ) -> Notifications {
        let mut notifications = Notifications::new();

        match event {
            TripEvent::JourneyStarted { origin } => {
                self.metrics.record_journey_started();
                notifications.push(TripNotification::JourneyStarted { origin });
            }
            TripEvent::JourneyCancelled { .. } => {
                self.metrics.record_journey_cancelled();
            }
            TripEvent::TripCompleted { .. } => {
                self.metrics.record_trip_completed();
            }
            TripEvent::None => {}
        }

        let trip_type = event.trip_type();
        match (decision, trip_type) {
            (Some(TripDecision::Committed { record_id }), Some(trip_type)) => {
                self.metrics.record_trip_committed();
                notifications.push(TripNotification::TripCompleted { trip_type, record_id });
            }
            (Some(TripDecision::SkippedNotWalking), Some(trip_type)) => {
                self.metrics.record_skipped_not_walking();
                notifications.push(TripNotification::SkippedNotWalking { trip_type });
            }
            (Some(TripDecision::SkippedCooldown), _) => {
                self.metrics.record_skipped_cooldown();
            }
            _ => {}
        }

        notifications
    }

    fn notify(&self, notifications: &[TripNotification]) {
        for notification in notifications {
            for observer in &self.observers {
                notification.dispatch(observer.as_ref());
            }
        }
    }

    /// Load, mutate and store the snapshot for a manual action while holding
    /// the store lock
    fn update_snapshot<T>(
        &self,
        op: &str,
        apply: impl FnOnce(&Self, &mut TrackerSnapshot) -> Result<T, TrackerError>,
    ) -> Result<T, TrackerError> {
        let _lock = self.store.lock().inspect_err(|e| {
            self.metrics.record_persistence_failure();
            warn!(op = %op, error = %e, "action_lock_failed");
        })?;

        let mut snapshot = self.store.load().inspect_err(|e| {
            self.metrics.record_persistence_failure();
            warn!(op = %op, error = %e, "action_load_failed");
        })?;

        let result = apply(self, &mut snapshot)?;

        self.store.store(&snapshot).inspect_err(|e| {
            self.metrics.record_persistence_failure();
            warn!(op = %op, error = %e, "action_store_failed");
        })?;

        Ok(result)
    }

    /// Enable tracking and process the first fix. Both anchors must be set.
    pub fn start_tracking(
        &mut self,
        first_fix: Option<LocationSample>,
    ) -> Result<CycleOutcome, TrackerError> {
        self.update_snapshot("start_tracking", |_, snapshot| {
            if !snapshot.anchors.is_complete() {
                return Err(TrackerError::AnchorsMissing);
            }
            snapshot.tracking_enabled = true;
            Ok(())
        })?;
        info!("tracking_started");

        Ok(self.process_fix(first_fix))
    }

    pub fn stop_tracking(&mut self) -> Result<(), TrackerError> {
        self.update_snapshot("stop_tracking", |_, snapshot| {
            snapshot.tracking_enabled = false;
            Ok(())
        })?;
        info!("tracking_stopped");
        Ok(())
    }

    pub fn record_manual(&mut self, trip_type: TripType) -> Result<(), TrackerError> {
        let date = local_date((self.clock)());
        self.update_snapshot("record_manual", |tracker, snapshot| {
            tracker.ledger.increment_manual(&mut snapshot.ledger, trip_type, date);
            Ok(())
        })?;
        self.metrics.record_manual();
        Ok(())
    }

    pub fn set_anchor(&mut self, kind: AnchorKind, point: AnchorPoint) -> Result<(), TrackerError> {
        if !point.is_valid() {
            warn!(anchor = ?kind, lat = %point.latitude, lng = %point.longitude, "anchor_invalid");
            return Err(TrackerError::InvalidAnchor);
        }
        self.update_snapshot("set_anchor", |_, snapshot| {
            snapshot.anchors.set(kind, point);
            Ok(())
        })?;
        info!(anchor = %kind.zone(), lat = %point.latitude, lng = %point.longitude, "anchor_set");
        Ok(())
    }

    /// Undo the remembered automatic record. False if the id does not match
    /// or the record was already undone.
    pub fn request_undo(&mut self, record_id: u64) -> Result<bool, TrackerError> {
        let undone = self.update_snapshot("undo", |tracker, snapshot| {
            Ok(tracker.ledger.undo(&mut snapshot.ledger, record_id))
        })?;

        if undone {
            self.metrics.record_undo();
            self.notify(&[TripNotification::AutoRecordUndone { record_id }]);
        }
        Ok(undone)
    }

    pub fn reset_today(&mut self) -> Result<(), TrackerError> {
        let date = local_date((self.clock)());
        self.update_snapshot("reset_today", |tracker, snapshot| {
            tracker.ledger.reset_today(&mut snapshot.ledger, date);
            Ok(())
        })
    }

    pub fn reset_all(&mut self) -> Result<(), TrackerError> {
        self.update_snapshot("reset_all", |tracker, snapshot| {
            tracker.ledger.reset_all(snapshot);
            Ok(())
        })
    }

    pub fn summary(&self) -> Result<TripSummary, TrackerError> {
        let snapshot = self.store.load()?;
        Ok(self.ledger.summary(&snapshot.ledger, local_date((self.clock)())))
    }

    pub fn status(&self) -> Result<TrackerStatus, TrackerError> {
        let snapshot = self.store.load()?;
        Ok(TrackerStatus {
            anchors: snapshot.anchors,
            stable_zone: snapshot.trip_state.stable_zone,
            journey_origin: snapshot.trip_state.journey_origin,
            tracking_enabled: snapshot.tracking_enabled,
            last_fix_ms: snapshot.last_fix_ms,
            last_auto_record: snapshot.ledger.last_auto_record,
        })
    }
}
