//! Trip record ledger - counters, single-level undo and cooldown
//!
//! Every recorded trip touches four counters at once: the day and all-time
//! aggregates for its type, and the day and all-time counters for its
//! source. Only the most recent automatic record is remembered, and it can
//! be undone exactly once.

use crate::domain::records::{CounterKey, CounterScope, LedgerState, TripRecord};
use crate::domain::snapshot::TrackerSnapshot;
use crate::domain::trip::{JourneyMotionStats, TripState};
use crate::domain::types::{RecordSource, TripType};
use crate::infra::config::Config;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

/// Ledger operations with the auto-record cooldown
#[derive(Debug, Clone, Copy)]
pub struct TripRecordLedger {
    cooldown_ms: u64,
}

impl TripRecordLedger {
    pub fn new(cooldown_ms: u64) -> Self {
        Self { cooldown_ms }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.auto_record_cooldown_ms())
    }

    /// Record a manual trip for `date`
    pub fn increment_manual(&self, ledger: &mut LedgerState, trip_type: TripType, date: NaiveDate) {
        for key in CounterKey::quad(date, trip_type, RecordSource::Manual) {
            ledger.counters.increment(key);
        }
        info!(trip_type = %trip_type, date = %date, "manual_trip_recorded");
    }

    /// True if enough time has passed since the last automatic commit
    pub fn can_commit(&self, ledger: &LedgerState, now_ms: u64) -> bool {
        match ledger.last_auto_commit_ms {
            Some(last) => now_ms.saturating_sub(last) >= self.cooldown_ms,
            None => true,
        }
    }

    /// Record an automatic trip and remember it for undo. Returns the record id.
    pub fn commit_auto(
        &self,
        ledger: &mut LedgerState,
        trip_type: TripType,
        now_ms: u64,
        date: NaiveDate,
    ) -> u64 {
        for key in CounterKey::quad(date, trip_type, RecordSource::Auto) {
            ledger.counters.increment(key);
        }

        let record_id = now_ms;
        ledger.last_auto_commit_ms = Some(now_ms);
        ledger.last_auto_record = Some(TripRecord {
            id: record_id,
            date,
            trip_type,
            source: RecordSource::Auto,
            undone: false,
        });

        info!(record_id = %record_id, trip_type = %trip_type, date = %date, "trip_committed");
        record_id
    }

    /// Undo the remembered automatic record if `record_id` matches it.
    ///
    /// Each counter is decremented only if positive. Unknown or already
    /// undone ids are a no-op and return false.
    pub fn undo(&self, ledger: &mut LedgerState, record_id: u64) -> bool {
        let Some(record) = ledger.last_auto_record.as_mut() else {
            debug!(record_id = %record_id, "undo_no_record");
            return false;
        };
        if record.id != record_id || record.undone {
            debug!(
                record_id = %record_id,
                last_id = %record.id,
                undone = %record.undone,
                "undo_ignored"
            );
            return false;
        }

        let mut decremented = 0;
        for key in CounterKey::quad(record.date, record.trip_type, RecordSource::Auto) {
            if ledger.counters.decrement_if_positive(&key) {
                decremented += 1;
            }
        }
        record.undone = true;

        info!(
            record_id = %record_id,
            trip_type = %record.trip_type,
            date = %record.date,
            decremented = %decremented,
            "auto_record_undone"
        );
        true
    }

    /// Clear the six day-scoped counters of `date`
    pub fn reset_today(&self, ledger: &mut LedgerState, date: NaiveDate) {
        for trip_type in TripType::ALL {
            for source in [None, Some(RecordSource::Manual), Some(RecordSource::Auto)] {
                ledger.counters.remove(&CounterKey::new(CounterScope::Day(date), trip_type, source));
            }
        }
        info!(date = %date, "records_reset_today");
    }

    /// Clear all records, undo/cooldown bookkeeping, journey state and motion stats.
    /// Anchors and the tracking flag survive.
    pub fn reset_all(&self, snapshot: &mut TrackerSnapshot) {
        snapshot.ledger = LedgerState::default();
        snapshot.trip_state = TripState::default();
        snapshot.motion = JourneyMotionStats::default();
        snapshot.last_fix_ms = None;
        info!("records_reset_all");
    }

    /// Today's and all-time counts
    pub fn summary(&self, ledger: &LedgerState, date: NaiveDate) -> TripSummary {
        TripSummary {
            date,
            today: ScopeSummary::collect(ledger, CounterScope::Day(date)),
            total: ScopeSummary::collect(ledger, CounterScope::Total),
        }
    }
}

impl Default for TripRecordLedger {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Counts for one trip type within a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TypeCounts {
    pub all: u32,
    pub manual: u32,
    pub auto: u32,
}

/// Counts for both trip types within a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScopeSummary {
    pub home_to_uni: TypeCounts,
    pub uni_to_home: TypeCounts,
    pub combined: u32,
}

impl ScopeSummary {
    fn collect(ledger: &LedgerState, scope: CounterScope) -> Self {
        let counts = |trip_type| {
            let get = |source| ledger.counters.get(&CounterKey::new(scope, trip_type, source));
            TypeCounts {
                all: get(None),
                manual: get(Some(RecordSource::Manual)),
                auto: get(Some(RecordSource::Auto)),
            }
        };
        let home_to_uni = counts(TripType::HomeToUniversity);
        let uni_to_home = counts(TripType::UniversityToHome);
        Self { home_to_uni, uni_to_home, combined: home_to_uni.all + uni_to_home.all }
    }
}

/// Today's and all-time trip counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TripSummary {
    pub date: NaiveDate,
    pub today: ScopeSummary,
    pub total: ScopeSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Zone;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn auto_quad(date: NaiveDate, trip_type: TripType) -> [CounterKey; 4] {
        CounterKey::quad(date, trip_type, RecordSource::Auto)
    }

    #[test]
    fn test_increment_manual_touches_four_counters() {
        let ledger = TripRecordLedger::default();
        let mut state = LedgerState::default();
        let date = day("2026-10-19");

        ledger.increment_manual(&mut state, TripType::UniversityToHome, date);

        for key in CounterKey::quad(date, TripType::UniversityToHome, RecordSource::Manual) {
            assert_eq!(state.counters.get(&key), 1, "{key}");
        }
        assert_eq!(state.counters.len(), 4);
        assert!(state.last_auto_record.is_none());
        assert!(state.last_auto_commit_ms.is_none());
    }

    #[test]
    fn test_commit_auto_remembers_record() {
        let ledger = TripRecordLedger::default();
        let mut state = LedgerState::default();
        let date = day("2026-10-19");

        let id = ledger.commit_auto(&mut state, TripType::HomeToUniversity, 120_000, date);

        assert_eq!(id, 120_000);
        assert_eq!(state.last_auto_commit_ms, Some(120_000));
        let record = state.last_auto_record.as_ref().unwrap();
        assert_eq!(record.id, 120_000);
        assert_eq!(record.date, date);
        assert_eq!(record.source, RecordSource::Auto);
        assert!(!record.undone);
        for key in auto_quad(date, TripType::HomeToUniversity) {
            assert_eq!(state.counters.get(&key), 1);
        }
    }

    #[test]
    fn test_undo_once() {
        let ledger = TripRecordLedger::default();
        let mut state = LedgerState::default();
        let date = day("2026-10-19");

        ledger.commit_auto(&mut state, TripType::HomeToUniversity, 1_000, date);
        let id = ledger.commit_auto(&mut state, TripType::HomeToUniversity, 2_000, date);
        for key in auto_quad(date, TripType::HomeToUniversity) {
            assert_eq!(state.counters.get(&key), 2);
        }

        assert!(ledger.undo(&mut state, id));
        for key in auto_quad(date, TripType::HomeToUniversity) {
            assert_eq!(state.counters.get(&key), 1);
        }
        assert!(state.last_auto_record.as_ref().unwrap().undone);

        let before = state.clone();
        assert!(!ledger.undo(&mut state, id));
        assert_eq!(state, before);
    }

    #[test]
    fn test_undo_unknown_id_is_noop() {
        let ledger = TripRecordLedger::default();
        let mut state = LedgerState::default();
        assert!(!ledger.undo(&mut state, 42));

        let id = ledger.commit_auto(&mut state, TripType::UniversityToHome, 5_000, day("2026-10-19"));
        let before = state.clone();
        assert!(!ledger.undo(&mut state, id + 1));
        assert_eq!(state, before);
    }

    #[test]
    fn test_undo_clamps_each_counter_independently() {
        let ledger = TripRecordLedger::default();
        let mut state = LedgerState::default();
        let date = day("2026-10-19");

        let id = ledger.commit_auto(&mut state, TripType::HomeToUniversity, 5_000, date);
        ledger.reset_today(&mut state, date);

        assert!(ledger.undo(&mut state, id));
        let [day_type, day_source, total_type, total_source] =
            auto_quad(date, TripType::HomeToUniversity);
        assert_eq!(state.counters.get(&day_type), 0);
        assert_eq!(state.counters.get(&day_source), 0);
        assert_eq!(state.counters.get(&total_type), 0);
        assert_eq!(state.counters.get(&total_source), 0);
        assert!(state.last_auto_record.as_ref().unwrap().undone);
    }

    #[test]
    fn test_undo_uses_recorded_date() {
        let ledger = TripRecordLedger::default();
        let mut state = LedgerState::default();
        let yesterday = day("2026-10-18");

        let id = ledger.commit_auto(&mut state, TripType::UniversityToHome, 5_000, yesterday);
        ledger.increment_manual(&mut state, TripType::UniversityToHome, day("2026-10-19"));

        assert!(ledger.undo(&mut state, id));
        for key in auto_quad(yesterday, TripType::UniversityToHome) {
            assert_eq!(state.counters.get(&key), 0);
        }
        let summary = ledger.summary(&state, day("2026-10-19"));
        assert_eq!(summary.today.uni_to_home, TypeCounts { all: 1, manual: 1, auto: 0 });
        assert_eq!(summary.total.uni_to_home, TypeCounts { all: 1, manual: 1, auto: 0 });
    }

    #[test]
    fn test_cooldown() {
        let ledger = TripRecordLedger::new(300_000);
        let mut state = LedgerState::default();
        assert!(ledger.can_commit(&state, 0));

        ledger.commit_auto(&mut state, TripType::HomeToUniversity, 1_000_000, day("2026-10-19"));
        assert!(!ledger.can_commit(&state, 1_000_000));
        assert!(!ledger.can_commit(&state, 1_299_999));
        assert!(ledger.can_commit(&state, 1_300_000));
        // Clock moved backwards
        assert!(!ledger.can_commit(&state, 900_000));
    }

    #[test]
    fn test_manual_does_not_touch_cooldown() {
        let ledger = TripRecordLedger::new(300_000);
        let mut state = LedgerState::default();
        ledger.increment_manual(&mut state, TripType::HomeToUniversity, day("2026-10-19"));
        assert!(ledger.can_commit(&state, 10));
    }

    #[test]
    fn test_reset_today_only_clears_that_date() {
        let ledger = TripRecordLedger::default();
        let mut state = LedgerState::default();
        let today = day("2026-10-19");
        let yesterday = day("2026-10-18");

        ledger.increment_manual(&mut state, TripType::HomeToUniversity, today);
        ledger.commit_auto(&mut state, TripType::UniversityToHome, 1, today);
        ledger.increment_manual(&mut state, TripType::HomeToUniversity, yesterday);

        ledger.reset_today(&mut state, today);

        let summary = ledger.summary(&state, today);
        assert_eq!(summary.today, ScopeSummary::default());
        assert_eq!(summary.total.home_to_uni.all, 2);
        assert_eq!(summary.total.uni_to_home.all, 1);
        assert_eq!(summary.total.combined, 3);
        assert_eq!(ledger.summary(&state, yesterday).today.home_to_uni.manual, 1);
    }

    #[test]
    fn test_reset_all() {
        let ledger = TripRecordLedger::default();
        let mut snapshot = TrackerSnapshot::default();
        snapshot.anchors.home = Some(crate::domain::types::GeoPoint::new(1.0, 1.0));
        snapshot.tracking_enabled = true;
        snapshot.trip_state = TripState {
            stable_zone: Zone::Home,
            journey_origin: Some(Zone::Home),
            arrival_candidate: Some(Zone::University),
            arrival_candidate_since_ms: 10,
            arrival_candidate_samples: 1,
        };
        snapshot.motion.moving_sample_count = 3;
        snapshot.last_fix_ms = Some(10);
        ledger.commit_auto(&mut snapshot.ledger, TripType::HomeToUniversity, 10, day("2026-10-19"));

        ledger.reset_all(&mut snapshot);

        assert!(snapshot.ledger.counters.is_empty());
        assert!(snapshot.ledger.last_auto_record.is_none());
        assert!(snapshot.ledger.last_auto_commit_ms.is_none());
        assert_eq!(snapshot.trip_state, TripState::default());
        assert_eq!(snapshot.motion, JourneyMotionStats::default());
        assert!(snapshot.last_fix_ms.is_none());
        assert!(snapshot.anchors.home.is_some());
        assert!(snapshot.tracking_enabled);
    }
}
