//! Full persisted tracker state, loaded and stored as one unit per cycle

use crate::domain::records::LedgerState;
use crate::domain::trip::{JourneyMotionStats, TripState};
use crate::domain::types::{AnchorKind, AnchorPoint};
use serde::{Deserialize, Serialize};

/// The two user-configured anchors
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Anchors {
    #[serde(default)]
    pub home: Option<AnchorPoint>,
    #[serde(default)]
    pub university: Option<AnchorPoint>,
}

impl Anchors {
    pub fn get(&self, kind: AnchorKind) -> Option<AnchorPoint> {
        match kind {
            AnchorKind::Home => self.home,
            AnchorKind::University => self.university,
        }
    }

    pub fn set(&mut self, kind: AnchorKind, point: AnchorPoint) {
        match kind {
            AnchorKind::Home => self.home = Some(point),
            AnchorKind::University => self.university = Some(point),
        }
    }

    /// Both anchors configured
    pub fn is_complete(&self) -> bool {
        self.home.is_some() && self.university.is_some()
    }
}

/// Everything the tracker persists between cycles
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    #[serde(default)]
    pub anchors: Anchors,
    #[serde(default)]
    pub trip_state: TripState,
    #[serde(default)]
    pub motion: JourneyMotionStats,
    #[serde(default)]
    pub ledger: LedgerState,
    #[serde(default)]
    pub tracking_enabled: bool,
    /// Time of the last processed fix (epoch ms)
    #[serde(default)]
    pub last_fix_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::GeoPoint;

    #[test]
    fn test_anchors_complete() {
        let mut anchors = Anchors::default();
        assert!(!anchors.is_complete());

        anchors.set(AnchorKind::Home, GeoPoint::new(1.0, 2.0));
        assert!(!anchors.is_complete());
        assert_eq!(anchors.get(AnchorKind::Home), Some(GeoPoint::new(1.0, 2.0)));

        anchors.set(AnchorKind::University, GeoPoint::new(1.0, 2.01));
        assert!(anchors.is_complete());
    }

    #[test]
    fn test_empty_json_loads_default() {
        let snapshot: TrackerSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot, TrackerSnapshot::default());
    }
}
