//! Journey state and motion statistics

use crate::domain::types::{GeoPoint, LocationSample, TripType, Zone};
use serde::{Deserialize, Serialize};

/// Persisted state of the journey state machine.
///
/// `journey_origin` is set iff a journey is open. `arrival_candidate` is only
/// set while a journey is open and the latest observation matched it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TripState {
    pub stable_zone: Zone,
    #[serde(default)]
    pub journey_origin: Option<Zone>,
    #[serde(default)]
    pub arrival_candidate: Option<Zone>,
    #[serde(default)]
    pub arrival_candidate_since_ms: u64,
    #[serde(default)]
    pub arrival_candidate_samples: u32,
}

impl TripState {
    /// Settled in `zone` with no journey open
    pub fn settled(zone: Zone) -> Self {
        Self { stable_zone: zone, ..Self::default() }
    }

    #[inline]
    pub fn is_mid_journey(&self) -> bool {
        self.journey_origin.is_some()
    }

    /// Drop any pending arrival candidate
    pub fn clear_candidate(&mut self) {
        self.arrival_candidate = None;
        self.arrival_candidate_since_ms = 0;
        self.arrival_candidate_samples = 0;
    }
}

/// Event produced by a state machine step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TripEvent {
    None,
    JourneyStarted { origin: Zone },
    JourneyCancelled { origin: Zone },
    TripCompleted { origin: Zone, destination: Zone },
}

impl TripEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripEvent::None => "none",
            TripEvent::JourneyStarted { .. } => "journey_started",
            TripEvent::JourneyCancelled { .. } => "journey_cancelled",
            TripEvent::TripCompleted { .. } => "trip_completed",
        }
    }

    /// Trip type of a completion event
    pub fn trip_type(&self) -> Option<TripType> {
        match self {
            TripEvent::TripCompleted { origin, .. } => TripType::from_origin(*origin),
            _ => None,
        }
    }
}

/// Result of one state machine step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripStep {
    pub state: TripState,
    pub event: TripEvent,
}

/// Cached coordinates and time of the previous motion sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleFix {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: u64,
}

impl SampleFix {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

impl From<&LocationSample> for SampleFix {
    fn from(sample: &LocationSample) -> Self {
        Self {
            latitude: sample.latitude,
            longitude: sample.longitude,
            timestamp_ms: sample.timestamp_ms,
        }
    }
}

/// Running motion profile of the open journey
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JourneyMotionStats {
    pub max_speed_mps: f64,
    pub moving_sample_count: u32,
    pub high_speed_sample_count: u32,
    #[serde(default)]
    pub last_sample: Option<SampleFix>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_trip_state() {
        let state = TripState::default();
        assert_eq!(state.stable_zone, Zone::Unknown);
        assert!(!state.is_mid_journey());
        assert_eq!(state.arrival_candidate_samples, 0);
    }

    #[test]
    fn test_clear_candidate() {
        let mut state = TripState {
            stable_zone: Zone::Home,
            journey_origin: Some(Zone::Home),
            arrival_candidate: Some(Zone::University),
            arrival_candidate_since_ms: 5000,
            arrival_candidate_samples: 3,
        };
        state.clear_candidate();
        assert_eq!(state.journey_origin, Some(Zone::Home));
        assert_eq!(state.arrival_candidate, None);
        assert_eq!(state.arrival_candidate_since_ms, 0);
        assert_eq!(state.arrival_candidate_samples, 0);
    }

    #[test]
    fn test_event_trip_type() {
        let event = TripEvent::TripCompleted { origin: Zone::University, destination: Zone::Home };
        assert_eq!(event.trip_type(), Some(TripType::UniversityToHome));
        assert_eq!(event.as_str(), "trip_completed");
        assert_eq!(TripEvent::JourneyStarted { origin: Zone::Home }.trip_type(), None);
    }
}
