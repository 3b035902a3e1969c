//! Dwell-confirmed journey state machine
//!
//! Leaving a known zone opens a journey. Returning to the origin cancels it.
//! Arrival at the opposite zone is only confirmed after both a minimum dwell
//! time and a minimum number of samples inside it; any observation outside
//! the destination in between restarts the dwell.

use crate::domain::trip::{TripEvent, TripState, TripStep};
use crate::domain::types::Zone;
use crate::infra::config::Config;
use tracing::{debug, warn};

/// Journey state machine with configurable arrival thresholds
#[derive(Debug, Clone, Copy)]
pub struct TripStateMachine {
    arrival_confirm_ms: u64,
    arrival_min_samples: u32,
}

impl TripStateMachine {
    pub fn new(arrival_confirm_ms: u64, arrival_min_samples: u32) -> Self {
        Self { arrival_confirm_ms, arrival_min_samples }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.arrival_confirm_ms(), config.arrival_min_samples())
    }

    /// Advance the machine by one zone observation at `now_ms`
    pub fn step(&self, state: &TripState, observed: Zone, now_ms: u64) -> TripStep {
        let Some(origin) = state.journey_origin else {
            return Self::step_settled(state, observed);
        };

        let Some(destination) = origin.opposite() else {
            warn!(stable_zone = %state.stable_zone, "trip_state_corrupt_origin_reset");
            return TripStep { state: TripState::default(), event: TripEvent::None };
        };

        if observed == origin {
            debug!(origin = %origin, "journey_cancelled");
            return TripStep {
                state: TripState::settled(origin),
                event: TripEvent::JourneyCancelled { origin },
            };
        }

        if observed != destination {
            let mut next = state.clone();
            next.clear_candidate();
            return TripStep { state: next, event: TripEvent::None };
        }

        let (since_ms, samples) = if state.arrival_candidate == Some(destination) {
            (state.arrival_candidate_since_ms, state.arrival_candidate_samples.saturating_add(1))
        } else {
            (now_ms, 1)
        };

        let dwell_ms = now_ms.saturating_sub(since_ms);
        if dwell_ms >= self.arrival_confirm_ms && samples >= self.arrival_min_samples {
            debug!(
                origin = %origin,
                destination = %destination,
                dwell_ms = %dwell_ms,
                samples = %samples,
                "arrival_confirmed"
            );
            return TripStep {
                state: TripState::settled(destination),
                event: TripEvent::TripCompleted { origin, destination },
            };
        }

        debug!(
            destination = %destination,
            dwell_ms = %dwell_ms,
            samples = %samples,
            "arrival_pending"
        );
        TripStep {
            state: TripState {
                stable_zone: state.stable_zone,
                journey_origin: Some(origin),
                arrival_candidate: Some(destination),
                arrival_candidate_since_ms: since_ms,
                arrival_candidate_samples: samples,
            },
            event: TripEvent::None,
        }
    }

    fn step_settled(state: &TripState, observed: Zone) -> TripStep {
        if state.stable_zone.is_known() && observed == Zone::Unknown {
            let origin = state.stable_zone;
            let mut next = state.clone();
            next.journey_origin = Some(origin);
            next.clear_candidate();
            debug!(origin = %origin, "journey_started");
            return TripStep { state: next, event: TripEvent::JourneyStarted { origin } };
        }

        let mut next = state.clone();
        if observed.is_known() {
            next.stable_zone = observed;
        }
        TripStep { state: next, event: TripEvent::None }
    }
}

impl Default for TripStateMachine {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> TripStateMachine {
        TripStateMachine::new(60_000, 2)
    }

    fn in_journey(origin: Zone) -> TripState {
        TripState { stable_zone: origin, journey_origin: Some(origin), ..TripState::default() }
    }

    #[test]
    fn test_home_to_university_after_confirmed_arrival() {
        let machine = machine();
        let mut state = TripState::settled(Zone::Home);

        let step = machine.step(&state, Zone::Home, 0);
        assert_eq!(step.event, TripEvent::None);
        state = step.state;

        let step = machine.step(&state, Zone::Unknown, 30_000);
        assert_eq!(step.event, TripEvent::JourneyStarted { origin: Zone::Home });
        state = step.state;

        let step = machine.step(&state, Zone::University, 60_000);
        assert_eq!(step.event, TripEvent::None);
        assert_eq!(step.state.arrival_candidate, Some(Zone::University));
        assert_eq!(step.state.arrival_candidate_samples, 1);
        state = step.state;

        let step = machine.step(&state, Zone::University, 120_000);
        assert_eq!(
            step.event,
            TripEvent::TripCompleted { origin: Zone::Home, destination: Zone::University }
        );
        assert_eq!(step.state, TripState::settled(Zone::University));
    }

    #[test]
    fn test_repeated_destination_completes_exactly_once() {
        let machine = machine();
        let mut state = machine.step(&TripState::settled(Zone::Home), Zone::Unknown, 0).state;

        let mut completions = 0;
        for i in 1..=10u64 {
            let step = machine.step(&state, Zone::University, i * 20_000);
            if matches!(step.event, TripEvent::TripCompleted { .. }) {
                completions += 1;
            }
            state = step.state;
        }

        assert_eq!(completions, 1);
        assert_eq!(state, TripState::settled(Zone::University));
    }

    #[test]
    fn test_movement_inside_zone_never_starts_journey() {
        let machine = machine();
        let mut state = TripState::settled(Zone::University);

        for idx in 0..5u64 {
            let step = machine.step(&state, Zone::University, idx * 30_000);
            assert_eq!(step.event, TripEvent::None);
            state = step.state;
        }
        assert!(!state.is_mid_journey());
    }

    #[test]
    fn test_return_to_origin_cancels() {
        let machine = machine();
        for origin in [Zone::Home, Zone::University] {
            let mut state = in_journey(origin);
            state.arrival_candidate = origin.opposite();
            state.arrival_candidate_since_ms = 1_000;
            state.arrival_candidate_samples = 1;

            let step = machine.step(&state, origin, 20_000);
            assert_eq!(step.event, TripEvent::JourneyCancelled { origin });
            assert_eq!(step.state, TripState::settled(origin));
        }
    }

    #[test]
    fn test_unknown_clears_candidate() {
        let machine = machine();
        let state = machine.step(&in_journey(Zone::Home), Zone::University, 10_000).state;
        assert_eq!(state.arrival_candidate_samples, 1);

        let step = machine.step(&state, Zone::Unknown, 20_000);
        assert_eq!(step.event, TripEvent::None);
        assert_eq!(step.state.journey_origin, Some(Zone::Home));
        assert_eq!(step.state.arrival_candidate, None);
        assert_eq!(step.state.arrival_candidate_samples, 0);

        // Dwell restarts from the next destination sample
        let step = machine.step(&step.state, Zone::University, 90_000);
        assert_eq!(step.event, TripEvent::None);
        assert_eq!(step.state.arrival_candidate_since_ms, 90_000);
        assert_eq!(step.state.arrival_candidate_samples, 1);
    }

    #[test]
    fn test_sample_count_alone_is_not_enough() {
        let machine = machine();
        let mut state = in_journey(Zone::University);
        for i in 0..5u64 {
            let step = machine.step(&state, Zone::Home, 1_000 + i * 1_000);
            assert_eq!(step.event, TripEvent::None);
            state = step.state;
        }
        assert_eq!(state.arrival_candidate_samples, 5);
    }

    #[test]
    fn test_dwell_alone_is_not_enough() {
        let machine = TripStateMachine::new(60_000, 3);
        let state = machine.step(&in_journey(Zone::Home), Zone::University, 0).state;
        let step = machine.step(&state, Zone::University, 600_000);
        assert_eq!(step.event, TripEvent::None);
        assert_eq!(step.state.arrival_candidate_samples, 2);
    }

    #[test]
    fn test_unknown_while_unknown_is_noop() {
        let machine = machine();
        let state = TripState::default();
        let step = machine.step(&state, Zone::Unknown, 1_000);
        assert_eq!(step.event, TripEvent::None);
        assert_eq!(step.state, state);

        let step = machine.step(&state, Zone::Home, 2_000);
        assert_eq!(step.state, TripState::settled(Zone::Home));
    }

    #[test]
    fn test_corrupt_origin_resets() {
        let machine = machine();
        let state = in_journey(Zone::Unknown);
        let step = machine.step(&state, Zone::Home, 1_000);
        assert_eq!(step.event, TripEvent::None);
        assert_eq!(step.state, TripState::default());
    }

    #[test]
    fn test_zero_thresholds_confirm_on_first_sample() {
        let machine = TripStateMachine::new(0, 1);
        let step = machine.step(&in_journey(Zone::Home), Zone::University, 5_000);
        assert!(matches!(step.event, TripEvent::TripCompleted { .. }));
    }
}
