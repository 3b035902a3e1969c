//! Motion sample evaluation for the open journey
//!
//! Speed comes from the provider when it reports a trustworthy value, and is
//! otherwise derived from the distance to the previous cached sample. The
//! derived speed has no upper bound on the gap between samples, so a long
//! outage followed by a distant fix can count as a high-speed sample.

use crate::domain::trip::{JourneyMotionStats, SampleFix};
use crate::domain::types::LocationSample;
use crate::infra::config::Config;
use tracing::trace;

/// Estimate the speed of `sample` in m/s, or None if it cannot be estimated
pub fn estimate_speed(sample: &LocationSample, previous: Option<&SampleFix>) -> Option<f64> {
    if let Some(speed) = sample.trusted_speed() {
        return Some(speed);
    }

    let previous = previous?;
    if previous.timestamp_ms > sample.timestamp_ms {
        return None;
    }

    let delta_ms = sample.timestamp_ms - previous.timestamp_ms;
    if delta_ms == 0 {
        return None;
    }

    let distance_m = previous.point().distance_to(&sample.point());
    let speed = distance_m / (delta_ms as f64 / 1000.0);
    (speed.is_finite() && speed >= 0.0).then_some(speed)
}

/// Folds per-sample speed into journey motion statistics
#[derive(Debug, Clone, Copy)]
pub struct MotionSampleEvaluator {
    moving_min_speed_mps: f64,
    walking_max_speed_mps: f64,
}

impl MotionSampleEvaluator {
    pub fn new(moving_min_speed_mps: f64, walking_max_speed_mps: f64) -> Self {
        Self { moving_min_speed_mps, walking_max_speed_mps }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.moving_min_speed_mps(), config.walking_max_speed_mps())
    }

    /// Fold a speed estimate into the stats. No-op for None.
    pub fn update(&self, stats: &mut JourneyMotionStats, speed: Option<f64>) {
        let Some(speed) = speed else {
            return;
        };

        stats.max_speed_mps = stats.max_speed_mps.max(speed);
        if speed >= self.moving_min_speed_mps {
            stats.moving_sample_count += 1;
        }
        if speed > self.walking_max_speed_mps {
            stats.high_speed_sample_count += 1;
        }
    }

    /// Estimate the sample's speed, fold it in, and cache the sample as the
    /// previous one whether or not a speed was available.
    pub fn observe(&self, stats: &mut JourneyMotionStats, sample: &LocationSample) -> Option<f64> {
        let speed = estimate_speed(sample, stats.last_sample.as_ref());
        self.update(stats, speed);
        stats.last_sample = Some(SampleFix::from(sample));

        trace!(
            speed_mps = ?speed,
            moving = %stats.moving_sample_count,
            high_speed = %stats.high_speed_sample_count,
            "motion_sample_observed"
        );
        speed
    }
}

impl Default for MotionSampleEvaluator {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
