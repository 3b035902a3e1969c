//! Plausibility check that a completed journey was made on foot

use crate::domain::trip::JourneyMotionStats;
use crate::infra::config::Config;

/// Accepts journeys with enough moving samples and few high-speed samples
#[derive(Debug, Clone, Copy)]
pub struct WalkinessGate {
    min_moving_samples: u32,
    max_high_speed_samples: u32,
}

impl WalkinessGate {
    pub fn new(min_moving_samples: u32, max_high_speed_samples: u32) -> Self {
        Self { min_moving_samples, max_high_speed_samples }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.min_moving_samples(), config.max_high_speed_samples())
    }

    pub fn accepts(&self, stats: &JourneyMotionStats) -> bool {
        stats.moving_sample_count >= self.min_moving_samples
            && stats.high_speed_sample_count < self.max_high_speed_samples
    }
}

impl Default for WalkinessGate {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
