//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> (parsed by the CLI, see `load_from_path`)
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

fn path_or_default(env_path: Option<String>) -> String {
    env_path.filter(|path| !path.is_empty()).unwrap_or_else(|| "config/dev.toml".to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZonesConfig {
    /// Radius around each anchor that counts as inside the zone
    #[serde(default = "default_zone_radius_m")]
    pub radius_m: f64,
}

impl Default for ZonesConfig {
    fn default() -> Self {
        Self { radius_m: default_zone_radius_m() }
    }
}

fn default_zone_radius_m() -> f64 {
    150.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArrivalConfig {
    /// Minimum dwell in the destination before a trip is confirmed
    #[serde(default = "default_arrival_confirm_ms")]
    pub confirm_ms: u64,
    /// Minimum number of destination samples before a trip is confirmed
    #[serde(default = "default_arrival_min_samples")]
    pub min_samples: u32,
}

impl Default for ArrivalConfig {
    fn default() -> Self {
        Self { confirm_ms: default_arrival_confirm_ms(), min_samples: default_arrival_min_samples() }
    }
}

fn default_arrival_confirm_ms() -> u64 {
    60_000
}

fn default_arrival_min_samples() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct MotionConfig {
    #[serde(default = "default_moving_min_speed")]
    pub moving_min_speed_mps: f64,
    #[serde(default = "default_walking_max_speed")]
    pub walking_max_speed_mps: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            moving_min_speed_mps: default_moving_min_speed(),
            walking_max_speed_mps: default_walking_max_speed(),
        }
    }
}

fn default_moving_min_speed() -> f64 {
    0.5
}

fn default_walking_max_speed() -> f64 {
    3.2
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalkinessConfig {
    #[serde(default = "default_min_moving_samples")]
    pub min_moving_samples: u32,
    /// A journey with this many high-speed samples is not a walk
    #[serde(default = "default_max_high_speed_samples")]
    pub max_high_speed_samples: u32,
}

impl Default for WalkinessConfig {
    fn default() -> Self {
        Self {
            min_moving_samples: default_min_moving_samples(),
            max_high_speed_samples: default_max_high_speed_samples(),
        }
    }
}

fn default_min_moving_samples() -> u32 {
    2
}

fn default_max_high_speed_samples() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct CooldownConfig {
    /// Minimum gap between two automatic records
    #[serde(default = "default_auto_record_cooldown_ms")]
    pub auto_record_ms: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self { auto_record_ms: default_auto_record_cooldown_ms() }
    }
}

fn default_auto_record_cooldown_ms() -> u64 {
    5 * 60 * 1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    #[serde(default = "default_min_update_interval_ms")]
    pub min_update_interval_ms: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval_ms(),
            min_update_interval_ms: default_min_update_interval_ms(),
        }
    }
}

fn default_update_interval_ms() -> u64 {
    30_000
}

fn default_min_update_interval_ms() -> u64 {
    15_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// JSON file holding the persisted tracker snapshot
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

fn default_store_path() -> String {
    "walk_state.json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_journal_enabled")]
    pub enabled: bool,
    /// File path for the notification journal (JSONL format)
    #[serde(default = "default_journal_path")]
    pub path: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { enabled: default_journal_enabled(), path: default_journal_path() }
    }
}

fn default_journal_enabled() -> bool {
    true
}

fn default_journal_path() -> String {
    "trips.jsonl".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval_secs() }
    }
}

fn default_metrics_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub zones: ZonesConfig,
    #[serde(default)]
    pub arrival: ArrivalConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub walkiness: WalkinessConfig,
    #[serde(default)]
    pub cooldown: CooldownConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    zone_radius_m: f64,
    arrival_confirm_ms: u64,
    arrival_min_samples: u32,
    moving_min_speed_mps: f64,
    walking_max_speed_mps: f64,
    min_moving_samples: u32,
    max_high_speed_samples: u32,
    auto_record_cooldown_ms: u64,
    location_update_interval_ms: u64,
    location_min_update_interval_ms: u64,
    store_path: String,
    journal_enabled: bool,
    journal_path: String,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            zone_radius_m: toml_config.zones.radius_m,
            arrival_confirm_ms: toml_config.arrival.confirm_ms,
            arrival_min_samples: toml_config.arrival.min_samples,
            moving_min_speed_mps: toml_config.motion.moving_min_speed_mps,
            walking_max_speed_mps: toml_config.motion.walking_max_speed_mps,
            min_moving_samples: toml_config.walkiness.min_moving_samples,
            max_high_speed_samples: toml_config.walkiness.max_high_speed_samples,
            auto_record_cooldown_ms: toml_config.cooldown.auto_record_ms,
            location_update_interval_ms: toml_config.location.update_interval_ms,
            location_min_update_interval_ms: toml_config.location.min_update_interval_ms,
            store_path: toml_config.store.path,
            journal_enabled: toml_config.journal.enabled,
            journal_path: toml_config.journal.path,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file: config_file.to_string(),
        }
    }

    /// Determine config file path from the environment
    pub fn resolve_config_path() -> String {
        path_or_default(env::var("CONFIG_FILE").ok())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration from a path, falling back to defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load() -> Self {
        Self::load_from_path(Self::resolve_config_path())
    }

    pub fn zone_radius_m(&self) -> f64 {
        self.zone_radius_m
    }

    pub fn arrival_confirm_ms(&self) -> u64 {
        self.arrival_confirm_ms
    }

    pub fn arrival_min_samples(&self) -> u32 {
        self.arrival_min_samples
    }

    pub fn moving_min_speed_mps(&self) -> f64 {
        self.moving_min_speed_mps
    }

    pub fn walking_max_speed_mps(&self) -> f64 {
        self.walking_max_speed_mps
    }

    pub fn min_moving_samples(&self) -> u32 {
        self.min_moving_samples
    }

    pub fn max_high_speed_samples(&self) -> u32 {
        self.max_high_speed_samples
    }

    pub fn auto_record_cooldown_ms(&self) -> u64 {
        self.auto_record_cooldown_ms
    }

    pub fn location_update_interval_ms(&self) -> u64 {
        self.location_update_interval_ms
    }

    pub fn location_min_update_interval_ms(&self) -> u64 {
        self.location_min_update_interval_ms
    }

    pub fn store_path(&self) -> &str {
        &self.store_path
    }

    pub fn journal_enabled(&self) -> bool {
        self.journal_enabled
    }

    pub fn journal_path(&self) -> &str {
        &self.journal_path
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set the arrival thresholds
    pub fn with_arrival(mut self, confirm_ms: u64, min_samples: u32) -> Self {
        self.arrival_confirm_ms = confirm_ms;
        self.arrival_min_samples = min_samples;
        self
    }

    /// Builder method for tests to set the zone radius
    pub fn with_zone_radius_m(mut self, radius_m: f64) -> Self {
        self.zone_radius_m = radius_m;
        self
    }

    /// Builder method for tests to set the auto-record cooldown
    pub fn with_cooldown_ms(mut self, cooldown_ms: u64) -> Self {
        self.auto_record_cooldown_ms = cooldown_ms;
        self
    }
}
