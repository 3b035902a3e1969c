//! Shared types for the walk tracker

use chrono::{Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Local calendar date for an epoch millisecond timestamp
pub fn local_date(ts_ms: u64) -> NaiveDate {
    let millis = i64::try_from(ts_ms).unwrap_or(i64::MAX);
    match Local.timestamp_millis_opt(millis) {
        chrono::LocalResult::Single(dt) => dt.date_naive(),
        chrono::LocalResult::Ambiguous(earliest, _) => earliest.date_naive(),
        chrono::LocalResult::None => NaiveDate::default(),
    }
}

/// Classification of a position relative to the two anchors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Home,
    University,
    #[default]
    Unknown,
}

impl Zone {
    #[inline]
    pub fn is_known(&self) -> bool {
        !matches!(self, Zone::Unknown)
    }

    /// The other anchor zone. Unknown has no opposite.
    #[inline]
    pub fn opposite(&self) -> Option<Zone> {
        match self {
            Zone::Home => Some(Zone::University),
            Zone::University => Some(Zone::Home),
            Zone::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Home => "home",
            Zone::University => "university",
            Zone::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two anchors a user action refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnchorKind {
    Home,
    University,
}

impl AnchorKind {
    pub fn zone(&self) -> Zone {
        match self {
            AnchorKind::Home => Zone::Home,
            AnchorKind::University => Zone::University,
        }
    }
}

/// A geographic coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Finite and within WGS84 latitude/longitude bounds
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle (haversine) distance in meters
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        use geo::{Distance, Haversine, Point};

        let a = Point::new(self.longitude, self.latitude);
        let b = Point::new(other.longitude, other.latitude);
        Haversine::distance(a, b)
    }
}

/// A user-configured anchor location
pub type AnchorPoint = GeoPoint;

/// One position observation from the location provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
    /// Epoch ms
    #[serde(rename = "ts")]
    pub timestamp_ms: u64,
    /// Provider-reported speed in m/s
    #[serde(rename = "speed", default, skip_serializing_if = "Option::is_none")]
    pub reported_speed: Option<f64>,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: u64) -> Self {
        Self { latitude, longitude, timestamp_ms, reported_speed: None }
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.reported_speed = Some(speed_mps);
        self
    }

    #[inline]
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Reported speed, only if it can be trusted
    pub fn trusted_speed(&self) -> Option<f64> {
        self.reported_speed.filter(|s| s.is_finite() && *s >= 0.0)
    }
}

/// Direction of a completed trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
pub enum TripType {
    #[serde(rename = "home_to_uni")]
    #[value(name = "home-to-uni")]
    HomeToUniversity,
    #[serde(rename = "uni_to_home")]
    #[value(name = "uni-to-home")]
    UniversityToHome,
}

impl TripType {
    pub const ALL: [TripType; 2] = [TripType::HomeToUniversity, TripType::UniversityToHome];

    /// Trip type for a journey leaving `origin`
    pub fn from_origin(origin: Zone) -> Option<TripType> {
        match origin {
            Zone::Home => Some(TripType::HomeToUniversity),
            Zone::University => Some(TripType::UniversityToHome),
            Zone::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TripType::HomeToUniversity => "home_to_uni",
            TripType::UniversityToHome => "uni_to_home",
        }
    }
}

impl std::fmt::Display for TripType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TripType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home_to_uni" => Ok(TripType::HomeToUniversity),
            "uni_to_home" => Ok(TripType::UniversityToHome),
            other => Err(format!("unknown trip type: {other}")),
        }
    }
}

/// How a trip record was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    Manual,
    Auto,
}

impl RecordSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordSource::Manual => "manual",
            RecordSource::Auto => "auto",
        }
    }
}

impl std::str::FromStr for RecordSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(RecordSource::Manual),
            "auto" => Ok(RecordSource::Auto),
            other => Err(format!("unknown record source: {other}")),
        }
    }
}
