//! Trip counters and the remembered last automatic record
//!
//! Counter keys use a flat string form:
//! - `2026-10-19_home_to_uni` / `2026-10-19_home_to_uni_auto` (day scope)
//! - `total_home_to_uni` / `total_home_to_uni_manual` (all time)

use crate::domain::types::{RecordSource, TripType};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TOTAL_PREFIX: &str = "total_";

/// Time scope of a counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CounterScope {
    Day(NaiveDate),
    Total,
}

/// Key of a single trip counter. `source == None` is the per-type aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CounterKey {
    pub scope: CounterScope,
    pub trip_type: TripType,
    pub source: Option<RecordSource>,
}

impl CounterKey {
    pub fn new(scope: CounterScope, trip_type: TripType, source: Option<RecordSource>) -> Self {
        Self { scope, trip_type, source }
    }

    /// The four keys touched by recording one trip of `trip_type` from `source`
    pub fn quad(date: NaiveDate, trip_type: TripType, source: RecordSource) -> [CounterKey; 4] {
        [
            Self::new(CounterScope::Day(date), trip_type, None),
            Self::new(CounterScope::Day(date), trip_type, Some(source)),
            Self::new(CounterScope::Total, trip_type, None),
            Self::new(CounterScope::Total, trip_type, Some(source)),
        ]
    }
}

impl std::fmt::Display for CounterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.scope {
            CounterScope::Day(date) => write!(f, "{}_{}", date.format(DATE_FORMAT), self.trip_type)?,
            CounterScope::Total => write!(f, "{TOTAL_PREFIX}{}", self.trip_type)?,
        }
        if let Some(source) = self.source {
            write!(f, "_{}", source.as_str())?;
        }
        Ok(())
    }
}

impl std::str::FromStr for CounterKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scope, rest) = if let Some(rest) = s.strip_prefix(TOTAL_PREFIX) {
            (CounterScope::Total, rest)
        } else {
            let (date, rest) = s.split_once('_').ok_or_else(|| format!("malformed counter key: {s}"))?;
            let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
                .map_err(|e| format!("malformed counter date in {s}: {e}"))?;
            (CounterScope::Day(date), rest)
        };

        for trip_type in TripType::ALL {
            let Some(tail) = rest.strip_prefix(trip_type.as_str()) else {
                continue;
            };
            if tail.is_empty() {
                return Ok(Self::new(scope, trip_type, None));
            }
            if let Some(source) = tail.strip_prefix('_') {
                return Ok(Self::new(scope, trip_type, Some(source.parse()?)));
            }
        }
        Err(format!("malformed counter key: {s}"))
    }
}

impl Serialize for CounterKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CounterKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Lazily created non-negative trip counters
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counters(BTreeMap<CounterKey, u32>);

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, 0 if never incremented
    pub fn get(&self, key: &CounterKey) -> u32 {
        self.0.get(key).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, key: CounterKey) {
        let count = self.0.entry(key).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Decrement only if positive. Returns true if the counter changed.
    pub fn decrement_if_positive(&mut self, key: &CounterKey) -> bool {
        match self.0.get_mut(key) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, key: &CounterKey) {
        self.0.remove(key);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The remembered last automatic trip record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRecord {
    /// Creation timestamp (epoch ms)
    pub id: u64,
    pub date: NaiveDate,
    pub trip_type: TripType,
    pub source: RecordSource,
    pub undone: bool,
}

/// Counters plus last-record and cooldown bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerState {
    #[serde(default)]
    pub counters: Counters,
    #[serde(default)]
    pub last_auto_record: Option<TripRecord>,
    /// Time of the most recent automatic commit (epoch ms)
    #[serde(default)]
    pub last_auto_commit_ms: Option<u64>,
}
