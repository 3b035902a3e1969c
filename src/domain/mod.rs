//! Domain models - core value types of the walk tracker
//!
//! This module contains the canonical data types used throughout the system:
//! - `types` - zones, anchors, location samples, trip types
//! - `trip` - journey state machine state, events and motion statistics
//! - `records` - trip counters and the last automatic record
//! - `snapshot` - the full persisted tracker state

pub mod records;
pub mod snapshot;
pub mod trip;
pub mod types;

pub use records::{CounterKey, CounterScope, Counters, LedgerState, TripRecord};
pub use snapshot::{Anchors, TrackerSnapshot};
pub use trip::{JourneyMotionStats, SampleFix, TripEvent, TripState, TripStep};
pub use types::{
    epoch_ms, local_date, AnchorKind, AnchorPoint, GeoPoint, LocationSample, RecordSource,
    TripType, Zone,
};
