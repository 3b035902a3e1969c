//! Services - business logic and state management
//!
//! - `zone_classifier` - Position to Home / University / Unknown
//! - `motion` - Speed estimation and journey motion statistics
//! - `trip_machine` - Dwell-confirmed journey state machine
//! - `walkiness` - On-foot plausibility gate
//! - `ledger` - Trip counters, undo and cooldown
//! - `tracker` - Orchestrator and command actor

pub mod ledger;
pub mod motion;
pub mod tracker;
pub mod trip_machine;
pub mod walkiness;
pub mod zone_classifier;

// Re-export commonly used types
pub use ledger::{TripRecordLedger, TripSummary};
pub use motion::MotionSampleEvaluator;
pub use tracker::{
    create_tracker, CycleOutcome, Tracker, TrackerCmd, TrackerError, TrackerHandle, TrackerStatus,
    TrackerWorker, TripDecision,
};
pub use trip_machine::TripStateMachine;
pub use walkiness::WalkinessGate;
