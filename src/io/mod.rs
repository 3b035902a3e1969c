//! IO modules - external system interfaces
//!
//! - `store` - Snapshot persistence (in-memory and JSON file)
//! - `notifier` - Trip notification observers
//! - `journal` - Trip notifications to file (JSONL format)
//! - `location_feed` - JSON-line location fixes into the tracker

pub mod journal;
pub mod location_feed;
pub mod notifier;
pub mod store;

// Re-export commonly used types
pub use journal::Journal;
pub use location_feed::{run_location_feed, FeedOptions, FeedStats};
pub use notifier::{ChannelObserver, LogObserver, TripNotification, TripObserver};
pub use store::{JsonFileStore, MemoryStore, StateStore, StoreError};
