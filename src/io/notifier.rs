//! Notification sink for trip events
//!
//! Observers are only called after the cycle's snapshot has been stored.

use crate::domain::types::{TripType, Zone};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// A user-facing trip notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TripNotification {
    JourneyStarted { origin: Zone },
    /// Carries the record id for the undo action
    TripCompleted { trip_type: TripType, record_id: u64 },
    SkippedNotWalking { trip_type: TripType },
    AutoRecordUndone { record_id: u64 },
}

impl TripNotification {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripNotification::JourneyStarted { .. } => "journey_started",
            TripNotification::TripCompleted { .. } => "trip_completed",
            TripNotification::SkippedNotWalking { .. } => "skipped_not_walking",
            TripNotification::AutoRecordUndone { .. } => "auto_record_undone",
        }
    }

    /// Deliver to the observer method matching this notification
    pub fn dispatch(&self, observer: &dyn TripObserver) {
        match *self {
            TripNotification::JourneyStarted { origin } => observer.on_journey_started(origin),
            TripNotification::TripCompleted { trip_type, record_id } => {
                observer.on_trip_completed(trip_type, record_id)
            }
            TripNotification::SkippedNotWalking { trip_type } => observer.on_skipped(trip_type),
            TripNotification::AutoRecordUndone { record_id } => observer.on_undone(record_id),
        }
    }
}

/// Receives trip events, one method per kind
pub trait TripObserver: Send {
    fn on_journey_started(&self, origin: Zone);
    fn on_trip_completed(&self, trip_type: TripType, record_id: u64);
    fn on_skipped(&self, trip_type: TripType);
    fn on_undone(&self, record_id: u64);
}

/// Observer that logs every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl TripObserver for LogObserver {
    fn on_journey_started(&self, origin: Zone) {
        info!(origin = %origin, "notify_journey_started");
    }

    fn on_trip_completed(&self, trip_type: TripType, record_id: u64) {
        info!(trip_type = %trip_type, record_id = %record_id, "notify_trip_completed");
    }

    fn on_skipped(&self, trip_type: TripType) {
        info!(trip_type = %trip_type, "notify_skipped_not_walking");
    }

    fn on_undone(&self, record_id: u64) {
        info!(record_id = %record_id, "notify_auto_record_undone");
    }
}

/// Observer forwarding notifications into a bounded channel.
/// A full or closed channel drops the notification.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::Sender<TripNotification>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<TripNotification>) -> Self {
        Self { tx }
    }

    fn forward(&self, notification: TripNotification) {
        if let Err(e) = self.tx.try_send(notification) {
            warn!(event = %notification.as_str(), error = %e, "notification_dropped");
        }
    }
}

impl TripObserver for ChannelObserver {
    fn on_journey_started(&self, origin: Zone) {
        self.forward(TripNotification::JourneyStarted { origin });
    }

    fn on_trip_completed(&self, trip_type: TripType, record_id: u64) {
        self.forward(TripNotification::TripCompleted { trip_type, record_id });
    }

    fn on_skipped(&self, trip_type: TripType) {
        self.forward(TripNotification::SkippedNotWalking { trip_type });
    }

    fn on_undone(&self, record_id: u64) {
        self.forward(TripNotification::AutoRecordUndone { record_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_observer_forwards_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let observer = ChannelObserver::new(tx);

        let sent = [
            TripNotification::JourneyStarted { origin: Zone::Home },
            TripNotification::TripCompleted { trip_type: TripType::HomeToUniversity, record_id: 7 },
            TripNotification::SkippedNotWalking { trip_type: TripType::UniversityToHome },
            TripNotification::AutoRecordUndone { record_id: 7 },
        ];
        for notification in &sent {
            notification.dispatch(&observer);
        }

        for expected in sent {
            assert_eq!(rx.try_recv().unwrap(), expected);
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_observer_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let observer = ChannelObserver::new(tx);

        observer.on_undone(1);
        observer.on_undone(2);

        assert_eq!(rx.try_recv().unwrap(), TripNotification::AutoRecordUndone { record_id: 1 });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_notification_json_shape() {
        let json = serde_json::to_value(TripNotification::TripCompleted {
            trip_type: TripType::UniversityToHome,
            record_id: 42,
        })
        .unwrap();
        assert_eq!(json["event"], "trip_completed");
        assert_eq!(json["trip_type"], "uni_to_home");
        assert_eq!(json["record_id"], 42);
    }
}
