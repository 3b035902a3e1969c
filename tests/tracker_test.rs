//! Integration tests for the tracker with file-backed state

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use walk_tracker::domain::types::{AnchorKind, GeoPoint, LocationSample, TripType, Zone};
use walk_tracker::infra::{Config, Metrics};
use walk_tracker::io::{run_location_feed, FeedOptions, JsonFileStore, Journal, StateStore};
use walk_tracker::services::{create_tracker, CycleOutcome, Tracker, TripDecision};

const HOME: GeoPoint = GeoPoint { latitude: 48.2082, longitude: 16.3738 };
const UNIVERSITY: GeoPoint = GeoPoint { latitude: 48.2132, longitude: 16.3610 };

fn test_config() -> Config {
    Config::default().with_zone_radius_m(150.0).with_arrival(60_000, 2).with_cooldown_ms(300_000)
}

fn open_tracker(dir: &Path) -> Tracker {
    Tracker::new(
        test_config(),
        Box::new(JsonFileStore::new(dir.join("state.json"))),
        Arc::new(Metrics::new()),
    )
    .with_observer(Box::new(Journal::new(dir.join("trips.jsonl"))))
    .with_clock(|| 1_000_000)
}

fn fix(point: GeoPoint, ts: u64) -> Option<LocationSample> {
    Some(LocationSample::new(point.latitude, point.longitude, ts).with_speed(1.3))
}

/// Halfway between the anchors, well outside both zones
fn between() -> GeoPoint {
    GeoPoint::new(
        (HOME.latitude + UNIVERSITY.latitude) / 2.0,
        (HOME.longitude + UNIVERSITY.longitude) / 2.0,
    )
}

fn journal_events(dir: &Path) -> Vec<String> {
    let content = fs::read_to_string(dir.join("trips.jsonl")).unwrap_or_default();
    content
        .lines()
        .map(|line| {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            parsed["event"].as_str().unwrap().to_string()
        })
        .collect()
}

#[test]
fn test_state_survives_restart_between_fixes() {
    let dir = tempdir().unwrap();

    {
        let mut tracker = open_tracker(dir.path());
        tracker.set_anchor(AnchorKind::Home, HOME).unwrap();
        tracker.set_anchor(AnchorKind::University, UNIVERSITY).unwrap();
        tracker.start_tracking(fix(HOME, 1_000_000)).unwrap();
        tracker.process_fix(fix(between(), 1_030_000));
    }

    // Every cycle starts from the stored snapshot
    {
        let mut tracker = open_tracker(dir.path());
        tracker.process_fix(fix(UNIVERSITY, 1_060_000));
    }

    let mut tracker = open_tracker(dir.path());
    let outcome = tracker.process_fix(fix(UNIVERSITY, 1_120_000));
    assert_eq!(
        outcome,
        CycleOutcome::Processed {
            zone: Zone::University,
            event: walk_tracker::domain::TripEvent::TripCompleted {
                origin: Zone::Home,
                destination: Zone::University,
            },
            decision: Some(TripDecision::Committed { record_id: 1_120_000 }),
        }
    );

    let summary = tracker.summary().unwrap();
    assert_eq!(summary.today.home_to_uni.auto, 1);
    assert_eq!(summary.total.home_to_uni.all, 1);

    assert_eq!(journal_events(dir.path()), vec!["journey_started", "trip_completed"]);

    assert!(tracker.request_undo(1_120_000).unwrap());
    assert_eq!(tracker.summary().unwrap().total.home_to_uni.all, 0);
    assert_eq!(
        journal_events(dir.path()),
        vec!["journey_started", "trip_completed", "auto_record_undone"]
    );

    let stored = JsonFileStore::new(dir.path().join("state.json")).load().unwrap();
    assert!(stored.ledger.last_auto_record.unwrap().undone);
}

#[test]
fn test_stored_counters_use_flat_keys() {
    let dir = tempdir().unwrap();
    let mut tracker = open_tracker(dir.path());

    tracker.record_manual(TripType::UniversityToHome).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("state.json")).unwrap()).unwrap();
    let counters = raw["ledger"]["counters"].as_object().unwrap();
    assert_eq!(counters.len(), 4);
    assert_eq!(counters["total_uni_to_home"], 1);
    assert_eq!(counters["total_uni_to_home_manual"], 1);
    assert!(counters.keys().any(|k| k.ends_with("_uni_to_home_manual") && !k.starts_with("total")));
}

#[test]
fn test_concurrent_trackers_on_one_state_file() {
    let dir = tempdir().unwrap();
    let state_path = dir.path().join("state.json");

    std::thread::scope(|scope| {
        for _ in 0..2 {
            let state_path = state_path.clone();
            scope.spawn(move || {
                let mut tracker = Tracker::new(
                    test_config(),
                    Box::new(JsonFileStore::new(&state_path)),
                    Arc::new(Metrics::new()),
                )
                .with_clock(|| 1_000_000);
                for _ in 0..100 {
                    tracker.record_manual(TripType::HomeToUniversity).unwrap();
                }
            });
        }
    });

    let tracker = open_tracker(dir.path());
    let summary = tracker.summary().unwrap();
    assert_eq!(summary.total.home_to_uni.all, 200);
    assert_eq!(summary.total.home_to_uni.manual, 200);
}

#[tokio::test]
async fn test_replayed_feed_through_actor() {
    let dir = tempdir().unwrap();
    let metrics = Arc::new(Metrics::new());
    let tracker = Tracker::new(
        test_config(),
        Box::new(JsonFileStore::new(dir.path().join("state.json"))),
        metrics.clone(),
    )
    .with_observer(Box::new(Journal::new(dir.path().join("trips.jsonl"))))
    .with_clock(|| 2_000_000);

    let (handle, worker) = create_tracker(tracker, 8);
    let worker_task = tokio::spawn(worker.run());

    handle.set_anchor(AnchorKind::Home, HOME).await.unwrap();
    handle.set_anchor(AnchorKind::University, UNIVERSITY).await.unwrap();
    handle.start_tracking(None).await.unwrap();

    let mid = between();
    let feed = format!(
        concat!(
            "{{\"lat\":{},\"lng\":{},\"ts\":2000000,\"speed\":1.3}}\n",
            "{{\"lat\":{},\"lng\":{},\"ts\":2030000,\"speed\":1.4}}\n",
            "null\n",
            "{{\"lat\":{},\"lng\":{},\"ts\":2060000,\"speed\":1.2}}\n",
            "{{\"lat\":{},\"lng\":{},\"ts\":2120000,\"speed\":1.1}}\n",
        ),
        HOME.latitude,
        HOME.longitude,
        mid.latitude,
        mid.longitude,
        UNIVERSITY.latitude,
        UNIVERSITY.longitude,
        UNIVERSITY.latitude,
        UNIVERSITY.longitude,
    );
    let options = FeedOptions {
        update_interval: std::time::Duration::from_secs(30),
        min_update_interval_ms: 15_000,
        replay: true,
    };
    let stats = run_location_feed(feed.as_bytes(), handle.sender(), metrics.clone(), options).await;
    assert_eq!(stats.forwarded, 5);

    let status = handle.status().await.unwrap();
    assert_eq!(status.stable_zone, Zone::University);
    assert_eq!(status.journey_origin, None);
    assert_eq!(status.last_auto_record.map(|r| r.id), Some(2_120_000));

    handle.stop_tracking().await.unwrap();
    drop(handle);
    worker_task.await.unwrap();

    assert_eq!(metrics.trips_committed(), 1);
    assert_eq!(journal_events(dir.path()), vec!["journey_started", "trip_completed"]);
}
