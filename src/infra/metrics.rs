//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! The `report()` method swaps the periodic counters to get a snapshot.
//!
//! NOTE: All atomics use Relaxed ordering intentionally; these are statistical
//! counters only and must not drive any tracking decision.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
pub const NUM_BUCKETS: usize = 11;
/// Reported bound for the overflow bucket
const OVERFLOW_BOUND_US: u64 = 102_400;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Upper bound of the bucket holding the 99th percentile cycle
fn p99_from_buckets(buckets: &[u64; NUM_BUCKETS]) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = total - total / 100;
    let mut cumulative = 0u64;
    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_BOUNDS.get(i).copied().unwrap_or(OVERFLOW_BOUND_US);
        }
    }
    OVERFLOW_BOUND_US
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Fixes that ran a full cycle (monotonic)
    fixes_total: AtomicU64,
    /// Cycles with no fix from the provider (monotonic)
    fixes_skipped: AtomicU64,
    /// Fixes dropped for invalid coordinates (monotonic)
    fixes_invalid: AtomicU64,
    /// Fixes dropped because the command queue was full (monotonic)
    fixes_dropped: AtomicU64,
    journeys_started: AtomicU64,
    journeys_cancelled: AtomicU64,
    trips_completed: AtomicU64,
    trips_committed: AtomicU64,
    trips_skipped_not_walking: AtomicU64,
    trips_skipped_cooldown: AtomicU64,
    manual_records: AtomicU64,
    undos_applied: AtomicU64,
    /// Store load/write failures (monotonic)
    persistence_failures: AtomicU64,
    /// Cycles since last report (reset on report)
    cycles_since_report: AtomicU64,
    /// Sum of cycle latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max cycle latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    /// Cycle latency histogram buckets (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            fixes_total: AtomicU64::new(0),
            fixes_skipped: AtomicU64::new(0),
            fixes_invalid: AtomicU64::new(0),
            fixes_dropped: AtomicU64::new(0),
            journeys_started: AtomicU64::new(0),
            journeys_cancelled: AtomicU64::new(0),
            trips_completed: AtomicU64::new(0),
            trips_committed: AtomicU64::new(0),
            trips_skipped_not_walking: AtomicU64::new(0),
            trips_skipped_cooldown: AtomicU64::new(0),
            manual_records: AtomicU64::new(0),
            undos_applied: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
            cycles_since_report: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a completed fix cycle with its processing latency
    #[inline]
    pub fn record_cycle(&self, latency_us: u64) {
        self.fixes_total.fetch_add(1, Ordering::Relaxed);
        self.cycles_since_report.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_us, latency_us);
    }

    #[inline]
    pub fn record_fix_skipped(&self) {
        self.fixes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_fix_invalid(&self) {
        self.fixes_invalid.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_fix_dropped(&self) {
        self.fixes_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_journey_started(&self) {
        self.journeys_started.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_journey_cancelled(&self) {
        self.journeys_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_trip_completed(&self) {
        self.trips_completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_trip_committed(&self) {
        self.trips_committed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_skipped_not_walking(&self) {
        self.trips_skipped_not_walking.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_skipped_cooldown(&self) {
        self.trips_skipped_cooldown.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_manual(&self) {
        self.manual_records.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_undo(&self) {
        self.undos_applied.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_persistence_failure(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fixes_total(&self) -> u64 {
        self.fixes_total.load(Ordering::Relaxed)
    }

    pub fn trips_committed(&self) -> u64 {
        self.trips_committed.load(Ordering::Relaxed)
    }

    pub fn persistence_failures(&self) -> u64 {
        self.persistence_failures.load(Ordering::Relaxed)
    }

    /// Generate a summary, resetting the periodic counters
    pub fn report(&self) -> MetricsSummary {
        let cycles = self.cycles_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let cycles_per_min = if elapsed.as_secs_f64() > 0.0 {
            cycles as f64 * 60.0 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        MetricsSummary {
            fixes_total: self.fixes_total.load(Ordering::Relaxed),
            fixes_skipped: self.fixes_skipped.load(Ordering::Relaxed),
            fixes_invalid: self.fixes_invalid.load(Ordering::Relaxed),
            fixes_dropped: self.fixes_dropped.load(Ordering::Relaxed),
            journeys_started: self.journeys_started.load(Ordering::Relaxed),
            journeys_cancelled: self.journeys_cancelled.load(Ordering::Relaxed),
            trips_completed: self.trips_completed.load(Ordering::Relaxed),
            trips_committed: self.trips_committed.load(Ordering::Relaxed),
            trips_skipped_not_walking: self.trips_skipped_not_walking.load(Ordering::Relaxed),
            trips_skipped_cooldown: self.trips_skipped_cooldown.load(Ordering::Relaxed),
            manual_records: self.manual_records.load(Ordering::Relaxed),
            undos_applied: self.undos_applied.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            cycles_per_min,
            avg_cycle_latency_us: if cycles > 0 { latency_sum / cycles } else { 0 },
            max_cycle_latency_us: max_latency,
            lat_p99_us: p99_from_buckets(&lat_buckets),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of metrics for a reporting period
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub fixes_total: u64,
    pub fixes_skipped: u64,
    pub fixes_invalid: u64,
    pub fixes_dropped: u64,
    pub journeys_started: u64,
    pub journeys_cancelled: u64,
    pub trips_completed: u64,
    pub trips_committed: u64,
    pub trips_skipped_not_walking: u64,
    pub trips_skipped_cooldown: u64,
    pub manual_records: u64,
    pub undos_applied: u64,
    pub persistence_failures: u64,
    pub cycles_per_min: f64,
    pub avg_cycle_latency_us: u64,
    pub max_cycle_latency_us: u64,
    pub lat_p99_us: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            fixes_total = %self.fixes_total,
            fixes_skipped = %self.fixes_skipped,
            fixes_invalid = %self.fixes_invalid,
            fixes_dropped = %self.fixes_dropped,
            cycles_per_min = format!("{:.1}", self.cycles_per_min),
            avg_latency_us = %self.avg_cycle_latency_us,
            p99_us = %self.lat_p99_us,
            journeys_started = %self.journeys_started,
            journeys_cancelled = %self.journeys_cancelled,
            trips_completed = %self.trips_completed,
            trips_committed = %self.trips_committed,
            skipped_not_walking = %self.trips_skipped_not_walking,
            skipped_cooldown = %self.trips_skipped_cooldown,
            persistence_failures = %self.persistence_failures,
            "metrics"
        );
    }
}
