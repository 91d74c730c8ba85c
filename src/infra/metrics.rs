//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting is the only operation
//! that needs synchronization (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally—these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use crate::domain::types::ZoneId;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Prometheus-style exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
pub const METRICS_BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
pub const METRICS_NUM_BUCKETS: usize = 11;

const NUM_BUCKETS: usize = METRICS_NUM_BUCKETS;

/// Maximum number of zones to track occupancy for
pub const MAX_ZONES: usize = 64;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    METRICS_BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
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

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
///
/// All recording operations are lock-free using atomics.
/// The `report()` method atomically swaps periodic counters to get a
/// consistent snapshot.
pub struct Metrics {
    /// Total events ever received (monotonic)
    events_total: AtomicU64,
    /// Events since last report (reset on report)
    events_since_report: AtomicU64,
    /// Events rejected by validation (monotonic)
    events_rejected: AtomicU64,
    /// Duplicate deliveries suppressed by idempotency key (monotonic)
    events_duplicate: AtomicU64,
    /// Events inside the debounce window (monotonic)
    events_debounced: AtomicU64,
    /// Accepted events that changed membership (monotonic)
    transitions_total: AtomicU64,
    /// Zone enters emitted (monotonic)
    zone_enters_total: AtomicU64,
    /// Zone exits emitted (monotonic)
    zone_exits_total: AtomicU64,
    /// Sum of processing latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max processing latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    /// Processing latency histogram buckets (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Vehicles currently inside each zone
    /// Index is determined by registry load order
    zone_occupancy: [AtomicU64; MAX_ZONES],
    /// Zone ids in registry order (set once at init)
    zone_ids: parking_lot::Mutex<Vec<ZoneId>>,
    /// Pre-computed zone id to index mapping (for O(1) lookup without mutex)
    zone_id_to_index: parking_lot::RwLock<FxHashMap<ZoneId, usize>>,
    /// Last report time (only accessed from reporter, not atomic)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            events_total: AtomicU64::new(0),
            events_since_report: AtomicU64::new(0),
            events_rejected: AtomicU64::new(0),
            events_duplicate: AtomicU64::new(0),
            events_debounced: AtomicU64::new(0),
            transitions_total: AtomicU64::new(0),
            zone_enters_total: AtomicU64::new(0),
            zone_exits_total: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            zone_occupancy: std::array::from_fn(|_| AtomicU64::new(0)),
            zone_ids: parking_lot::Mutex::new(Vec::new()),
            zone_id_to_index: parking_lot::RwLock::new(FxHashMap::default()),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Set the zone ids tracked for occupancy (call once at initialization)
    pub fn set_zones(&self, zone_ids: &[ZoneId]) {
        let mut zones = self.zone_ids.lock();
        zones.clear();
        zones.extend(zone_ids.iter().take(MAX_ZONES).cloned());

        let mut index_map = self.zone_id_to_index.write();
        index_map.clear();
        for (idx, zone_id) in zone_ids.iter().take(MAX_ZONES).enumerate() {
            index_map.insert(zone_id.clone(), idx);
        }
    }

    #[inline]
    fn zone_index(&self, zone_id: &ZoneId) -> Option<usize> {
        let index_map = self.zone_id_to_index.read();
        index_map.get(zone_id).copied()
    }

    /// Record a vehicle entering a zone
    #[inline]
    pub fn zone_enter(&self, zone_id: &ZoneId) {
        self.zone_enters_total.fetch_add(1, Ordering::Relaxed);
        if let Some(idx) = self.zone_index(zone_id) {
            self.zone_occupancy[idx].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a vehicle exiting a zone
    #[inline]
    pub fn zone_exit(&self, zone_id: &ZoneId) {
        self.zone_exits_total.fetch_add(1, Ordering::Relaxed);
        if let Some(idx) = self.zone_index(zone_id) {
            // Guard against underflow if counts drift
            let current = self.zone_occupancy[idx].load(Ordering::Relaxed);
            if current > 0 {
                self.zone_occupancy[idx].fetch_sub(1, Ordering::Relaxed);
            }
        }
    }

    /// Current occupancy for all tracked zones
    pub fn zone_occupancy(&self) -> Vec<(ZoneId, u64)> {
        let zones = self.zone_ids.lock();
        zones
            .iter()
            .enumerate()
            .map(|(idx, zone_id)| {
                let count = self.zone_occupancy[idx].load(Ordering::Relaxed);
                (zone_id.clone(), count)
            })
            .collect()
    }

    /// Record an accepted event with its processing latency (lock-free)
    #[inline]
    pub fn record_event_processed(&self, latency_us: u64) {
        self.events_total.fetch_add(1, Ordering::Relaxed);
        self.events_since_report.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);

        let bucket = bucket_index(latency_us);
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);

        update_atomic_max(&self.latency_max_us, latency_us);
    }

    /// Record an event rejected by validation
    #[inline]
    pub fn record_event_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a duplicate delivery suppressed by the idempotency key
    #[inline]
    pub fn record_event_duplicate(&self) {
        self.events_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event inside the debounce window
    #[inline]
    pub fn record_event_debounced(&self) {
        self.events_debounced.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an accepted event that changed membership
    #[inline]
    pub fn record_transition(&self) {
        self.transitions_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn events_total(&self) -> u64 {
        self.events_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn events_rejected(&self) -> u64 {
        self.events_rejected.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn events_duplicate(&self) -> u64 {
        self.events_duplicate.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn events_debounced(&self) -> u64 {
        self.events_debounced.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn transitions_total(&self) -> u64 {
        self.transitions_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn zone_enters_total(&self) -> u64 {
        self.zone_enters_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn zone_exits_total(&self) -> u64 {
        self.zone_exits_total.load(Ordering::Relaxed)
    }

    /// Calculate and return metrics summary, then reset periodic counters
    ///
    /// This is the only method that resets counters. It uses atomic swap
    /// to get a consistent snapshot while allowing concurrent updates.
    pub fn report(&self, active_vehicles: usize) -> MetricsSummary {
        let events_count = self.events_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);

        // Monotonic counters are not reset
        let events_total = self.events_total.load(Ordering::Relaxed);
        let events_rejected = self.events_rejected.load(Ordering::Relaxed);
        let events_duplicate = self.events_duplicate.load(Ordering::Relaxed);
        let events_debounced = self.events_debounced.load(Ordering::Relaxed);
        let transitions_total = self.transitions_total.load(Ordering::Relaxed);
        let zone_enters_total = self.zone_enters_total.load(Ordering::Relaxed);
        let zone_exits_total = self.zone_exits_total.load(Ordering::Relaxed);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let events_per_sec = if elapsed.as_secs_f64() > 0.0 {
            events_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let avg_latency_us = if events_count > 0 { latency_sum / events_count } else { 0 };

        MetricsSummary {
            events_total,
            events_per_sec,
            events_rejected,
            events_duplicate,
            events_debounced,
            transitions_total,
            zone_enters_total,
            zone_exits_total,
            avg_latency_us,
            max_latency_us: max_latency,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p95_us: percentile_from_buckets(&lat_buckets, 0.95),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            lat_buckets,
            active_vehicles,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics for one reporting interval
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub events_total: u64,
    pub events_per_sec: f64,
    pub events_rejected: u64,
    pub events_duplicate: u64,
    pub events_debounced: u64,
    pub transitions_total: u64,
    pub zone_enters_total: u64,
    pub zone_exits_total: u64,
    pub avg_latency_us: u64,
    pub max_latency_us: u64,
    pub lat_p50_us: u64,
    pub lat_p95_us: u64,
    pub lat_p99_us: u64,
    pub lat_buckets: [u64; NUM_BUCKETS],
    pub active_vehicles: usize,
}

impl MetricsSummary {
    /// Log the summary as a structured tracing event
    pub fn log(&self) {
        info!(
            events_total = %self.events_total,
            events_per_sec = format!("{:.1}", self.events_per_sec),
            rejected = %self.events_rejected,
            duplicates = %self.events_duplicate,
            debounced = %self.events_debounced,
            transitions = %self.transitions_total,
            enters = %self.zone_enters_total,
            exits = %self.zone_exits_total,
            avg_us = %self.avg_latency_us,
            p50_us = %self.lat_p50_us,
            p95_us = %self.lat_p95_us,
            p99_us = %self.lat_p99_us,
            max_us = %self.max_latency_us,
            active_vehicles = %self.active_vehicles,
            "metrics_report"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_report() {
        let metrics = Metrics::new();
        metrics.record_event_processed(150);
        metrics.record_event_processed(250);
        metrics.record_event_rejected();
        metrics.record_event_duplicate();
        metrics.record_event_debounced();
        metrics.record_transition();

        let summary = metrics.report(3);
        assert_eq!(summary.events_total, 2);
        assert_eq!(summary.events_rejected, 1);
        assert_eq!(summary.events_duplicate, 1);
        assert_eq!(summary.events_debounced, 1);
        assert_eq!(summary.transitions_total, 1);
        assert_eq!(summary.avg_latency_us, 200);
        assert_eq!(summary.active_vehicles, 3);

        // Periodic counters reset, monotonic counters survive
        let second = metrics.report(3);
        assert_eq!(second.events_total, 2);
        assert_eq!(second.avg_latency_us, 0);
    }

    #[test]
    fn test_zone_occupancy() {
        let metrics = Metrics::new();
        let downtown = ZoneId::from("downtown");
        let depot = ZoneId::from("depot");
        metrics.set_zones(&[downtown.clone(), depot.clone()]);

        metrics.zone_enter(&downtown);
        metrics.zone_enter(&downtown);
        metrics.zone_enter(&depot);
        metrics.zone_exit(&downtown);

        let occupancy = metrics.zone_occupancy();
        assert_eq!(occupancy, vec![(downtown.clone(), 1), (depot.clone(), 1)]);

        // Exit below zero is clamped
        metrics.zone_exit(&depot);
        metrics.zone_exit(&depot);
        let occupancy = metrics.zone_occupancy();
        assert_eq!(occupancy[1].1, 0);
    }

    #[test]
    fn test_percentiles() {
        let metrics = Metrics::new();
        for _ in 0..99 {
            metrics.record_event_processed(50);
        }
        metrics.record_event_processed(40_000);

        let summary = metrics.report(0);
        assert_eq!(summary.lat_p50_us, 100);
        assert_eq!(summary.lat_p99_us, 100);
        assert_eq!(summary.max_latency_us, 40_000);
    }

    #[test]
    fn test_unknown_zone_ignored_for_occupancy() {
        let metrics = Metrics::new();
        metrics.set_zones(&[ZoneId::from("a")]);
        metrics.zone_enter(&ZoneId::from("unknown"));
        assert_eq!(metrics.zone_enters_total(), 1);
        assert_eq!(metrics.zone_occupancy(), vec![(ZoneId::from("a"), 0)]);
    }
}
