//! Queue processing metrics
//!
//! Rolling counters for the batch queue processor: lifetime totals plus
//! per-pass samples aggregated over configurable sliding windows. Callers
//! pull a [`MetricsSnapshot`] on demand; nothing is pushed anywhere.
//!
//! Timestamps use the monotonic clock, so wall-clock adjustments cannot
//! corrupt window math.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One completed processing pass
#[derive(Debug, Clone, Copy)]
struct PassSample {
    at: Instant,
    elapsed_ms: u64,
    items: u64,
    errors: u64,
    cache_hits: u64,
}

/// Lifetime counters since engine start
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct TotalCounters {
    pub passes: u64,
    pub items_processed: u64,
    pub errors: u64,
    pub cache_hits: u64,
    pub collisions: u64,
}

/// Aggregates over one sliding window
#[derive(Debug, Clone, Serialize)]
pub struct WindowStats {
    /// Window length in seconds
    pub window_secs: u64,
    /// Passes completed inside the window
    pub passes: u64,
    /// Mean processing time per pass, milliseconds; 0.0 with no passes
    pub avg_processing_ms: f64,
    pub items_processed: u64,
    pub errors: u64,
    pub cache_hits: u64,
    pub collisions: u64,
}

/// Pull-based metrics view returned by `get_metrics()`
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub totals: TotalCounters,
    pub windows: Vec<WindowStats>,
}

/// Rolling metrics store shared by processor and engine facade
pub struct RollingMetrics {
    windows: Vec<Duration>,

    passes_total: AtomicU64,
    items_total: AtomicU64,
    errors_total: AtomicU64,
    cache_hits_total: AtomicU64,
    collisions_total: AtomicU64,

    passes: Mutex<VecDeque<PassSample>>,
    collisions: Mutex<VecDeque<Instant>>,
}

impl RollingMetrics {
    /// Create a store aggregating over the given windows (seconds)
    pub fn new(window_secs: &[u64]) -> Self {
        let mut windows: Vec<Duration> =
            window_secs.iter().map(|s| Duration::from_secs(*s)).collect();
        windows.sort();
        Self {
            windows,
            passes_total: AtomicU64::new(0),
            items_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            cache_hits_total: AtomicU64::new(0),
            collisions_total: AtomicU64::new(0),
            passes: Mutex::new(VecDeque::new()),
            collisions: Mutex::new(VecDeque::new()),
        }
    }

    /// Record a completed processing pass
    pub fn record_pass(&self, elapsed: Duration, items: u64, errors: u64, cache_hits: u64) {
        self.passes_total.fetch_add(1, Ordering::Relaxed);
        self.items_total.fetch_add(items, Ordering::Relaxed);
        self.errors_total.fetch_add(errors, Ordering::Relaxed);
        self.cache_hits_total.fetch_add(cache_hits, Ordering::Relaxed);

        let sample = PassSample {
            at: Instant::now(),
            elapsed_ms: elapsed.as_millis() as u64,
            items,
            errors,
            cache_hits,
        };

        let mut passes = self.passes.lock().unwrap();
        passes.push_back(sample);
        Self::prune_samples(&mut passes, self.horizon(), |s| s.at);
    }

    /// Record a rejected re-entrant pass
    pub fn record_collision(&self) {
        self.collisions_total.fetch_add(1, Ordering::Relaxed);

        let mut collisions = self.collisions.lock().unwrap();
        collisions.push_back(Instant::now());
        Self::prune_samples(&mut collisions, self.horizon(), |at| *at);
    }

    /// Aggregate current totals and window stats
    pub fn snapshot(&self) -> MetricsSnapshot {
        let totals = TotalCounters {
            passes: self.passes_total.load(Ordering::Relaxed),
            items_processed: self.items_total.load(Ordering::Relaxed),
            errors: self.errors_total.load(Ordering::Relaxed),
            cache_hits: self.cache_hits_total.load(Ordering::Relaxed),
            collisions: self.collisions_total.load(Ordering::Relaxed),
        };

        let now = Instant::now();
        let passes = self.passes.lock().unwrap();
        let collisions = self.collisions.lock().unwrap();

        let windows = self
            .windows
            .iter()
            .map(|window| {
                let cutoff = now.checked_sub(*window);
                let in_window = |at: Instant| cutoff.map_or(true, |c| at >= c);

                let mut stats = WindowStats {
                    window_secs: window.as_secs(),
                    passes: 0,
                    avg_processing_ms: 0.0,
                    items_processed: 0,
                    errors: 0,
                    cache_hits: 0,
                    collisions: collisions.iter().filter(|at| in_window(**at)).count() as u64,
                };

                let mut elapsed_sum = 0u64;
                for sample in passes.iter().filter(|s| in_window(s.at)) {
                    stats.passes += 1;
                    stats.items_processed += sample.items;
                    stats.errors += sample.errors;
                    stats.cache_hits += sample.cache_hits;
                    elapsed_sum += sample.elapsed_ms;
                }
                if stats.passes > 0 {
                    stats.avg_processing_ms = elapsed_sum as f64 / stats.passes as f64;
                }
                stats
            })
            .collect();

        MetricsSnapshot { totals, windows }
    }

    /// Longest window; samples older than this are unreachable and dropped
    fn horizon(&self) -> Duration {
        self.windows.last().copied().unwrap_or(Duration::from_secs(300))
    }

    fn prune_samples<T>(samples: &mut VecDeque<T>, horizon: Duration, at: impl Fn(&T) -> Instant) {
        let Some(cutoff) = Instant::now().checked_sub(horizon) else {
            return;
        };
        while samples.front().map_or(false, |s| at(s) < cutoff) {
            samples.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_snapshots_zeroes() {
        let metrics = RollingMetrics::new(&[60, 300]);
        let snap = metrics.snapshot();

        assert_eq!(snap.totals.passes, 0);
        assert_eq!(snap.windows.len(), 2);
        assert_eq!(snap.windows[0].window_secs, 60);
        assert_eq!(snap.windows[0].avg_processing_ms, 0.0);
    }

    #[test]
    fn passes_aggregate_into_all_windows() {
        let metrics = RollingMetrics::new(&[60, 300]);
        metrics.record_pass(Duration::from_millis(40), 10, 1, 2);
        metrics.record_pass(Duration::from_millis(60), 20, 0, 3);

        let snap = metrics.snapshot();
        assert_eq!(snap.totals.passes, 2);
        assert_eq!(snap.totals.items_processed, 30);
        assert_eq!(snap.totals.errors, 1);
        assert_eq!(snap.totals.cache_hits, 5);

        for window in &snap.windows {
            assert_eq!(window.passes, 2);
            assert_eq!(window.items_processed, 30);
            assert!((window.avg_processing_ms - 50.0).abs() < 1e-9);
        }
    }

    #[test]
    fn collisions_count_separately_from_passes() {
        let metrics = RollingMetrics::new(&[60]);
        metrics.record_collision();
        metrics.record_collision();

        let snap = metrics.snapshot();
        assert_eq!(snap.totals.collisions, 2);
        assert_eq!(snap.totals.passes, 0);
        assert_eq!(snap.windows[0].collisions, 2);
    }

    #[test]
    fn windows_are_sorted_ascending() {
        let metrics = RollingMetrics::new(&[300, 60]);
        let snap = metrics.snapshot();
        assert_eq!(snap.windows[0].window_secs, 60);
        assert_eq!(snap.windows[1].window_secs, 300);
    }
}
