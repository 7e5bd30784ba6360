//! Internal metrics collection.
//!
//! Collects metrics in-memory; the scheduler logs periodic snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrements, saturating at zero.
    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the transition engine.
#[derive(Debug, Default)]
pub struct Metrics {
    // Full recompute metrics
    pub recomputes_started: Counter,
    pub recomputes_completed: Counter,
    pub recompute_errors: Counter,
    pub recompute_timeouts: Counter,
    pub sessions_scanned: Counter,

    // Incremental update metrics
    pub incremental_updates: Counter,
    pub incremental_noops: Counter,
    pub incremental_errors: Counter,

    // Store write metrics
    pub transitions_written: Counter,
    pub percentage_batches: Counter,

    // Query metrics
    pub top_k_queries: Counter,
    pub graphs_built: Counter,
    pub lazy_materializations: Counter,

    // Sweep metrics
    pub sweeps_completed: Counter,
    pub sweep_project_failures: Counter,

    // Latency histograms
    pub recompute_latency_ms: Histogram,
    pub incremental_latency_ms: Histogram,
    pub graph_latency_ms: Histogram,

    // Gauges
    pub session_queue_depth: Gauge,
    pub active_recomputes: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub recomputes_started: u64,
    pub recomputes_completed: u64,
    pub recompute_errors: u64,
    pub recompute_timeouts: u64,
    pub sessions_scanned: u64,
    pub incremental_updates: u64,
    pub incremental_noops: u64,
    pub incremental_errors: u64,
    pub transitions_written: u64,
    pub percentage_batches: u64,
    pub top_k_queries: u64,
    pub graphs_built: u64,
    pub lazy_materializations: u64,
    pub sweeps_completed: u64,
    pub sweep_project_failures: u64,
    pub recompute_latency_mean_ms: f64,
    pub incremental_latency_mean_ms: f64,
    pub graph_latency_mean_ms: f64,
    pub session_queue_depth: u64,
    pub active_recomputes: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            recomputes_started: self.recomputes_started.get(),
            recomputes_completed: self.recomputes_completed.get(),
            recompute_errors: self.recompute_errors.get(),
            recompute_timeouts: self.recompute_timeouts.get(),
            sessions_scanned: self.sessions_scanned.get(),
            incremental_updates: self.incremental_updates.get(),
            incremental_noops: self.incremental_noops.get(),
            incremental_errors: self.incremental_errors.get(),
            transitions_written: self.transitions_written.get(),
            percentage_batches: self.percentage_batches.get(),
            top_k_queries: self.top_k_queries.get(),
            graphs_built: self.graphs_built.get(),
            lazy_materializations: self.lazy_materializations.get(),
            sweeps_completed: self.sweeps_completed.get(),
            sweep_project_failures: self.sweep_project_failures.get(),
            recompute_latency_mean_ms: self.recompute_latency_ms.mean(),
            incremental_latency_mean_ms: self.incremental_latency_ms.mean(),
            graph_latency_mean_ms: self.graph_latency_ms.mean(),
            session_queue_depth: self.session_queue_depth.get(),
            active_recomputes: self.active_recomputes.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
