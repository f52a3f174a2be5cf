//! Internal metrics collection.
//!
//! Counters and gauges are lock-free atomics; histograms use fixed
//! millisecond buckets sized for completion-API latencies.

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

    pub fn dec(&self) {
        // Saturate at zero rather than wrap; eviction sweeps can race a
        // normal settlement for the same decrement.
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s, 30s, 60s, 180s
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
    const BUCKET_BOUNDS: [u64; 11] = [
        50, 100, 250, 500, 1000, 2500, 5000, 10000, 30000, 60000, 180000,
    ];

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

/// Collected metrics for the relay engine.
#[derive(Debug, Default)]
pub struct Metrics {
    // Admission metrics
    pub requests_received: Counter,
    pub requests_rate_limited: Counter,
    pub requests_rejected_busy: Counter,

    // Upstream client metrics
    pub upstream_calls: Counter,
    pub upstream_retries: Counter,
    pub upstream_failures: Counter,

    // Image pipeline metrics
    pub jobs_submitted: Counter,
    pub jobs_succeeded: Counter,
    pub jobs_failed: Counter,
    pub jobs_rejected_duplicate: Counter,
    pub jobs_evicted_stale: Counter,

    // Pagination metrics
    pub replies_paginated: Counter,
    pub pages_served: Counter,

    // Latency histograms
    pub request_latency_ms: Histogram,
    pub upstream_latency_ms: Histogram,
    pub job_duration_ms: Histogram,

    // Gauges
    pub active_flights: Gauge,
    pub upstream_in_flight: Gauge,
    pub active_jobs: Gauge,
    pub queued_jobs: Gauge,
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
    pub requests_received: u64,
    pub requests_rate_limited: u64,
    pub requests_rejected_busy: u64,
    pub upstream_calls: u64,
    pub upstream_retries: u64,
    pub upstream_failures: u64,
    pub jobs_submitted: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_evicted_stale: u64,
    pub job_success_rate: f64,
    pub request_latency_mean_ms: f64,
    pub upstream_latency_mean_ms: f64,
    pub job_duration_mean_ms: f64,
    pub active_flights: u64,
    pub upstream_in_flight: u64,
    pub active_jobs: u64,
    pub queued_jobs: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let succeeded = self.jobs_succeeded.get();
        let failed = self.jobs_failed.get();
        let settled = succeeded + failed;
        let job_success_rate = if settled == 0 {
            1.0
        } else {
            succeeded as f64 / settled as f64
        };

        MetricsSnapshot {
            timestamp: Utc::now(),
            requests_received: self.requests_received.get(),
            requests_rate_limited: self.requests_rate_limited.get(),
            requests_rejected_busy: self.requests_rejected_busy.get(),
            upstream_calls: self.upstream_calls.get(),
            upstream_retries: self.upstream_retries.get(),
            upstream_failures: self.upstream_failures.get(),
            jobs_submitted: self.jobs_submitted.get(),
            jobs_succeeded: succeeded,
            jobs_failed: failed,
            jobs_evicted_stale: self.jobs_evicted_stale.get(),
            job_success_rate,
            request_latency_mean_ms: self.request_latency_ms.mean(),
            upstream_latency_mean_ms: self.upstream_latency_ms.mean(),
            job_duration_mean_ms: self.job_duration_ms.mean(),
            active_flights: self.active_flights.get(),
            upstream_in_flight: self.upstream_in_flight.get(),
            active_jobs: self.active_jobs.get(),
            queued_jobs: self.queued_jobs.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
