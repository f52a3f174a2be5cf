//! Background reconciliation.
//!
//! The engine's safety nets are deadlines plus periodic sweeps, not
//! fire-and-forget timers. This scheduler owns the sweeps: expired flight
//! entries, expired rate windows, stale jobs, and a periodic metrics
//! snapshot log.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info};

use admission::{RateLimiter, SingleFlightGate};
use telemetry::metrics;

use crate::pool::ImagePipeline;

/// Reconciler intervals.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Expired flight-entry sweep interval
    pub gate_sweep_interval: Duration,
    /// Expired rate-window sweep interval
    pub window_sweep_interval: Duration,
    /// Stale-job sweep interval
    pub job_sweep_interval: Duration,
    /// Metrics snapshot log interval
    pub metrics_log_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            gate_sweep_interval: Duration::from_secs(60),
            window_sweep_interval: Duration::from_secs(300), // 5 minutes
            job_sweep_interval: Duration::from_secs(60),
            metrics_log_interval: Duration::from_secs(60),
        }
    }
}

/// Periodic reconciliation pass over the engine's bookkeeping.
pub struct Reconciler {
    config: ReconcilerConfig,
    limiter: Arc<RateLimiter>,
    gate: SingleFlightGate,
    pipeline: Arc<ImagePipeline>,
}

impl Reconciler {
    pub fn new(
        config: ReconcilerConfig,
        limiter: Arc<RateLimiter>,
        gate: SingleFlightGate,
        pipeline: Arc<ImagePipeline>,
    ) -> Self {
        Self {
            config,
            limiter,
            gate,
            pipeline,
        }
    }

    /// Starts all reconciliation workers.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let reconciler = self.clone();
        handles.push(tokio::spawn(async move {
            reconciler.run_gate_sweep().await;
        }));

        let reconciler = self.clone();
        handles.push(tokio::spawn(async move {
            reconciler.run_window_sweep().await;
        }));

        let reconciler = self.clone();
        handles.push(tokio::spawn(async move {
            reconciler.run_job_sweep().await;
        }));

        let reconciler = self.clone();
        handles.push(tokio::spawn(async move {
            reconciler.run_metrics_log().await;
        }));

        info!("Reconciliation workers started");
        handles
    }

    async fn run_gate_sweep(&self) {
        let mut ticker = interval(self.config.gate_sweep_interval);
        loop {
            ticker.tick().await;
            let swept = self.gate.sweep_expired();
            if swept > 0 {
                debug!(swept = swept, "Gate sweep reclaimed expired flights");
            }
        }
    }

    async fn run_window_sweep(&self) {
        let mut ticker = interval(self.config.window_sweep_interval);
        loop {
            ticker.tick().await;
            let swept = self.limiter.sweep_expired();
            if swept > 0 {
                debug!(swept = swept, "Window sweep dropped expired rate windows");
            }
        }
    }

    async fn run_job_sweep(&self) {
        let mut ticker = interval(self.config.job_sweep_interval);
        loop {
            ticker.tick().await;
            let evicted = self.pipeline.evict_stale();
            if evicted > 0 {
                debug!(evicted = evicted, "Job sweep evicted stale jobs");
            }
        }
    }

    async fn run_metrics_log(&self) {
        let mut ticker = interval(self.config.metrics_log_interval);
        loop {
            ticker.tick().await;

            let snapshot = metrics().snapshot();
            let jobs = self.pipeline.stats();
            info!(
                requests = snapshot.requests_received,
                rate_limited = snapshot.requests_rate_limited,
                busy_rejected = snapshot.requests_rejected_busy,
                upstream_calls = snapshot.upstream_calls,
                upstream_failures = snapshot.upstream_failures,
                jobs_processed = jobs.processed,
                job_success_rate = snapshot.job_success_rate,
                active_flights = snapshot.active_flights,
                tracked_jobs = self.pipeline.tracked_jobs(),
                rate_windows = self.limiter.window_count(),
                "Engine snapshot"
            );
        }
    }
}
