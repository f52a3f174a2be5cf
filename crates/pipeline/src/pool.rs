//! The bounded image worker pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use relay_core::limits::{
    DEFAULT_JOB_ATTEMPTS, DEFAULT_JOB_ATTEMPT_TIMEOUT_SECS, DEFAULT_JOB_BACKOFF_BASE_MS,
    DEFAULT_JOB_STALE_AFTER_SECS, DEFAULT_PIPELINE_CAPACITY, DEFAULT_SHUTDOWN_GRACE_SECS,
};
use relay_core::{Error, ImageJob, JobKey, Result, UpstreamCaller, UserId};
use telemetry::{health, metrics};

use crate::registry::JobRegistry;
use crate::stats::{PipelineStats, PipelineStatsSnapshot};

/// Image pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Concurrent jobs (pool slots).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Total attempts per job.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Per-attempt deadline in seconds.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    /// Backoff base in milliseconds (`base * 2^(attempt-1)`).
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Age past which a tracked job is evicted as stale.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// How long shutdown waits for outstanding jobs.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    /// System prompt prepended to every image conversation.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_capacity() -> usize {
    DEFAULT_PIPELINE_CAPACITY
}

fn default_attempts() -> u32 {
    DEFAULT_JOB_ATTEMPTS
}

fn default_attempt_timeout_secs() -> u64 {
    DEFAULT_JOB_ATTEMPT_TIMEOUT_SECS
}

fn default_backoff_base_ms() -> u64 {
    DEFAULT_JOB_BACKOFF_BASE_MS
}

fn default_stale_after_secs() -> u64 {
    DEFAULT_JOB_STALE_AFTER_SECS
}

fn default_shutdown_grace_secs() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_SECS
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            attempts: default_attempts(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            backoff_base_ms: default_backoff_base_ms(),
            stale_after_secs: default_stale_after_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            system_prompt: None,
        }
    }
}

impl PipelineConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

/// Capacity-limited worker pool for image-analysis jobs.
///
/// `capacity` jobs run concurrently; the rest wait FIFO on the fair
/// semaphore. Jobs are tracked from submission (before a slot is held),
/// so queued work participates in the duplicate guard and counts as user
/// activity.
pub struct ImagePipeline {
    config: PipelineConfig,
    registry: Arc<JobRegistry>,
    stats: Arc<PipelineStats>,
    upstream: Arc<dyn UpstreamCaller>,
    slots: Arc<Semaphore>,
    accepting: AtomicBool,
}

impl ImagePipeline {
    pub fn new(config: PipelineConfig, upstream: Arc<dyn UpstreamCaller>) -> Self {
        let slots = Arc::new(Semaphore::new(config.capacity));
        health().pipeline.set_healthy();
        Self {
            config,
            registry: Arc::new(JobRegistry::new()),
            stats: Arc::new(PipelineStats::new()),
            upstream,
            slots,
            accepting: AtomicBool::new(true),
        }
    }

    /// Runs one job to settlement and returns the produced answer.
    pub async fn submit(&self, job: ImageJob, model: &str) -> Result<String> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(Error::unknown("image pipeline is shutting down"));
        }

        let key = job.key();
        if !self.registry.try_insert(key.clone(), job.id, job.user_id) {
            metrics().jobs_rejected_duplicate.inc();
            warn!(job_id = %job.id, key = %key, "Duplicate job identity rejected");
            return Err(Error::AlreadyBusy);
        }
        metrics().jobs_submitted.inc();
        metrics().queued_jobs.inc();

        let mut guard = JobGuard {
            registry: self.registry.clone(),
            key,
            running: false,
        };

        let _slot = self
            .slots
            .acquire()
            .await
            .map_err(|_| Error::unknown("image pipeline is closed"))?;
        guard.running = true;
        metrics().queued_jobs.dec();
        metrics().active_jobs.inc();

        let started = Instant::now();
        let conversation = job.to_conversation(self.config.system_prompt.as_deref());

        debug!(
            job_id = %job.id,
            user_id = job.user_id,
            file_id = %job.file_id,
            "Image job started"
        );

        let mut last_error = Error::unknown("no attempts executed");

        for attempt in 1..=self.config.attempts {
            let outcome =
                tokio::time::timeout(self.config.attempt_timeout(), async {
                    self.upstream.complete(&conversation, model).await
                })
                .await;

            match outcome {
                Ok(Ok(text)) => {
                    let elapsed = started.elapsed();
                    self.stats.record_success(elapsed);
                    metrics().jobs_succeeded.inc();
                    metrics()
                        .job_duration_ms
                        .observe(elapsed.as_millis() as u64);
                    info!(
                        job_id = %job.id,
                        user_id = job.user_id,
                        attempt = attempt,
                        duration_ms = elapsed.as_millis() as u64,
                        "Image job succeeded"
                    );
                    return Ok(text);
                }
                Ok(Err(err)) if !err.is_retryable() => {
                    let elapsed = started.elapsed();
                    self.stats.record_failure(elapsed);
                    metrics().jobs_failed.inc();
                    metrics()
                        .job_duration_ms
                        .observe(elapsed.as_millis() as u64);
                    warn!(job_id = %job.id, attempt = attempt, error = %err, "Image job rejected");
                    return Err(err);
                }
                Ok(Err(err)) => {
                    warn!(
                        job_id = %job.id,
                        attempt = attempt,
                        max_attempts = self.config.attempts,
                        error = %err,
                        "Image job attempt failed"
                    );
                    last_error = err;
                }
                Err(_) => {
                    warn!(
                        job_id = %job.id,
                        attempt = attempt,
                        timeout_secs = self.config.attempt_timeout_secs,
                        "Image job attempt timed out"
                    );
                    last_error = Error::Timeout {
                        elapsed: self.config.attempt_timeout(),
                    };
                }
            }

            if attempt < self.config.attempts {
                tokio::time::sleep(self.config.backoff(attempt)).await;
            }
        }

        let elapsed = started.elapsed();
        self.stats.record_failure(elapsed);
        metrics().jobs_failed.inc();
        metrics()
            .job_duration_ms
            .observe(elapsed.as_millis() as u64);

        Err(Error::UpstreamTransient {
            message: format!(
                "image job failed ({}ms elapsed): {}",
                elapsed.as_millis(),
                last_error
            ),
            attempts: self.config.attempts,
        })
    }

    /// Whether this user has a queued or running image job.
    pub fn has_user_activity(&self, user_id: UserId) -> bool {
        self.registry.has_user_activity(user_id)
    }

    /// Evicts jobs tracked past the staleness threshold.
    ///
    /// Bookkeeping only: in-flight processing is not cancelled and its
    /// result may still reach the caller after eviction.
    pub fn evict_stale(&self) -> usize {
        let evicted = self.registry.evict_older_than(self.config.stale_after());
        if evicted > 0 {
            metrics().jobs_evicted_stale.inc_by(evicted as u64);
            for _ in 0..evicted {
                metrics().active_jobs.dec();
            }
        }
        evicted
    }

    /// Tracked (queued + running) job count.
    pub fn tracked_jobs(&self) -> usize {
        self.registry.len()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stops intake, waits up to the grace period for jobs to settle, then
    /// force-clears all tracking state.
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::Release);
        health().pipeline.set_unhealthy("draining");
        info!(
            outstanding = self.registry.len(),
            grace_secs = self.config.shutdown_grace_secs,
            "Image pipeline draining"
        );

        let deadline = Instant::now() + self.config.shutdown_grace();
        while !self.registry.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let cleared = self.registry.clear();
        if cleared > 0 {
            warn!(cleared = cleared, "Force-cleared unsettled jobs at shutdown");
        }
        metrics().active_jobs.set(0);
        metrics().queued_jobs.set(0);
    }
}

/// Settlement guard: stops tracking the job no matter how the processing
/// future ends. A stale sweep may have removed the entry already, in which
/// case the gauges were corrected by the sweep and stay untouched here.
struct JobGuard {
    registry: Arc<JobRegistry>,
    key: JobKey,
    running: bool,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if self.registry.remove(&self.key).is_some() {
            if self.running {
                metrics().active_jobs.dec();
            } else {
                metrics().queued_jobs.dec();
            }
        }
    }
}
