//! In-flight job tracking.
//!
//! The registry answers three questions: is this exact job already
//! running (duplicate guard), does this user have any image activity, and
//! which jobs have been tracked for suspiciously long (staleness sweep).
//! The user-activity scan is linear; the pool is a handful of slots wide,
//! so no secondary index is warranted.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::warn;
use uuid::Uuid;

use relay_core::{JobKey, UserId};

#[derive(Debug, Clone)]
struct TrackedJob {
    job_id: Uuid,
    user_id: UserId,
    started_at: Instant,
}

/// Map of in-flight (queued or running) jobs.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobKey, TrackedJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks a job unless its identity is already present.
    pub fn try_insert(&self, key: JobKey, job_id: Uuid, user_id: UserId) -> bool {
        let mut jobs = self.jobs.lock();
        if jobs.contains_key(&key) {
            return false;
        }
        jobs.insert(
            key,
            TrackedJob {
                job_id,
                user_id,
                started_at: Instant::now(),
            },
        );
        true
    }

    /// Stops tracking a job. Returns its start instant if it was present
    /// (a stale sweep may have evicted it first).
    pub fn remove(&self, key: &JobKey) -> Option<Instant> {
        self.jobs.lock().remove(key).map(|job| job.started_at)
    }

    /// Whether any tracked job belongs to this user.
    pub fn has_user_activity(&self, user_id: UserId) -> bool {
        self.jobs.lock().values().any(|job| job.user_id == user_id)
    }

    /// Evicts jobs tracked for longer than `max_age`.
    ///
    /// Bookkeeping correction only: the underlying processing future is
    /// untouched and may still settle afterwards.
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|key, job| {
            let fresh = now.duration_since(job.started_at) < max_age;
            if !fresh {
                warn!(
                    job_id = %job.job_id,
                    user_id = job.user_id,
                    key = %key,
                    age_secs = now.duration_since(job.started_at).as_secs(),
                    "Evicting stale job from registry"
                );
            }
            fresh
        });
        before - jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Drops all tracking state. Returns how many entries were cleared.
    pub fn clear(&self) -> usize {
        let mut jobs = self.jobs.lock();
        let cleared = jobs.len();
        jobs.clear();
        cleared
    }
}
