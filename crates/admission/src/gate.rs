//! Per-user single-flight gate.
//!
//! At most one heavy request (text completion or image job) per user.
//! Acquisition is a synchronous test-and-set: no suspension happens
//! between the check and the insert, so the check-then-set race of the
//! async runtime cannot occur. Entries carry an explicit deadline instead
//! of a fire-and-forget timer; a stuck holder becomes reclaimable once the
//! deadline passes and the reconciler sweeps the leftovers.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use relay_core::{limits::DEFAULT_FLIGHT_TTL_SECS, UserId};
use telemetry::metrics;

#[derive(Debug)]
struct FlightEntry {
    /// Acquisition token; release is a no-op unless tokens match, so a
    /// stale permit can never free a newer holder's slot.
    token: u64,
    deadline: Instant,
}

#[derive(Debug)]
struct GateInner {
    active: Mutex<HashMap<UserId, FlightEntry>>,
    ttl: Duration,
    next_token: AtomicU64,
}

/// Cloneable handle to the shared single-flight registry.
#[derive(Debug, Clone)]
pub struct SingleFlightGate {
    inner: Arc<GateInner>,
}

impl SingleFlightGate {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(GateInner {
                active: Mutex::new(HashMap::new()),
                ttl,
                next_token: AtomicU64::new(1),
            }),
        }
    }

    /// Claims the user's flight slot.
    ///
    /// Returns `None` while another heavy request holds it. On success the
    /// slot is marked before the caller does any asynchronous work, and is
    /// released when the returned permit drops.
    pub fn try_acquire(&self, user_id: UserId) -> Option<FlightPermit> {
        let now = Instant::now();
        let mut active = self.inner.active.lock();

        if let Some(entry) = active.get(&user_id) {
            if now < entry.deadline {
                return None;
            }
            // Past the safety deadline: the holder is considered hung and
            // its slot reclaimable.
            warn!(user_id = user_id, "Reclaiming expired flight slot");
        }

        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        active.insert(
            user_id,
            FlightEntry {
                token,
                deadline: now + self.inner.ttl,
            },
        );
        metrics().active_flights.set(active.len() as u64);

        Some(FlightPermit {
            gate: self.clone(),
            user_id,
            token,
        })
    }

    /// Whether a live (non-expired) flight exists for the user.
    pub fn is_active(&self, user_id: UserId) -> bool {
        let now = Instant::now();
        self.inner
            .active
            .lock()
            .get(&user_id)
            .is_some_and(|entry| now < entry.deadline)
    }

    /// Live flight count.
    pub fn active_count(&self) -> usize {
        let now = Instant::now();
        self.inner
            .active
            .lock()
            .values()
            .filter(|entry| now < entry.deadline)
            .count()
    }

    /// Admin escape hatch: drop a user's slot regardless of holder.
    pub fn force_release(&self, user_id: UserId) -> bool {
        let mut active = self.inner.active.lock();
        let removed = active.remove(&user_id).is_some();
        metrics().active_flights.set(active.len() as u64);
        removed
    }

    /// Removes entries past their safety deadline.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut active = self.inner.active.lock();
        let before = active.len();
        active.retain(|user_id, entry| {
            let live = now < entry.deadline;
            if !live {
                warn!(user_id = user_id, "Swept expired flight entry");
            }
            live
        });
        let swept = before - active.len();
        metrics().active_flights.set(active.len() as u64);
        swept
    }

    fn release(&self, user_id: UserId, token: u64) {
        let mut active = self.inner.active.lock();
        if active.get(&user_id).is_some_and(|e| e.token == token) {
            active.remove(&user_id);
        }
        metrics().active_flights.set(active.len() as u64);
    }
}

impl Default for SingleFlightGate {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_FLIGHT_TTL_SECS))
    }
}

/// RAII flight slot. Dropping it releases the user's slot, which makes
/// cleanup run on success, error, and cancellation alike.
#[derive(Debug)]
pub struct FlightPermit {
    gate: SingleFlightGate,
    user_id: UserId,
    token: u64,
}

impl FlightPermit {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.gate.release(self.user_id, self.token);
    }
}
