//! Sliding-window rate limiter with violation tracking and VIP bypass.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use relay_core::{Error, UserId};

use crate::rules::{ActionKind, ActionRule, RuleSet};

/// Why a check was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// An earlier violation's block is still active.
    Blocked,
    /// The current window's budget is spent.
    WindowExhausted,
}

/// Outcome of a rate check.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests left in the window after this check.
    pub remaining: u32,
    /// When the current window resets.
    pub reset_at: Instant,
    /// Active temporary block, if any.
    pub blocked_until: Option<Instant>,
    pub reason: Option<RejectReason>,
}

impl RateDecision {
    fn allowed(remaining: u32, reset_at: Instant) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_at,
            blocked_until: None,
            reason: None,
        }
    }

    fn rejected(reset_at: Instant, blocked_until: Option<Instant>, reason: RejectReason) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_at,
            blocked_until,
            reason: Some(reason),
        }
    }

    /// How long the caller should wait before trying again.
    pub fn retry_after(&self, now: Instant) -> Duration {
        let until = self.blocked_until.unwrap_or(self.reset_at);
        until.saturating_duration_since(now)
    }

    /// Converts a rejection into the typed error, `None` when allowed.
    pub fn as_error(&self, now: Instant) -> Option<Error> {
        if self.allowed {
            return None;
        }
        Some(Error::RateLimited {
            retry_after: self.retry_after(now),
            blocked_for: self
                .blocked_until
                .map(|until| until.saturating_duration_since(now)),
        })
    }
}

/// Per-(user, action) counter state.
#[derive(Debug)]
struct RateWindow {
    count: u32,
    window_reset_at: Instant,
    blocked_until: Option<Instant>,
    violations: u32,
}

impl RateWindow {
    fn fresh(now: Instant, rule: &ActionRule, violations: u32) -> Self {
        Self {
            count: 0,
            window_reset_at: now + rule.window(),
            blocked_until: None,
            violations,
        }
    }
}

/// Sliding-window limiter over (user, action-kind) keys.
///
/// All mutation happens inside `check_at` under one lock; windows are
/// created lazily and swept periodically to bound memory.
pub struct RateLimiter {
    windows: Mutex<HashMap<(UserId, ActionKind), RateWindow>>,
    rules: RwLock<RuleSet>,
    vips: RwLock<HashSet<UserId>>,
}

impl RateLimiter {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            rules: RwLock::new(rules),
            vips: RwLock::new(HashSet::new()),
        }
    }

    /// Check whether `user_id` may perform `kind` now.
    pub fn check(&self, user_id: UserId, kind: ActionKind) -> RateDecision {
        self.check_at(user_id, kind, Instant::now())
    }

    /// The decision ladder, against an explicit clock.
    ///
    /// Order matters: VIP bypass, then active block, then lazy window
    /// rollover, then budget.
    pub fn check_at(&self, user_id: UserId, kind: ActionKind, now: Instant) -> RateDecision {
        let rule = self.rules.read().rule_for(kind);

        if self.vips.read().contains(&user_id) {
            return RateDecision::allowed(rule.max_requests, now);
        }

        let mut windows = self.windows.lock();
        let window = windows
            .entry((user_id, kind))
            .or_insert_with(|| RateWindow::fresh(now, &rule, 0));

        // Already blocked: reject with the existing block, no new violation.
        if let Some(blocked_until) = window.blocked_until {
            if now < blocked_until {
                return RateDecision::rejected(
                    window.window_reset_at,
                    Some(blocked_until),
                    RejectReason::Blocked,
                );
            }
            window.blocked_until = None;
        }

        // Lazy rollover, carrying the violation history forward.
        if now > window.window_reset_at {
            *window = RateWindow::fresh(now, &rule, window.violations);
        }

        if window.count >= rule.max_requests {
            window.violations += 1;
            if let Some(block) = rule.block() {
                window.blocked_until = Some(now + block);
            }
            debug!(
                user_id = user_id,
                kind = %kind,
                violations = window.violations,
                blocked = window.blocked_until.is_some(),
                "Rate limit exceeded"
            );
            return RateDecision::rejected(
                window.window_reset_at,
                window.blocked_until,
                RejectReason::WindowExhausted,
            );
        }

        window.count += 1;
        RateDecision::allowed(rule.max_requests - window.count, window.window_reset_at)
    }

    // === Administrative operations ===

    pub fn add_vip(&self, user_id: UserId) -> bool {
        let added = self.vips.write().insert(user_id);
        if added {
            info!(user_id = user_id, "Added VIP");
        }
        added
    }

    pub fn remove_vip(&self, user_id: UserId) -> bool {
        let removed = self.vips.write().remove(&user_id);
        if removed {
            info!(user_id = user_id, "Removed VIP");
        }
        removed
    }

    pub fn is_vip(&self, user_id: UserId) -> bool {
        self.vips.read().contains(&user_id)
    }

    /// Drops one kind's window for a user, or every kind when `None`.
    pub fn reset_user(&self, user_id: UserId, kind: Option<ActionKind>) -> usize {
        let mut windows = self.windows.lock();
        let before = windows.len();
        match kind {
            Some(kind) => {
                windows.remove(&(user_id, kind));
            }
            None => {
                windows.retain(|(uid, _), _| *uid != user_id);
            }
        }
        before - windows.len()
    }

    /// Replaces one rule. Whole-rule replacement, never field mutation.
    pub fn replace_rule(&self, kind: ActionKind, rule: ActionRule) {
        self.rules.write().insert(kind, rule);
        info!(kind = %kind, max = rule.max_requests, window_ms = rule.window_ms, "Replaced rate rule");
    }

    /// Removes fully expired, non-blocked windows to bound memory.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| {
            let blocked = w.blocked_until.is_some_and(|until| now < until);
            blocked || now <= w.window_reset_at
        });
        before - windows.len()
    }

    /// Live window count, for observability.
    pub fn window_count(&self) -> usize {
        self.windows.lock().len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RuleSet::default())
    }
}
