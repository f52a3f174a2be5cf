//! Request admission for the relay engine.
//!
//! Two gates stand between an inbound message and the upstream: the
//! per-(user, action) sliding-window [`RateLimiter`] and the per-user
//! [`SingleFlightGate`]. Both are pure in-memory state behind
//! `parking_lot` locks; no operation suspends, which is what keeps
//! check-and-set sequences race-free on the async runtime.

pub mod gate;
pub mod limiter;
pub mod rules;

pub use gate::{FlightPermit, SingleFlightGate};
pub use limiter::{RateDecision, RateLimiter, RejectReason};
pub use rules::{ActionKind, ActionRule, RuleSet};
