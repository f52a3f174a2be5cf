//! Internal telemetry for the relay engine.
//!
//! Metrics stay in-memory behind atomics; the stats endpoint serves
//! snapshots and the reconciler logs one periodically. No external
//! metrics system.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
