//! Bounded-concurrency client for the remote completion API.
//!
//! Calls beyond the concurrency cap queue FIFO behind a fair semaphore and
//! dispatch in submission order. Each call gets a bounded retry budget with
//! exponential backoff; errors map onto the engine's typed taxonomy.

pub mod client;
pub mod config;
pub mod types;

pub use client::UpstreamClient;
pub use config::UpstreamConfig;
