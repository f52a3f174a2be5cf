//! HTTP API layer for the relay engine.

pub mod extractors;
pub mod response;
pub mod routes;
pub mod service;
pub mod state;

pub use routes::router;
pub use service::{RelayService, Reply, ServiceConfig};
pub use state::AppState;
