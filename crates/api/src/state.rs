//! Application state shared across handlers.

use std::sync::Arc;

use crate::service::RelayService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The relay orchestration core.
    pub service: Arc<RelayService>,
}

impl AppState {
    pub fn new(service: Arc<RelayService>) -> Self {
        Self { service }
    }
}
