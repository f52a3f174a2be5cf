//! Upstream client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use relay_core::limits::{
    DEFAULT_UPSTREAM_ATTEMPTS, DEFAULT_UPSTREAM_BACKOFF_BASE_MS, DEFAULT_UPSTREAM_CONCURRENCY,
    DEFAULT_UPSTREAM_TIMEOUT_SECS,
};

/// Completion-API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// API base URL (the `/chat/completions` path is appended).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token for the completion API.
    #[serde(default)]
    pub api_key: String,
    /// Default model when the caller does not specify one.
    #[serde(default = "default_model")]
    pub model: String,
    /// Concurrent calls; excess queues FIFO.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Total attempts per call.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Per-attempt network deadline in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Backoff base in milliseconds (`base * 2^(attempt-1)`).
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Sampling temperature forwarded on every request.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion token budget forwarded on every request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_concurrency() -> usize {
    DEFAULT_UPSTREAM_CONCURRENCY
}

fn default_attempts() -> u32 {
    DEFAULT_UPSTREAM_ATTEMPTS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_SECS
}

fn default_backoff_base_ms() -> u64 {
    DEFAULT_UPSTREAM_BACKOFF_BASE_MS
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_model(),
            max_concurrency: default_max_concurrency(),
            attempts: default_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
            backoff_base_ms: default_backoff_base_ms(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl UpstreamConfig {
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Backoff before attempt `attempt + 1`, given `attempt` just failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}
