//! The bounded-concurrency completion client.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use relay_core::{Conversation, Error, Result, UpstreamCaller};
use telemetry::{health, metrics};

use crate::config::UpstreamConfig;
use crate::types::{extract_text, parse_response, ChatRequest};

/// Longest upstream body fragment carried in error messages.
const ERROR_BODY_SNIPPET: usize = 512;

/// Client for the remote completion API.
///
/// A fair semaphore caps concurrent calls at `max_concurrency`; waiters
/// queue FIFO, so dispatch order is submission order.
pub struct UpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
    slots: Arc<Semaphore>,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::unknown(format!("failed to build HTTP client: {}", e)))?;

        let slots = Arc::new(Semaphore::new(config.max_concurrency));
        Ok(Self {
            http,
            config,
            slots,
        })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Free slots right now (capacity minus in-flight calls).
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    async fn complete_inner(&self, conversation: &Conversation, model: &str) -> Result<String> {
        let request = ChatRequest::from_conversation(
            conversation,
            model,
            self.config.temperature,
            self.config.max_tokens,
        );

        let _slot = self
            .slots
            .acquire()
            .await
            .map_err(|_| Error::unknown("upstream client is closed"))?;
        let _in_flight = InFlightGuard::new();

        let mut last_error = Error::unknown("no attempts executed");

        for attempt in 1..=self.config.attempts {
            metrics().upstream_calls.inc();
            let start = Instant::now();

            match self.attempt(&request).await {
                Ok(text) => {
                    metrics()
                        .upstream_latency_ms
                        .observe(start.elapsed().as_millis() as u64);
                    health().upstream.set_healthy();
                    debug!(
                        model = model,
                        attempt = attempt,
                        latency_ms = start.elapsed().as_millis() as u64,
                        chars = text.len(),
                        "Upstream call succeeded"
                    );
                    return Ok(text);
                }
                Err(err) if !err.is_retryable() => {
                    metrics().upstream_failures.inc();
                    warn!(model = model, attempt = attempt, error = %err, "Upstream call rejected");
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        model = model,
                        attempt = attempt,
                        max_attempts = self.config.attempts,
                        error = %err,
                        "Upstream attempt failed"
                    );
                    last_error = err;
                    if attempt < self.config.attempts {
                        metrics().upstream_retries.inc();
                        tokio::time::sleep(self.config.backoff(attempt)).await;
                    }
                }
            }
        }

        metrics().upstream_failures.inc();
        health().upstream.set_unhealthy(last_error.to_string());

        // Shape and emptiness failures keep their type through exhaustion;
        // network/5xx/timeout chains consolidate into one transient error.
        match last_error {
            err @ (Error::UpstreamMalformed(_) | Error::EmptyResponse) => Err(err),
            other => Err(Error::UpstreamTransient {
                message: other.to_string(),
                attempts: self.config.attempts,
            }),
        }
    }

    async fn attempt(&self, request: &ChatRequest) -> Result<String> {
        let response = self
            .http
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.request_timeout())
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.classify_transport(e))?;

        if !(200..300).contains(&status) {
            return Err(classify_status(status, &body));
        }

        let parsed = parse_response(&body)?;
        extract_text(&parsed)
    }

    /// Timeouts abort the in-flight request (reqwest drops the connection)
    /// and classify separately from other transport failures.
    fn classify_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                elapsed: self.config.request_timeout(),
            }
        } else {
            Error::UpstreamTransient {
                message: format!("network error: {}", err),
                attempts: 1,
            }
        }
    }
}

/// Maps a non-2xx status to the taxonomy: 429 and 5xx retry, any other
/// 4xx surfaces immediately with the upstream's status and body.
fn classify_status(status: u16, body: &str) -> Error {
    let snippet = truncate(body, ERROR_BODY_SNIPPET);
    if status == 429 || status >= 500 {
        Error::UpstreamTransient {
            message: format!("upstream returned {}: {}", status, snippet),
            attempts: 1,
        }
    } else {
        Error::UpstreamRejected {
            status,
            body: snippet,
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

struct InFlightGuard;

impl InFlightGuard {
    fn new() -> Self {
        metrics().upstream_in_flight.inc();
        Self
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        metrics().upstream_in_flight.dec();
    }
}

#[async_trait]
impl UpstreamCaller for UpstreamClient {
    async fn complete(&self, conversation: &Conversation, model: &str) -> Result<String> {
        self.complete_inner(conversation, model).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_and_5xx_are_transient() {
        assert!(classify_status(429, "slow down").is_retryable());
        assert!(classify_status(500, "oops").is_retryable());
        assert!(classify_status(503, "overloaded").is_retryable());
    }

    #[test]
    fn other_4xx_rejects_immediately_with_status_and_body() {
        let err = classify_status(400, "bad payload");
        assert!(!err.is_retryable());
        match err {
            Error::UpstreamRejected { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad payload");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn error_bodies_are_truncated() {
        let huge = "x".repeat(10_000);
        match classify_status(401, &huge) {
            Error::UpstreamRejected { body, .. } => {
                assert_eq!(body.chars().count(), ERROR_BODY_SNIPPET);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn client_starts_with_full_capacity() {
        let client = UpstreamClient::new(UpstreamConfig::default()).unwrap();
        assert_eq!(
            client.available_slots(),
            UpstreamConfig::default().max_concurrency
        );
    }
}
