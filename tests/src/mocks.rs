//! Mock implementations for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use relay_core::{Conversation, Error, Result, UpstreamCaller};

/// Mock upstream that captures conversations and replays scripted
/// outcomes.
///
/// Implements the same `UpstreamCaller` trait as the real client, so the
/// full admission path runs unchanged while tests control exactly what
/// the "completion API" returns and how long it takes.
pub struct MockUpstream {
    /// Scripted outcomes, consumed front to back; exhausted scripts fall
    /// back to the canned answer.
    outcomes: Mutex<Vec<Result<String>>>,
    /// Every (conversation, model) this mock has seen.
    calls: Mutex<Vec<(Conversation, String)>>,
    call_count: AtomicUsize,
    delay: Mutex<Duration>,
    canned_answer: Mutex<String>,
}

impl MockUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
            delay: Mutex::new(Duration::ZERO),
            canned_answer: Mutex::new("The answer is 42.".to_string()),
        })
    }

    /// Sets the fallback answer returned when no script is queued.
    pub fn set_answer(&self, answer: impl Into<String>) {
        *self.canned_answer.lock() = answer.into();
    }

    /// Queues one scripted outcome.
    pub fn push_outcome(&self, outcome: Result<String>) {
        self.outcomes.lock().push(outcome);
    }

    /// Queues a scripted failure.
    pub fn push_failure(&self, error: Error) {
        self.push_outcome(Err(error));
    }

    /// Makes every call sleep first, to hold flight slots open.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Conversations captured so far.
    pub fn captured_calls(&self) -> Vec<(Conversation, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl UpstreamCaller for MockUpstream {
    async fn complete(&self, conversation: &Conversation, model: &str) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.calls
            .lock()
            .push((conversation.clone(), model.to_string()));

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = {
            let mut outcomes = self.outcomes.lock();
            if outcomes.is_empty() {
                None
            } else {
                Some(outcomes.remove(0))
            }
        };

        match scripted {
            Some(outcome) => outcome,
            None => Ok(self.canned_answer.lock().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_outcomes_replay_in_order() {
        let mock = MockUpstream::new();
        mock.push_outcome(Ok("first".into()));
        mock.push_failure(Error::EmptyResponse);

        let conv = Conversation::new();
        assert_eq!(mock.complete(&conv, "m").await.unwrap(), "first");
        assert!(mock.complete(&conv, "m").await.is_err());
        // Script exhausted: canned answer takes over.
        assert_eq!(mock.complete(&conv, "m").await.unwrap(), "The answer is 42.");
        assert_eq!(mock.call_count(), 3);
    }
}
