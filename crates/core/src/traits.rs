//! Capability traits at the engine's I/O seams.
//!
//! Components depend on these narrow interfaces instead of concrete
//! collaborators, which is what lets the integration tests run the full
//! admission path against a scripted upstream.

use async_trait::async_trait;

use crate::conversation::{Conversation, Turn};
use crate::error::Result;
use crate::UserId;

/// Bounded-concurrency client for the remote completion API.
#[async_trait]
pub trait UpstreamCaller: Send + Sync {
    /// Sends a conversation and returns the extracted assistant text.
    async fn complete(&self, conversation: &Conversation, model: &str) -> Result<String>;
}

/// Per-user conversation history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, user_id: UserId, turn: Turn);

    /// Most recent turns, oldest first, at most `limit`.
    async fn recent(&self, user_id: UserId, limit: usize) -> Vec<Turn>;

    async fn clear(&self, user_id: UserId);
}
