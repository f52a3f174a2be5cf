//! Core types, errors, and capability traits for the relay engine.

pub mod conversation;
pub mod error;
pub mod history;
pub mod job;
pub mod limits;
pub mod traits;

pub use conversation::*;
pub use error::{Error, Result};
pub use history::*;
pub use job::*;
pub use traits::*;

/// Chat-platform user identifier.
pub type UserId = i64;

/// Chat (conversation/channel) identifier.
pub type ChatId = i64;

/// Delivered-message identifier within a chat.
pub type MessageId = i64;
