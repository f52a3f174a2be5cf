//! Pagination cursor state per delivered message.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use relay_core::{ChatId, MessageId};

/// Navigation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Prev,
    Next,
}

/// Navigation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NavError {
    /// The move would leave `[0, page_count)`; state is unchanged.
    #[error("no further pages in that direction")]
    NoFurtherPages,
    /// No pagination state exists for this message.
    #[error("no pagination state for this message")]
    UnknownMessage,
}

/// One message's page set and cursor.
#[derive(Debug, Clone)]
pub struct PaginationState {
    pages: Vec<String>,
    current: usize,
}

impl PaginationState {
    pub fn new(pages: Vec<String>) -> Self {
        Self { pages, current: 0 }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_page(&self) -> &str {
        &self.pages[self.current]
    }
}

/// A page handed back to the delivery layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageView {
    pub index: usize,
    pub count: usize,
    pub text: String,
}

/// Cursor states keyed by (chat, delivered message).
///
/// Created only for multi-page replies; removed when the message is
/// replaced, navigated away from, or the chat is bulk-cleared.
#[derive(Default)]
pub struct PaginationStore {
    states: Mutex<HashMap<(ChatId, MessageId), PaginationState>>,
}

impl PaginationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers pages for a delivered message.
    ///
    /// Single-page replies need no cursor; they are ignored and `false`
    /// is returned. Registering over an existing key replaces it.
    pub fn register(&self, chat_id: ChatId, message_id: MessageId, pages: Vec<String>) -> bool {
        if pages.len() < 2 {
            return false;
        }
        self.states
            .lock()
            .insert((chat_id, message_id), PaginationState::new(pages));
        true
    }

    /// Moves the cursor and returns the new page.
    pub fn navigate(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        direction: Direction,
    ) -> Result<PageView, NavError> {
        let mut states = self.states.lock();
        let state = states
            .get_mut(&(chat_id, message_id))
            .ok_or(NavError::UnknownMessage)?;

        let next = match direction {
            Direction::Prev => state.current.checked_sub(1),
            Direction::Next => {
                let candidate = state.current + 1;
                (candidate < state.pages.len()).then_some(candidate)
            }
        }
        .ok_or(NavError::NoFurtherPages)?;

        state.current = next;
        Ok(PageView {
            index: state.current,
            count: state.pages.len(),
            text: state.pages[state.current].clone(),
        })
    }

    /// Drops one message's state.
    pub fn remove(&self, chat_id: ChatId, message_id: MessageId) -> bool {
        self.states.lock().remove(&(chat_id, message_id)).is_some()
    }

    /// Drops every state for a chat. Returns how many were removed.
    pub fn clear_chat(&self, chat_id: ChatId) -> usize {
        let mut states = self.states.lock();
        let before = states.len();
        states.retain(|(cid, _), _| *cid != chat_id);
        before - states.len()
    }

    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.lock().is_empty()
    }
}
