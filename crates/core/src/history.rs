//! In-memory conversation history.
//!
//! Best-effort, process-local, bounded per user. Durability is a non-goal;
//! a restart forgets everything.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::conversation::Turn;
use crate::limits::DEFAULT_HISTORY_TURNS;
use crate::traits::HistoryStore;
use crate::UserId;

/// Bounded per-user history kept in process memory.
pub struct MemoryHistory {
    turns: Mutex<HashMap<UserId, VecDeque<Turn>>>,
    max_turns: usize,
}

impl MemoryHistory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Mutex::new(HashMap::new()),
            max_turns,
        }
    }

    /// Number of users with any stored history.
    pub fn user_count(&self) -> usize {
        self.turns.lock().len()
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_TURNS)
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn append(&self, user_id: UserId, turn: Turn) {
        let mut turns = self.turns.lock();
        let entry = turns.entry(user_id).or_default();
        entry.push_back(turn);
        while entry.len() > self.max_turns {
            entry.pop_front();
        }
    }

    async fn recent(&self, user_id: UserId, limit: usize) -> Vec<Turn> {
        let turns = self.turns.lock();
        match turns.get(&user_id) {
            Some(entry) => {
                let skip = entry.len().saturating_sub(limit);
                entry.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    async fn clear(&self, user_id: UserId) {
        self.turns.lock().remove(&user_id);
    }
}
