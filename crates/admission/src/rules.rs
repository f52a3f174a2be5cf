//! Static rate-limit rules per action kind.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Kinds of rate-limited user actions.
///
/// `Global` doubles as the fallback rule for kinds without an explicit
/// entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Text,
    Image,
    Settings,
    Command,
    Global,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Settings => "settings",
            Self::Command => "command",
            Self::Global => "global",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limit definition for one action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRule {
    /// Allowed requests per window.
    pub max_requests: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Temporary block applied once the window is exhausted.
    #[serde(default)]
    pub block_ms: Option<u64>,
}

impl ActionRule {
    pub const fn new(max_requests: u32, window_ms: u64, block_ms: Option<u64>) -> Self {
        Self {
            max_requests,
            window_ms,
            block_ms,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn block(&self) -> Option<Duration> {
        self.block_ms.map(Duration::from_millis)
    }
}

/// Full rule table. Replaced wholesale on admin update, never mutated in
/// place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    rules: HashMap<ActionKind, ActionRule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        let mut rules = HashMap::new();
        rules.insert(ActionKind::Text, ActionRule::new(30, 60_000, Some(300_000)));
        rules.insert(ActionKind::Image, ActionRule::new(10, 60_000, Some(300_000)));
        rules.insert(ActionKind::Settings, ActionRule::new(20, 60_000, None));
        rules.insert(ActionKind::Command, ActionRule::new(30, 60_000, None));
        rules.insert(
            ActionKind::Global,
            ActionRule::new(60, 60_000, Some(600_000)),
        );
        Self { rules }
    }
}

impl RuleSet {
    /// Rule for a kind, falling back to the global bucket.
    pub fn rule_for(&self, kind: ActionKind) -> ActionRule {
        self.rules
            .get(&kind)
            .or_else(|| self.rules.get(&ActionKind::Global))
            .copied()
            // The default table always has a Global entry; a custom table
            // without one gets a permissive floor instead of a panic.
            .unwrap_or(ActionRule::new(60, 60_000, None))
    }

    pub fn insert(&mut self, kind: ActionKind, rule: ActionRule) {
        self.rules.insert(kind, rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
