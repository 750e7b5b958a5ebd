//! Conversation History
//!
//! An append-only, length-bounded log of finalized turns. The history is the
//! context sent upstream with every new request.
//!
//! The oldest turns are evicted first whenever an append would exceed the
//! bound, so insertion order is always preserved.

use std::collections::VecDeque;

use serde::Serialize;

use crate::messages::{ChatMessage, Turn};

/// Default number of turns kept as context
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Bounded conversation log
#[derive(Clone, Debug, Serialize)]
#[serde(transparent)]
pub struct History {
    turns: VecDeque<Turn>,
    #[serde(skip)]
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// Create an empty history with the default bound
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Create an empty history with a custom bound (minimum 1)
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            turns: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Maximum number of turns retained
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of turns currently retained
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the history holds no turns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a finalized turn, evicting the oldest if the bound is exceeded
    pub fn append(&mut self, turn: Turn) {
        self.turns.push_back(turn);

        let mut evicted = 0;
        while self.turns.len() > self.limit {
            self.turns.pop_front();
            evicted += 1;
        }

        if evicted > 0 {
            tracing::debug!(
                evicted = evicted,
                remaining = self.turns.len(),
                "Pruned history by count"
            );
        }
    }

    /// Iterate turns oldest first
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// The most recently appended turn
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.back()
    }

    /// Wire messages for the current context, oldest first
    ///
    /// The returned vector is an independent copy; later appends do not
    /// affect it.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.turns.iter().map(Turn::to_message).collect()
    }

    /// Drop every turn (start a new chat)
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Serialize the full history as a pretty-printed JSON array of turns
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
