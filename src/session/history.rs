//! Append-only log of completed turns

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One user utterance and the assistant reply it produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub user: String,
    pub bot: String,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a turn stamped with the current time
    #[must_use]
    pub fn new(user: impl Into<String>, bot: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            bot: bot.into(),
            created_at: Utc::now(),
        }
    }
}

/// Ordered record of completed turns
///
/// Turns are only ever appended; the sole removal path is a full session
/// reset.
#[derive(Debug, Clone, Default)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Append a completed turn
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// All turns in insertion order
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop every turn (session reset only)
    pub(crate) fn clear(&mut self) {
        self.turns.clear();
    }
}
