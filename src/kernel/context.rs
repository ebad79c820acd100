use std::collections::VecDeque;

use super::event::Turn;

/// Rolling turn history used to build model context.
///
/// At most `capacity` turns are retained (oldest dropped first); `snippet`
/// renders the newest `window` of them.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    turns: VecDeque<Turn>,
    window: usize,
    capacity: usize,
}

impl ConversationContext {
    pub fn new(window: usize, capacity: usize) -> Self {
        let capacity = capacity.max(window).max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            window,
            capacity,
        }
    }

    pub fn record(&mut self, turn: Turn) {
        if self.turns.len() >= self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    pub fn pop_last(&mut self) -> Option<Turn> {
        self.turns.pop_back()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.back()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Newest `window` turns, oldest first, as `User:` / `Assistant:` lines.
    /// `skip_last` leaves out the most recent turn.
    pub fn snippet(&self, skip_last: bool) -> String {
        let end = if skip_last {
            self.turns.len().saturating_sub(1)
        } else {
            self.turns.len()
        };
        let start = end.saturating_sub(self.window);

        self.turns
            .range(start..end)
            .map(|t| format!("User: {}\nAssistant: {}", t.user, t.assistant))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new(3, 64)
    }
}
