use std::collections::HashSet;
use uuid::Uuid;

use super::context::ConversationContext;
use super::event::Turn;
use super::task::{Fingerprint, PendingAction};
use crate::config::DialogueConfig;

/// Strict state delta. This is the ONLY way conversation state mutates.
#[derive(Debug, Clone, PartialEq)]
pub enum StateDelta {
    TurnRecorded(Turn),
    /// Hides the most recent turn from future context.
    LastTurnPopped,
    PendingSet(PendingAction),
    PendingCleared,
    TaskCompleted(Fingerprint),
}

/// Everything one conversation remembers. Owned by a single driver and
/// passed by `&mut` into each turn; never shared across conversations.
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub id: Uuid,
    context: ConversationContext,
    pending: Option<PendingAction>,
    // Lives as long as the conversation; no eviction.
    completed: HashSet<Fingerprint>,
    /// Bumped on every reduction.
    pub version: u64,
}

impl ConversationState {
    pub fn new(config: &DialogueConfig) -> Self {
        Self::with_context(ConversationContext::new(
            config.context_window,
            config.history_capacity,
        ))
    }

    pub fn with_context(context: ConversationContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            context,
            pending: None,
            completed: HashSet::new(),
            version: 0,
        }
    }

    pub fn reduce(&mut self, delta: StateDelta) {
        self.version += 1;

        match delta {
            StateDelta::TurnRecorded(turn) => self.context.record(turn),
            StateDelta::LastTurnPopped => {
                self.context.pop_last();
            }
            StateDelta::PendingSet(action) => self.pending = Some(action),
            StateDelta::PendingCleared => self.pending = None,
            StateDelta::TaskCompleted(fingerprint) => {
                self.completed.insert(fingerprint);
            }
        }
    }

    // Read-only accessors
    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    pub fn is_completed(&self, fingerprint: &Fingerprint) -> bool {
        self.completed.contains(fingerprint)
    }

    pub fn completed(&self) -> &HashSet<Fingerprint> {
        &self.completed
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::with_context(ConversationContext::default())
    }
}
