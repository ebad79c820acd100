use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

use super::confirm::{ConfirmationMatcher, PhraseClass};
use super::contacts::{clean_token, normalize_address, ContactDirectory};
use super::event::{Turn, Utterance, GENERAL_CHAT};
use super::prompt::PromptBuilder;
use super::reply::{needs_clarification, ModelReply, ProposedAction};
use super::state::{ConversationState, StateDelta};
use super::task::{
    Fingerprint, PendingAction, Slots, TaskKind, TaskMachine, TaskOutcome, TaskStep, TaskTrigger,
    SLOT_TO,
};
use crate::config::{AgentConfig, DialogueConfig, MailConfig};
use crate::services::{LanguageModel, MessageDispatcher};

/// Requests for media are chat, whatever the model proposes.
pub const MEDIA_KEYWORDS: &[&str] = &[
    "music", "song", "playlist", "listen", "podcast", "spotify", "tune", "radio",
];

pub const CLARIFY_REPLY: &str = "Could you please clarify?";
pub const MISSED_REPLY: &str = "Sorry, I didn't catch that.";
pub const MODEL_FAILURE_REPLY: &str = "Sorry, I'm having trouble answering right now. Please try again.";

/// Per-turn driver: utterance in, reply text out.
///
/// Short confirmation and body-capture replies are settled locally against
/// the pending task; everything else goes through the language model and is
/// then reconciled with the task state.
pub struct TurnOrchestrator {
    model: Arc<dyn LanguageModel>,
    dispatcher: Arc<dyn MessageDispatcher>,
    contacts: Arc<ContactDirectory>,
    matcher: ConfirmationMatcher,
    prompts: PromptBuilder,
    dialogue: DialogueConfig,
    mail: MailConfig,
}

impl TurnOrchestrator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        dispatcher: Arc<dyn MessageDispatcher>,
        contacts: Arc<ContactDirectory>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            model,
            dispatcher,
            contacts,
            matcher: ConfirmationMatcher::new(),
            prompts: PromptBuilder::new(),
            dialogue: config.dialogue.clone(),
            mail: config.mail.clone(),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn contacts(&self) -> &ContactDirectory {
        &self.contacts
    }

    /// Runs one turn against `state`. Never fails: every problem becomes a
    /// spoken reply.
    pub async fn handle_turn(&self, state: &mut ConversationState, utterance: &Utterance) -> String {
        let span = info_span!("turn", conversation = %state.id);
        self.run_turn(state, utterance).instrument(span).await
    }

    async fn run_turn(&self, state: &mut ConversationState, utterance: &Utterance) -> String {
        let text = utterance.text.trim();
        if text.is_empty() {
            debug!("Empty transcript, skipping the model");
            return self.fallback("", utterance);
        }

        // 1. QUICK PATHS (no model call)
        if let Some(reply) = self.quick_path(state, text).await {
            return reply;
        }

        // 2. MODEL
        let skip_last = state.pending().is_some_and(|p| p.step.is_awaiting());
        let context = state.context().snippet(skip_last);
        let prompt = self.prompts.build(text, &context);

        let raw = match self.model.complete(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Model call failed: {}", e);
                return MODEL_FAILURE_REPLY.to_string();
            }
        };
        let (spoken, mut intent, mut proposal) = ModelReply::parse(&raw).into_parts();

        // A task intent without an action still starts the task.
        if proposal.is_none() && TaskKind::parse(&intent).is_some() {
            proposal = Some(ProposedAction {
                kind: intent.clone(),
                slots: [(SLOT_TO, text)].into_iter().collect::<Slots>(),
            });
        }

        // 3. PRECEDENCE RULES
        if proposal.is_some() && mentions_media(text) {
            info!("Media request, dropping proposed action");
            proposal = None;
            intent = GENERAL_CHAT.to_string();
        }

        let mut candidate = proposal.map(|p| self.reconcile(state, p));
        if let Some(Ok(action)) = &candidate {
            if let Some(fingerprint) = self.fingerprint_of(action) {
                if state.is_completed(&fingerprint) {
                    info!("Task {} already completed, treating as chat", fingerprint);
                    candidate = None;
                    intent = GENERAL_CHAT.to_string();
                }
            }
        }

        // 4. REDUCE
        match &candidate {
            Some(Ok(action)) => state.reduce(StateDelta::PendingSet(action.clone())),
            _ => state.reduce(StateDelta::PendingCleared),
        }
        state.reduce(StateDelta::TurnRecorded(Turn {
            user: text.to_string(),
            assistant: spoken.clone(),
            confidence: utterance.avg_logprob,
            intent,
        }));

        // 5. DECIDE WHAT TO SAY
        let reply = match candidate {
            Some(Ok(action)) if action.is_actionable() => {
                let outcome = self.machine().transition(action, TaskTrigger::Proposed).await;
                self.apply(state, outcome, false)
            }
            Some(Err(kind)) => format!("I'm not set up for the action \"{}\".", kind),
            _ => spoken,
        };

        if reply.trim().is_empty() {
            return self.fallback(&raw, utterance);
        }
        reply
    }

    /// Settles the turn locally when a task is waiting on a short answer.
    /// Returns `None` when the model has to decide.
    async fn quick_path(&self, state: &mut ConversationState, text: &str) -> Option<String> {
        let action = state.pending()?.clone();

        let trigger = match action.step {
            TaskStep::None => return None,
            // Only an explicit yes confirms; fillers like "okay" reject.
            TaskStep::AwaitingRecipientConfirm => match self.matcher.classify(text) {
                Some(PhraseClass::Affirmative) => TaskTrigger::Confirmation(true),
                Some(PhraseClass::Negative | PhraseClass::Cancel | PhraseClass::Filler) => {
                    TaskTrigger::Confirmation(false)
                }
                None => return None,
            },
            TaskStep::AwaitingBody => {
                if self.matcher.is_cancel(text) {
                    TaskTrigger::Cancel
                } else if action.retry
                    && (self.matcher.is_affirmative(text) || self.matcher.is_filler(text))
                {
                    TaskTrigger::Retry
                } else if self.matcher.is_filler(text) {
                    TaskTrigger::Filler
                } else {
                    TaskTrigger::Body(text.to_string())
                }
            }
        };

        debug!("Quick path at {:?}: {:?}", action.step, trigger);
        let outcome = self.machine().transition(action, trigger).await;
        Some(self.apply(state, outcome, true))
    }

    /// Merges a same-kind proposal into the pending task (newer slots win),
    /// otherwise starts a fresh task. Unsupported kinds come back as `Err`.
    fn reconcile(
        &self,
        state: &ConversationState,
        proposal: ProposedAction,
    ) -> Result<PendingAction, String> {
        let Some(kind) = TaskKind::parse(&proposal.kind) else {
            return Err(proposal.kind);
        };
        match state.pending() {
            Some(current) if current.kind == kind => {
                let mut merged = current.clone();
                merged.absorb(proposal.slots);
                Ok(merged)
            }
            _ => Ok(PendingAction::new(kind, proposal.slots)),
        }
    }

    /// Fingerprint of the task this action would perform. Names are resolved
    /// first so "marta" and "marta@x.com" compare equal.
    fn fingerprint_of(&self, action: &PendingAction) -> Option<Fingerprint> {
        let target = action.recipient()?;
        let normalized = match self.contacts.resolve(target).address {
            Some(address) => normalize_address(&address),
            None => clean_token(target),
        };
        Some(Fingerprint::new(action.kind, &normalized))
    }

    fn apply(&self, state: &mut ConversationState, outcome: TaskOutcome, body_capture: bool) -> String {
        match outcome {
            TaskOutcome::Prompt { reply, action } | TaskOutcome::Failed { reply, action } => {
                state.reduce(StateDelta::PendingSet(action));
                reply
            }
            TaskOutcome::Dispatched { reply, fingerprint } => {
                state.reduce(StateDelta::PendingCleared);
                state.reduce(StateDelta::TaskCompleted(fingerprint));
                if body_capture {
                    // The turn that opened the task is superseded by this confirmation.
                    state.reduce(StateDelta::LastTurnPopped);
                }
                reply
            }
            TaskOutcome::Abandoned { reply } => {
                state.reduce(StateDelta::PendingCleared);
                reply
            }
        }
    }

    fn machine(&self) -> TaskMachine<'_> {
        TaskMachine::new(&self.contacts, self.dispatcher.as_ref(), &self.mail)
    }

    fn fallback(&self, model_text: &str, utterance: &Utterance) -> String {
        if needs_clarification(model_text, utterance, &self.dialogue) {
            CLARIFY_REPLY.to_string()
        } else {
            MISSED_REPLY.to_string()
        }
    }
}

pub fn mentions_media(text: &str) -> bool {
    let lowered = text.to_lowercase();
    MEDIA_KEYWORDS.iter().any(|k| lowered.contains(k))
}
