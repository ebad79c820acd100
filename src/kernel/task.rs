use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

use super::contacts::{normalize_address, ContactDirectory};
use crate::config::MailConfig;
use crate::error::AgentError;
use crate::services::{MessageDispatcher, OutgoingMessage};

pub const SLOT_TO: &str = "to";
pub const SLOT_BODY: &str = "body";
pub const SLOT_SUBJECT: &str = "subject";

/// Parameter names the model may use for the recipient.
const RECIPIENT_ALIASES: &[&str] = &["recipient"];
/// Control keys that belong to the machine, never to the model.
const RESERVED_KEYS: &[&str] = &["step", "confirm"];

const CANCELLED: &str = "Okay, I've cancelled the e-mail.";
const ASK_CORRECT_ADDRESS: &str = "Okay, please tell me the correct e-mail address.";
const NOT_FOUND: &str = "I couldn't find that contact. Please say or spell the address.";
const ASK_RECIPIENT: &str = "Who would you like to send the e-mail to?";
const ASK_BODY_AGAIN: &str = "Please tell me the message you want to send.";
const MISSING_INFO: &str = "I'm missing some information to send that e-mail.";

/// Side-effecting tasks the assistant can carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    SendEmail,
}

impl TaskKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "send_email" | "send-email" | "email" => Some(TaskKind::SendEmail),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::SendEmail => "send_email",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a pending task is waiting for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskStep {
    #[default]
    None,
    AwaitingRecipientConfirm,
    AwaitingBody,
}

impl TaskStep {
    pub fn is_awaiting(self) -> bool {
        !matches!(self, TaskStep::None)
    }
}

/// Slot name -> value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slots(BTreeMap<String, String>);

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lenient conversion from model JSON: aliases fold into `to`, reserved
    /// control keys and nulls are dropped, scalars are stringified.
    pub fn from_json(params: &Map<String, Value>) -> Self {
        let mut slots = Slots::new();
        for (key, value) in params {
            let key = key.trim().to_lowercase();
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let text = match value {
                Value::Null => continue,
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            if text.is_empty() {
                continue;
            }
            let key = if RECIPIENT_ALIASES.contains(&key.as_str()) {
                if params.contains_key(SLOT_TO) {
                    continue;
                }
                SLOT_TO.to_string()
            } else {
                key
            };
            slots.0.insert(key, text);
        }
        slots
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge with precedence: values in `newer` replace ours, keys only we
    /// have survive.
    pub fn merge_over(&mut self, newer: Slots) {
        self.0.extend(newer.0);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Slots {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Slots(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// The single in-flight task of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub kind: TaskKind,
    pub slots: Slots,
    pub step: TaskStep,
    /// Set only after a failed dispatch: a go-ahead resends the stored body.
    #[serde(default)]
    pub retry: bool,
}

impl PendingAction {
    pub fn new(kind: TaskKind, slots: Slots) -> Self {
        Self { kind, slots, step: TaskStep::None, retry: false }
    }

    pub fn with_step(mut self, step: TaskStep) -> Self {
        self.step = step;
        self
    }

    pub fn recipient(&self) -> Option<&str> {
        self.slots.get(SLOT_TO)
    }

    pub fn body(&self) -> Option<&str> {
        self.slots.get(SLOT_BODY)
    }

    /// Folds a re-proposal of the same task into this one. Slots merge with
    /// the newer values winning; progress (the step) is kept.
    pub fn absorb(&mut self, newer: Slots) {
        self.slots.merge_over(newer);
    }

    /// Enough information to act on this turn.
    pub fn is_actionable(&self) -> bool {
        self.step.is_awaiting() || self.body().is_some() || self.recipient().is_some()
    }
}

/// Identifies a task instance that already completed: kind plus normalized
/// target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(kind: TaskKind, target: &str) -> Self {
        Fingerprint(format!("{}::{}", kind.as_str(), target.trim().to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What happened on the user's side of the task this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskTrigger {
    /// The model proposed (or re-proposed) the task.
    Proposed,
    /// Yes/no answer to "did you mean X?".
    Confirmation(bool),
    /// Substantive utterance captured as the message body.
    Body(String),
    /// Filler without content.
    Filler,
    /// Go-ahead to resend a body that failed to send. Ignored unless the
    /// action is marked for retry.
    Retry,
    Cancel,
}

/// Result of one transition. The orchestrator applies it to the
/// conversation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Still slot-filling; `action` becomes the pending action.
    Prompt { reply: String, action: PendingAction },
    /// Sent. Pending is cleared and the fingerprint recorded.
    Dispatched { reply: String, fingerprint: Fingerprint },
    /// Sending failed; `action` stays pending so the user can retry.
    Failed { reply: String, action: PendingAction },
    /// Task dropped (cancelled, unknown contact, rejected recipient).
    Abandoned { reply: String },
}

impl TaskOutcome {
    pub fn reply(&self) -> &str {
        match self {
            TaskOutcome::Prompt { reply, .. }
            | TaskOutcome::Dispatched { reply, .. }
            | TaskOutcome::Failed { reply, .. }
            | TaskOutcome::Abandoned { reply } => reply,
        }
    }

    fn prompt(reply: impl Into<String>, action: PendingAction) -> Self {
        TaskOutcome::Prompt { reply: reply.into(), action }
    }

    fn abandoned(reply: impl Into<String>) -> Self {
        TaskOutcome::Abandoned { reply: reply.into() }
    }
}

/// Slot-filling state machine for the send-e-mail task.
///
/// `NONE -> AWAITING_RECIPIENT_CONFIRM -> AWAITING_BODY -> DISPATCHED`, with
/// cancellation allowed from every step. Fuzzy recipient matches always pass
/// through confirmation.
pub struct TaskMachine<'a> {
    contacts: &'a ContactDirectory,
    dispatcher: &'a dyn MessageDispatcher,
    mail: &'a MailConfig,
}

impl<'a> TaskMachine<'a> {
    pub fn new(
        contacts: &'a ContactDirectory,
        dispatcher: &'a dyn MessageDispatcher,
        mail: &'a MailConfig,
    ) -> Self {
        Self { contacts, dispatcher, mail }
    }

    pub async fn transition(&self, mut action: PendingAction, trigger: TaskTrigger) -> TaskOutcome {
        match (action.step, trigger) {
            (_, TaskTrigger::Cancel) => TaskOutcome::abandoned(CANCELLED),

            (TaskStep::None, TaskTrigger::Proposed) => self.start(action).await,

            (TaskStep::AwaitingRecipientConfirm, TaskTrigger::Confirmation(true)) => {
                self.ask_body(action)
            }
            (TaskStep::AwaitingRecipientConfirm, TaskTrigger::Confirmation(false)) => {
                TaskOutcome::abandoned(ASK_CORRECT_ADDRESS)
            }
            (TaskStep::AwaitingRecipientConfirm, TaskTrigger::Proposed) => {
                match action.recipient().filter(|to| to.contains('@')) {
                    Some(to) => {
                        let reply = format!("Did you mean {}?", to);
                        TaskOutcome::prompt(reply, action)
                    }
                    // Replaced by a new name; resolve from scratch.
                    None => self.start(action.with_step(TaskStep::None)).await,
                }
            }

            (TaskStep::AwaitingBody, TaskTrigger::Filler) => TaskOutcome::prompt(ASK_BODY_AGAIN, action),
            (TaskStep::AwaitingBody, TaskTrigger::Body(text)) => {
                action.slots.set(SLOT_BODY, text);
                action.retry = false;
                self.dispatch(action).await
            }
            (TaskStep::AwaitingBody, TaskTrigger::Retry) => {
                if action.retry && action.body().is_some() {
                    self.dispatch(action).await
                } else {
                    TaskOutcome::prompt(ASK_BODY_AGAIN, action)
                }
            }
            (TaskStep::AwaitingBody, TaskTrigger::Proposed) => {
                let resolved = action.recipient().is_some_and(|to| to.contains('@'));
                if !resolved {
                    // The recipient changed to a name; resolve it again.
                    self.start(action.with_step(TaskStep::None)).await
                } else if action.body().is_some() {
                    self.dispatch(action).await
                } else {
                    self.ask_body(action)
                }
            }

            (step, trigger) => {
                debug!("No transition for {:?} on {:?}", step, trigger);
                TaskOutcome::abandoned(MISSING_INFO)
            }
        }
    }

    async fn start(&self, mut action: PendingAction) -> TaskOutcome {
        let Some(name) = action.recipient() else {
            return TaskOutcome::prompt(ASK_RECIPIENT, action);
        };

        let resolution = self.contacts.resolve(name);
        let Some(address) = resolution.address else {
            info!("No contact matches '{}'", name);
            return TaskOutcome::abandoned(NOT_FOUND);
        };

        action.slots.set(SLOT_TO, address.clone());
        if resolution.needs_confirmation {
            let reply = format!("Did you mean {}?", address);
            return TaskOutcome::prompt(reply, action.with_step(TaskStep::AwaitingRecipientConfirm));
        }
        if action.body().is_some() {
            return self.dispatch(action).await;
        }
        self.ask_body(action)
    }

    fn ask_body(&self, action: PendingAction) -> TaskOutcome {
        match action.recipient() {
            Some(to) => {
                let reply = format!("What message should I send to {}?", to);
                TaskOutcome::prompt(reply, action.with_step(TaskStep::AwaitingBody))
            }
            None => TaskOutcome::prompt(ASK_RECIPIENT, action.with_step(TaskStep::None)),
        }
    }

    async fn dispatch(&self, action: PendingAction) -> TaskOutcome {
        let (to, body) = match (action.recipient(), action.body()) {
            (Some(to), Some(body)) => (normalize_address(to), body.to_string()),
            _ => return self.ask_body(action),
        };

        let message = OutgoingMessage {
            to: to.clone(),
            subject: action
                .slots
                .get(SLOT_SUBJECT)
                .unwrap_or(&self.mail.default_subject)
                .to_string(),
            body: compose_body(&body, self.mail.signature.as_deref()),
        };

        match self.dispatcher.dispatch(&message).await {
            Ok(()) => {
                info!("Sent {} to {}", action.kind, to);
                TaskOutcome::Dispatched {
                    reply: format!("I've sent your message to {}.", to),
                    fingerprint: Fingerprint::new(action.kind, &to),
                }
            }
            Err(e) => {
                warn!("Dispatch to {} failed: {}", to, e);
                let reason = match e {
                    AgentError::Dispatch(reason) => reason,
                    other => other.to_string(),
                };
                TaskOutcome::Failed {
                    reply: format!(
                        "Sorry, I couldn't send the e-mail. {} Say yes to try again, or cancel.",
                        reason
                    ),
                    action: PendingAction {
                        step: TaskStep::AwaitingBody,
                        retry: true,
                        ..action
                    },
                }
            }
        }
    }
}

fn compose_body(body: &str, signature: Option<&str>) -> String {
    match signature {
        Some(sig) if !sig.trim().is_empty() => format!("{}\n\n{}", body, sig),
        _ => body.to_string(),
    }
}
