use serde_json::{Map, Value};
use tracing::debug;

use super::event::{Utterance, UNKNOWN_INTENT};
use super::task::Slots;
use crate::config::DialogueConfig;

/// Phrases showing the model itself did not follow the user.
const UNCLEAR_PHRASES: &[&str] = &[
    "i'm not sure",
    "can you repeat",
    "i didn't understand",
    "could you clarify",
    "i don't understand",
    "what do you mean",
    "can you rephrase",
];

/// A task the model wants to start or continue. `kind` is kept raw so
/// unsupported kinds can be reported back to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedAction {
    pub kind: String,
    pub slots: Slots,
}

/// Model output, parsed defensively at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// Plain text, or JSON that could not be read.
    Unstructured(String),
    Structured {
        response: String,
        intent: String,
        action: Option<ProposedAction>,
    },
}

impl ModelReply {
    /// Never fails: anything that is not a JSON object (bare or embedded in
    /// surrounding prose / code fences) becomes `Unstructured`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let object = parse_object(trimmed).or_else(|| {
            let start = trimmed.find('{')?;
            let end = trimmed.rfind('}')?;
            (start < end).then(|| parse_object(&trimmed[start..=end])).flatten()
        });

        match object {
            Some(obj) => {
                let response = match obj.get("response") {
                    Some(Value::String(s)) => s.trim().to_string(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                let intent = obj
                    .get("intent")
                    .and_then(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| UNKNOWN_INTENT.to_string());
                let action = obj.get("action").and_then(parse_action);
                ModelReply::Structured { response, intent, action }
            }
            None => {
                debug!("Model output is not structured, treating as plain speech");
                ModelReply::Unstructured(trimmed.to_string())
            }
        }
    }

    pub fn intent(&self) -> &str {
        match self {
            ModelReply::Unstructured(_) => UNKNOWN_INTENT,
            ModelReply::Structured { intent, .. } => intent,
        }
    }

    /// Text suitable for speech.
    pub fn spoken(&self) -> String {
        match self {
            ModelReply::Unstructured(text) => sanitize_for_speech(text),
            ModelReply::Structured { response, .. } => response.clone(),
        }
    }

    /// (spoken text, intent, proposed action)
    pub fn into_parts(self) -> (String, String, Option<ProposedAction>) {
        let spoken = self.spoken();
        match self {
            ModelReply::Unstructured(_) => (spoken, UNKNOWN_INTENT.to_string(), None),
            ModelReply::Structured { intent, action, .. } => (spoken, intent, action),
        }
    }
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn parse_action(value: &Value) -> Option<ProposedAction> {
    let obj = value.as_object()?;
    let kind = obj.get("type").and_then(Value::as_str)?.trim();
    if kind.is_empty() {
        return None;
    }
    let slots = obj
        .get("parameters")
        .and_then(Value::as_object)
        .map(Slots::from_json)
        .unwrap_or_default();
    Some(ProposedAction { kind: kind.to_string(), slots })
}

/// Keeps letters, digits, whitespace and `. , ? ! '`; collapses whitespace.
pub fn sanitize_for_speech(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '_' | '.' | ',' | '?' | '!' | '\''))
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Poor transcription or a confused model; ask the user to clarify rather
/// than claim we missed it.
pub fn needs_clarification(model_text: &str, utterance: &Utterance, config: &DialogueConfig) -> bool {
    if utterance.no_speech_prob.is_some_and(|p| p > config.max_no_speech_prob) {
        return true;
    }
    if utterance.avg_logprob.is_some_and(|p| p < config.min_avg_logprob) {
        return true;
    }
    let lowered = model_text.to_lowercase().replace('\u{2019}', "'");
    UNCLEAR_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}
