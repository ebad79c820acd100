use serde::{Deserialize, Serialize};

/// One transcribed user utterance with the recognizer's confidence signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub avg_logprob: Option<f32>,
    pub no_speech_prob: Option<f32>,
}

impl Utterance {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }
}

/// Intent tag for turns that are plain conversation.
pub const GENERAL_CHAT: &str = "general_chat";
/// Intent tag when the model's output could not be parsed.
pub const UNKNOWN_INTENT: &str = "unknown";

/// A user utterance and the assistant's reply. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
    pub confidence: Option<f32>,
    pub intent: String,
}
