use serde::{Deserialize, Serialize};

use super::fuzzy::partial_ratio;

const YES_PHRASES: &[&str] = &[
    "yes", "yeah", "yep", "sure", "correct", "right", "absolutely", "affirmative", "please do",
    "go ahead",
];

const NO_PHRASES: &[&str] = &[
    "no", "nope", "negative", "wrong", "cancel", "never mind", "stop", "dont",
];

const CANCEL_PHRASES: &[&str] = &["cancel", "stop", "never mind", "abort", "forget it"];

const FILLER_PHRASES: &[&str] = &["yes", "yeah", "sure", "okay", "ok", "right"];

/// Fillers carry no content, so anything longer than this is substantive
/// even when it contains a filler word ("okay, tell her I'm late").
const FILLER_MAX_WORDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhraseClass {
    Affirmative,
    Negative,
    Cancel,
    Filler,
}

impl PhraseClass {
    /// Evaluation order used by `classify`.
    pub const ORDER: [PhraseClass; 4] = [
        PhraseClass::Affirmative,
        PhraseClass::Negative,
        PhraseClass::Cancel,
        PhraseClass::Filler,
    ];

    fn phrases(self) -> &'static [&'static str] {
        match self {
            PhraseClass::Affirmative => YES_PHRASES,
            PhraseClass::Negative => NO_PHRASES,
            PhraseClass::Cancel => CANCEL_PHRASES,
            PhraseClass::Filler => FILLER_PHRASES,
        }
    }

    fn threshold(self) -> f32 {
        match self {
            PhraseClass::Filler => 90.0,
            _ => 85.0,
        }
    }
}

/// Classifies short replies ("yes", "never mind", "okay") against fuzzy
/// phrase sets. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmationMatcher;

impl ConfirmationMatcher {
    pub fn new() -> Self {
        Self
    }

    /// First class, in `PhraseClass::ORDER`, whose phrase set matches.
    pub fn classify(&self, text: &str) -> Option<PhraseClass> {
        let cleaned = normalize(text);
        PhraseClass::ORDER
            .into_iter()
            .find(|class| matches_normalized(*class, &cleaned))
    }

    /// Tests a single class, ignoring the others.
    pub fn matches(&self, class: PhraseClass, text: &str) -> bool {
        matches_normalized(class, &normalize(text))
    }

    pub fn is_affirmative(&self, text: &str) -> bool {
        self.matches(PhraseClass::Affirmative, text)
    }

    pub fn is_cancel(&self, text: &str) -> bool {
        self.matches(PhraseClass::Cancel, text)
    }

    pub fn is_filler(&self, text: &str) -> bool {
        self.matches(PhraseClass::Filler, text)
    }
}

fn matches_normalized(class: PhraseClass, cleaned: &str) -> bool {
    if cleaned.is_empty() {
        return false;
    }
    if class == PhraseClass::Filler && cleaned.split_whitespace().count() > FILLER_MAX_WORDS {
        return false;
    }
    let threshold = class.threshold();
    class
        .phrases()
        .iter()
        .any(|phrase| partial_ratio(cleaned, phrase) >= threshold)
}

/// Lowercase, drop punctuation, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
