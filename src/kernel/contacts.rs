use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use super::fuzzy::{best_match, partial_ratio, token_sort_ratio};
use crate::error::{AgentError, Result};

/// Relationship words and possessives that never identify a contact.
const STOP_WORDS: &[&str] = &[
    "my", "the", "contact", "friend", "wife", "husband", "mom", "dad", "sister", "brother",
    "daughter", "son",
];

const NAME_THRESHOLD: f32 = 80.0;
const WORD_THRESHOLD: f32 = 85.0;

/// Outcome of a lookup. A fuzzy hit must be confirmed by the user before
/// anything is sent to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub address: Option<String>,
    pub needs_confirmation: bool,
}

impl Resolution {
    fn exact(address: impl Into<String>) -> Self {
        Self { address: Some(address.into()), needs_confirmation: false }
    }

    fn fuzzy(address: impl Into<String>) -> Self {
        Self { address: Some(address.into()), needs_confirmation: true }
    }

    fn missing() -> Self {
        Self { address: None, needs_confirmation: false }
    }
}

/// Read-only name -> address table. Keys are stored lower-cased.
#[derive(Debug, Clone, Default)]
pub struct ContactDirectory {
    entries: HashMap<String, String>,
    // Sorted keys keep fuzzy tie-breaks deterministic.
    keys: Vec<String>,
}

impl ContactDirectory {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let entries: HashMap<String, String> = entries
            .into_iter()
            .map(|(k, v)| (k.as_ref().trim().to_lowercase(), v.into()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Self { entries, keys }
    }

    /// Loads a JSON object of `"name": "address"` pairs. A missing file is an
    /// empty directory; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Contact file {} not found, starting with no contacts", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let table: HashMap<String, String> = serde_json::from_str(&raw)
            .map_err(|e| AgentError::Contacts(format!("{}: {}", path.display(), e)))?;
        let directory = Self::new(table);
        info!("Loaded {} contacts from {}", directory.len(), path.display());
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Maps a spoken name or address to an address. First rule that hits wins:
    /// literal address, exact name, token-sort match, partial match, then
    /// single words of the name.
    pub fn resolve(&self, name_or_address: &str) -> Resolution {
        let raw = name_or_address.trim();

        if raw.contains('@') && raw.contains('.') {
            return Resolution::exact(normalize_address(raw));
        }

        let spoken = normalize_address(raw);
        if looks_like_address(&spoken) {
            // Assembled from "at"/"dot" words; transcription may have garbled it.
            return Resolution::fuzzy(spoken);
        }

        let token = clean_token(raw);
        if token.is_empty() {
            return Resolution::missing();
        }

        if let Some(address) = self.get(&token) {
            return Resolution::exact(address);
        }

        for scorer in [token_sort_ratio as fn(&str, &str) -> f32, partial_ratio] {
            if let Some((key, score)) = best_match(&token, self.keys(), scorer) {
                if score >= NAME_THRESHOLD {
                    debug!("Fuzzy contact hit '{}' -> '{}' ({:.0})", token, key, score);
                    return self.fuzzy_hit(key);
                }
            }
        }

        for word in token.split_whitespace() {
            if let Some(address) = self.get(word) {
                return Resolution::fuzzy(address);
            }
            if let Some((key, score)) = best_match(word, self.keys(), partial_ratio) {
                if score >= WORD_THRESHOLD {
                    debug!("Contact word hit '{}' -> '{}' ({:.0})", word, key, score);
                    return self.fuzzy_hit(key);
                }
            }
        }

        Resolution::missing()
    }

    fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    fn fuzzy_hit(&self, key: &str) -> Resolution {
        match self.get(key) {
            Some(address) => Resolution::fuzzy(address),
            None => Resolution::missing(),
        }
    }
}

/// Turns "john at gmail dot com" into "john@gmail.com".
pub fn normalize_address(text: &str) -> String {
    let spaced = format!(" {} ", text.to_lowercase());
    spaced
        .replace(" at ", "@")
        .replace(" dot ", ".")
        .replace(" underscore ", "_")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn looks_like_address(candidate: &str) -> bool {
    let mut parts = candidate.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}

/// Lower-cased words with stop-words and punctuation removed.
pub fn clean_token(raw: &str) -> String {
    raw.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}
