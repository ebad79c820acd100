//! Contracts for the collaborators around the turn core, plus the HTTP and
//! SMTP adapters used by the binaries.

pub mod asr;
pub mod llm;
pub mod mail;
pub mod tts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::kernel::event::Utterance;

/// Audio clip (already VAD-trimmed) -> text with confidence signals.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, clip: &Path) -> Result<Utterance>;
}

/// Prompt -> raw completion text. JSON-shaped or not; the caller parses.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Text -> rendered audio file. `Ok(None)` means there is nothing to play.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Option<PathBuf>>;
}

/// Delivers a composed message. Not assumed idempotent; the orchestrator
/// guards against repeats.
#[async_trait]
pub trait MessageDispatcher: Send + Sync {
    async fn dispatch(&self, message: &OutgoingMessage) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}
