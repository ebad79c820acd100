use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

/// Failures raised by the collaborators around the turn core.
///
/// None of these are fatal to a conversation: the orchestrator and the voice
/// loop turn them into a spoken message or a silent state transition.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("audio error: {0}")]
    Audio(String),

    #[error("VAD error: {0}")]
    Vad(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("language model error: {0}")]
    Model(String),

    #[error("speech synthesis error: {0}")]
    Synthesis(String),

    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("contact directory error: {0}")]
    Contacts(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
