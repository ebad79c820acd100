use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;

/// Environment variable naming the TOML config file.
pub const CONFIG_ENV: &str = "PARLEY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "parley.toml";

/// Top-level configuration. Every section falls back to its defaults, so an
/// empty or missing file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub model: ModelConfig,
    pub speech: SpeechConfig,
    pub mail: MailConfig,
    pub audio: AudioConfig,
    pub dialogue: DialogueConfig,
}

impl AgentConfig {
    /// Loads from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                let config: AgentConfig = toml::from_str(&raw)?;
                info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolves the path from `PARLEY_CONFIG`, falling back to `parley.toml`.
    pub fn load_default() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load(&path)
    }
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL without the `/chat/completions` suffix.
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 256,
            timeout_secs: 10,
        }
    }
}

/// Deepgram transcription and synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub base_url: String,
    pub transcription_model: String,
    /// Voice model used by the speak endpoint.
    pub voice: String,
    /// Where synthesized replies are written before playback.
    pub output_path: PathBuf,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepgram.com/v1".to_string(),
            transcription_model: "nova".to_string(),
            voice: "aura-2-thalia-en".to_string(),
            output_path: std::env::temp_dir().join("parley_reply.mp3"),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Log messages instead of sending them.
    pub dry_run: bool,
    pub default_subject: String,
    /// Appended to every body when set.
    pub signature: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            default_subject: "Voice assistant message".to_string(),
            signature: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// webrtc-vad aggressiveness (0-3) while recording an utterance.
    pub listen_vad_mode: u8,
    /// webrtc-vad aggressiveness (0-3) while watching for barge-in.
    pub interrupt_vad_mode: u8,
    /// 10, 20 or 30.
    pub frame_ms: u32,
    pub silence_ms: u64,
    pub max_recording_ms: u64,
    pub recording_path: PathBuf,
    /// Sliding window of VAD frames watched during playback.
    pub interrupt_window: usize,
    /// Voiced frames within the window that cancel playback.
    pub interrupt_trigger: usize,
    /// Delay between starting the monitor and starting playback.
    pub monitor_warmup_ms: u64,
    /// External player invoked as `player_program [player_args..] <file>`.
    pub player_program: String,
    pub player_args: Vec<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            listen_vad_mode: 1,
            interrupt_vad_mode: 3,
            frame_ms: 30,
            silence_ms: 1500,
            max_recording_ms: 20_000,
            recording_path: std::env::temp_dir().join("parley_input.wav"),
            interrupt_window: 10,
            interrupt_trigger: 3,
            monitor_warmup_ms: 50,
            player_program: default_player().to_string(),
            player_args: default_player_args(),
        }
    }
}

fn default_player() -> &'static str {
    if cfg!(target_os = "macos") {
        "afplay"
    } else {
        "ffplay"
    }
}

fn default_player_args() -> Vec<String> {
    if cfg!(target_os = "macos") {
        Vec::new()
    } else {
        ["-nodisp", "-autoexit", "-loglevel", "quiet"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    pub contacts_path: PathBuf,
    /// Turns rendered into the model context.
    pub context_window: usize,
    /// Turns retained in memory; older turns are dropped.
    pub history_capacity: usize,
    pub greeting: String,
    /// Below this average log-probability the transcript is considered poor.
    pub min_avg_logprob: f32,
    /// Above this no-speech probability the transcript is considered poor.
    pub max_no_speech_prob: f32,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            contacts_path: PathBuf::from("contacts.json"),
            context_window: 3,
            history_capacity: 64,
            greeting: "Hi! How can I help you today?".to_string(),
            min_avg_logprob: -1.2,
            max_no_speech_prob: 0.7,
        }
    }
}
