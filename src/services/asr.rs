use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::Transcriber;
use crate::config::SpeechConfig;
use crate::error::{AgentError, Result};
use crate::kernel::event::Utterance;

pub const DEEPGRAM_KEY_ENV: &str = "DEEPGRAM_API_KEY";

/// Deepgram pre-recorded transcription of a WAV clip.
#[derive(Clone)]
pub struct DeepgramTranscriber {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Deserialize)]
struct ListenResults {
    channels: Vec<ListenChannel>,
}

#[derive(Deserialize)]
struct ListenChannel {
    alternatives: Vec<ListenAlternative>,
}

#[derive(Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
}

impl DeepgramTranscriber {
    pub fn new(config: &SpeechConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.transcription_model.clone(),
        })
    }

    pub fn from_env(config: &SpeechConfig) -> Result<Self> {
        let key = std::env::var(DEEPGRAM_KEY_ENV)
            .map_err(|_| AgentError::Config(format!("{} is not set", DEEPGRAM_KEY_ENV)))?;
        Self::new(config, key)
    }
}

#[async_trait]
impl Transcriber for DeepgramTranscriber {
    async fn transcribe(&self, clip: &Path) -> Result<Utterance> {
        let audio = tokio::fs::read(clip).await?;

        let response = self
            .client
            .post(format!("{}/listen", self.base_url))
            .query(&[
                ("model", self.model.as_str()),
                ("punctuate", "true"),
                ("smart_format", "true"),
            ])
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(audio)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AgentError::Transcription(format!(
                "server returned {}",
                response.status()
            )));
        }

        let body: ListenResponse = response.json().await?;
        let text = body
            .results
            .channels
            .into_iter()
            .next()
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript.trim().to_string())
            .unwrap_or_default();
        info!("Transcript: '{}'", text);

        // Deepgram exposes neither log-probabilities nor a no-speech score.
        Ok(Utterance {
            text,
            avg_logprob: None,
            no_speech_prob: None,
        })
    }
}
