use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use super::asr::DEEPGRAM_KEY_ENV;
use super::SpeechSynthesizer;
use crate::config::SpeechConfig;
use crate::error::{AgentError, Result};

/// Deepgram speak API. Each reply overwrites the same output file.
#[derive(Clone)]
pub struct DeepgramSynthesizer {
    client: Client,
    base_url: String,
    api_key: String,
    default_voice: String,
    output_path: PathBuf,
}

impl DeepgramSynthesizer {
    pub fn new(config: &SpeechConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_voice: config.voice.clone(),
            output_path: config.output_path.clone(),
        })
    }

    pub fn from_env(config: &SpeechConfig) -> Result<Self> {
        let key = std::env::var(DEEPGRAM_KEY_ENV)
            .map_err(|_| AgentError::Config(format!("{} is not set", DEEPGRAM_KEY_ENV)))?;
        Self::new(config, key)
    }
}

#[async_trait]
impl SpeechSynthesizer for DeepgramSynthesizer {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Option<PathBuf>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let voice = voice.unwrap_or(&self.default_voice);

        let response = self
            .client
            .post(format!("{}/speak", self.base_url))
            .query(&[("model", voice)])
            .header("Authorization", format!("Token {}", self.api_key))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AgentError::Synthesis(format!(
                "server returned {}",
                response.status()
            )));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Ok(None);
        }
        tokio::fs::write(&self.output_path, &audio).await?;
        info!("Synthesized {} bytes with {} to {}", audio.len(), voice, self.output_path.display());
        Ok(Some(self.output_path.clone()))
    }
}
