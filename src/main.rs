use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use parley::audio::monitor::InterruptMonitor;
use parley::audio::playback::{play_interruptible, ProcessPlayer};
use parley::audio::recorder::UtteranceRecorder;
use parley::audio::Microphone;
use parley::config::AudioConfig;
use parley::kernel::contacts::ContactDirectory;
use parley::kernel::event::Utterance;
use parley::services::asr::DeepgramTranscriber;
use parley::services::llm::ChatCompletionModel;
use parley::services::mail::{DryRunDispatcher, SmtpDispatcher};
use parley::services::tts::DeepgramSynthesizer;
use parley::services::{LanguageModel, MessageDispatcher, SpeechSynthesizer, Transcriber};
use parley::{AgentConfig, ConversationState, TurnOrchestrator};

/// Speaker side of the voice loop: synthesis plus barge-in aware playback.
struct Voice {
    synthesizer: DeepgramSynthesizer,
    player: ProcessPlayer,
    monitor: InterruptMonitor,
    audio: AudioConfig,
}

impl Voice {
    async fn say(&self, text: &str) {
        println!("assistant> {}", text);
        let path = match self.synthesizer.synthesize(text, None).await {
            Ok(Some(path)) => path,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Speech synthesis failed: {}", e);
                return;
            }
        };

        let frame_ms = self.audio.frame_ms;
        let mode = self.audio.interrupt_vad_mode;
        if let Err(e) = play_interruptible(
            &self.player,
            &path,
            &self.monitor,
            move || Microphone::open(frame_ms, mode),
        )
        .await
        {
            tracing::warn!("Playback failed: {}", e);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Parley booting...");

    let config = AgentConfig::load_default()?;
    let contacts = Arc::new(ContactDirectory::load(&config.dialogue.contacts_path)?);

    let model: Arc<dyn LanguageModel> = Arc::new(ChatCompletionModel::from_env(&config.model)?);
    let dispatcher: Arc<dyn MessageDispatcher> = if config.mail.dry_run {
        tracing::info!("Mail dry-run enabled; nothing will be sent");
        Arc::new(DryRunDispatcher)
    } else {
        Arc::new(SmtpDispatcher::from_env()?)
    };
    let transcriber = DeepgramTranscriber::from_env(&config.speech)?;

    let voice = Voice {
        synthesizer: DeepgramSynthesizer::from_env(&config.speech)?,
        player: ProcessPlayer::from_config(&config.audio),
        monitor: InterruptMonitor::from_config(&config.audio),
        audio: config.audio.clone(),
    };
    let recorder = UtteranceRecorder::new(config.audio.clone());
    let orchestrator = TurnOrchestrator::new(model, dispatcher, contacts, &config);
    let mut state = ConversationState::new(&config.dialogue);

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, shutting down");
            ctrl_c.cancel();
        }
    });

    tracing::info!("Conversation {} active. Press Ctrl+C to stop.", state.id);
    voice.say(&config.dialogue.greeting).await;

    while !shutdown.is_cancelled() {
        let clip = match recorder.listen(shutdown.child_token()).await {
            Ok(Some(clip)) => clip,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Listening failed: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        let utterance = match transcriber.transcribe(&clip).await {
            Ok(utterance) => utterance,
            Err(e) => {
                tracing::warn!("Transcription failed: {}", e);
                Utterance::default()
            }
        };
        println!("user> {}", utterance.text);

        let reply = orchestrator.handle_turn(&mut state, &utterance).await;
        voice.say(&reply).await;
    }

    tracing::info!("Goodbye.");
    Ok(())
}
