use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::monitor::InterruptMonitor;
use super::vad::FrameSource;
use crate::config::AudioConfig;
use crate::error::{AgentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Interrupted,
}

/// Plays one audio file, returning early when `stop` is cancelled.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, path: &Path, stop: CancellationToken) -> Result<PlaybackOutcome>;
}

/// Plays through an external program (`afplay`, `ffplay`, ...).
#[derive(Debug, Clone)]
pub struct ProcessPlayer {
    program: String,
    args: Vec<String>,
}

impl ProcessPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.player_program.clone(), config.player_args.clone())
    }
}

#[async_trait]
impl AudioSink for ProcessPlayer {
    async fn play(&self, path: &Path, stop: CancellationToken) -> Result<PlaybackOutcome> {
        if stop.is_cancelled() {
            return Ok(PlaybackOutcome::Interrupted);
        }
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::Audio(format!("failed to spawn '{}': {}", self.program, e)))?;

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if !status.success() {
                    warn!("{} exited with {}", self.program, status);
                }
                Ok(PlaybackOutcome::Completed)
            }
            _ = stop.cancelled() => {
                if let Err(e) = child.kill().await {
                    debug!("Player already gone: {}", e);
                }
                Ok(PlaybackOutcome::Interrupted)
            }
        }
    }
}

/// Plays `path` while the monitor listens for barge-in. Playback starts at
/// once; the monitor applies its own warmup. Both sides share one token: the
/// monitor cancels it on speech, and it is cancelled here after natural
/// completion so the monitor stops.
pub async fn play_interruptible<S, F>(
    sink: &dyn AudioSink,
    path: &Path,
    monitor: &InterruptMonitor,
    open_source: F,
) -> Result<PlaybackOutcome>
where
    S: FrameSource,
    F: FnOnce() -> anyhow::Result<S> + Send + 'static,
{
    let token = CancellationToken::new();
    let watcher = monitor.spawn(open_source, token.clone());
    let outcome = sink.play(path, token.clone()).await;
    token.cancel();

    match watcher.await {
        Ok(Ok(result)) => debug!("Monitor finished: {:?}", result),
        Ok(Err(e)) => warn!("Interrupt monitor unavailable: {}", e),
        Err(e) => warn!("Interrupt monitor task failed: {}", e),
    }

    let outcome = outcome?;
    if outcome == PlaybackOutcome::Interrupted {
        info!("Playback interrupted by user speech");
    }
    Ok(outcome)
}
