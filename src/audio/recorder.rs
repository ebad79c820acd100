use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::vad::{Frame, FrameSource};
use super::Microphone;
use crate::config::AudioConfig;

/// What the tracker wants done with the frame just pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentEvent {
    /// No speech yet; discard the frame.
    Waiting,
    /// Keep the frame.
    Recording,
    /// Keep the frame; the utterance is over.
    Finished,
}

/// Decides where an utterance starts and ends from per-frame VAD flags:
/// recording starts on the first voiced frame and stops after a run of
/// silence or at the length cap.
#[derive(Debug, Clone)]
pub struct SegmentTracker {
    silence_limit: usize,
    max_frames: usize,
    started: bool,
    silence_run: usize,
    frames: usize,
}

impl SegmentTracker {
    pub fn new(frame: Duration, silence: Duration, max_len: Duration) -> Self {
        let frame_ms = frame.as_millis().max(1);
        Self {
            silence_limit: (silence.as_millis() / frame_ms).max(1) as usize,
            max_frames: (max_len.as_millis() / frame_ms).max(1) as usize,
            started: false,
            silence_run: 0,
            frames: 0,
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(
            Duration::from_millis(config.frame_ms as u64),
            Duration::from_millis(config.silence_ms),
            Duration::from_millis(config.max_recording_ms),
        )
    }

    pub fn push(&mut self, voiced: bool) -> SegmentEvent {
        if !self.started {
            if !voiced {
                return SegmentEvent::Waiting;
            }
            self.started = true;
        }

        self.frames += 1;
        self.silence_run = if voiced { 0 } else { self.silence_run + 1 };

        if self.silence_run >= self.silence_limit || self.frames >= self.max_frames {
            SegmentEvent::Finished
        } else {
            SegmentEvent::Recording
        }
    }

    pub fn started(&self) -> bool {
        self.started
    }
}

/// Listens on the microphone until one utterance has been spoken and writes
/// it as a 16-bit mono WAV.
#[derive(Debug, Clone)]
pub struct UtteranceRecorder {
    config: AudioConfig,
}

impl UtteranceRecorder {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }

    /// Blocking. Returns `None` if `token` is cancelled before speech ends.
    pub fn record(&self, token: &CancellationToken) -> anyhow::Result<Option<PathBuf>> {
        let mut mic = Microphone::open(self.config.frame_ms, self.config.listen_vad_mode)?;
        let mut tracker = SegmentTracker::from_config(&self.config);
        let mut pcm: Vec<i16> = Vec::new();

        info!("Listening...");
        loop {
            if token.is_cancelled() {
                debug!("Recording cancelled");
                return Ok(None);
            }
            let voiced = match mic.next_frame() {
                Frame::Pending => {
                    std::thread::sleep(Duration::from_millis(10));
                    continue;
                }
                Frame::Closed => return Ok(None),
                frame => frame == Frame::Voiced,
            };

            let event = tracker.push(voiced);
            if event != SegmentEvent::Waiting {
                pcm.extend_from_slice(mic.samples());
            }
            if event == SegmentEvent::Finished {
                break;
            }
        }

        let rate = mic.sample_rate();
        drop(mic);
        info!("Captured {:.1}s of speech", pcm.len() as f32 / rate as f32);
        write_wav(&self.config.recording_path, &pcm, rate)?;
        Ok(Some(self.config.recording_path.clone()))
    }

    /// `record` on the blocking pool.
    pub async fn listen(&self, token: CancellationToken) -> anyhow::Result<Option<PathBuf>> {
        let recorder = self.clone();
        tokio::task::spawn_blocking(move || recorder.record(&token)).await?
    }
}

pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
