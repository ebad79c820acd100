use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::vad::{Frame, FrameSource};
use crate::config::AudioConfig;

const PENDING_SLEEP: Duration = Duration::from_millis(10);

/// Sliding window of voiced/unvoiced flags over the most recent frames.
#[derive(Debug, Clone)]
pub struct VoiceWindow {
    flags: VecDeque<bool>,
    size: usize,
    trigger: usize,
    voiced: usize,
}

impl VoiceWindow {
    pub fn new(size: usize, trigger: usize) -> Self {
        let size = size.max(1);
        Self {
            flags: VecDeque::with_capacity(size),
            size,
            trigger: trigger.clamp(1, size),
            voiced: 0,
        }
    }

    /// Records a frame. Returns true once the window holds `trigger` voiced
    /// frames.
    pub fn push(&mut self, voiced: bool) -> bool {
        if self.flags.len() == self.size {
            if let Some(true) = self.flags.pop_front() {
                self.voiced -= 1;
            }
        }
        self.flags.push_back(voiced);
        if voiced {
            self.voiced += 1;
        }
        self.voiced >= self.trigger
    }

    pub fn voiced(&self) -> usize {
        self.voiced
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Sustained speech was heard; the token was cancelled.
    SpeechDetected,
    /// The token was cancelled elsewhere (playback ended).
    Stopped,
    /// The frame source closed.
    SourceClosed,
}

/// Barge-in detector: watches frames while a reply plays and cancels the
/// shared token when the user starts talking over it.
#[derive(Debug, Clone, Copy)]
pub struct InterruptMonitor {
    window: usize,
    trigger: usize,
    warmup: Duration,
}

impl InterruptMonitor {
    pub fn new(window: usize, trigger: usize) -> Self {
        Self { window, trigger, warmup: Duration::ZERO }
    }

    /// Frames read within `warmup` of starting are discarded, so the onset
    /// of playback cannot trigger a stop.
    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.interrupt_window, config.interrupt_trigger)
            .with_warmup(Duration::from_millis(config.monitor_warmup_ms))
    }

    /// Blocking loop. Checks `token` before every frame and fires it at most
    /// once.
    pub fn run<S: FrameSource>(&self, source: &mut S, token: &CancellationToken) -> MonitorOutcome {
        let mut window = VoiceWindow::new(self.window, self.trigger);
        let started = Instant::now();
        loop {
            if token.is_cancelled() {
                return MonitorOutcome::Stopped;
            }
            match source.next_frame() {
                Frame::Pending => std::thread::sleep(PENDING_SLEEP),
                Frame::Closed => return MonitorOutcome::SourceClosed,
                _ if started.elapsed() < self.warmup => {}
                frame => {
                    let voiced = frame == Frame::Voiced;
                    if window.push(voiced) {
                        info!("Barge-in: {} voiced frames, stopping playback", window.voiced());
                        token.cancel();
                        return MonitorOutcome::SpeechDetected;
                    }
                    if voiced {
                        debug!("Voiced frame during playback ({} in window)", window.voiced());
                    }
                }
            }
        }
    }

    /// Runs the monitor on the blocking pool. `open` builds the frame source
    /// on that thread, so the source need not be `Send`.
    pub fn spawn<S, F>(&self, open: F, token: CancellationToken) -> JoinHandle<anyhow::Result<MonitorOutcome>>
    where
        S: FrameSource,
        F: FnOnce() -> anyhow::Result<S> + Send + 'static,
    {
        let monitor = *self;
        tokio::task::spawn_blocking(move || {
            let mut source = open()?;
            Ok(monitor.run(&mut source, &token))
        })
    }
}
