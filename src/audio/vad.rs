use ringbuf::traits::{Consumer, Observer};
use tracing::debug;
use webrtc_vad::{SampleRate, Vad, VadMode};

use crate::error::AgentError;

/// Classification of one fixed-length audio frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Voiced,
    Unvoiced,
    /// Not enough samples buffered yet.
    Pending,
    /// The source will produce nothing more.
    Closed,
}

/// Anything that yields classified frames. Implementations may block briefly
/// but must not wait indefinitely: callers poll cancellation between frames.
pub trait FrameSource {
    fn next_frame(&mut self) -> Frame;
}

/// webrtc-vad over a ring buffer of mono `f32` samples.
///
/// `Vad` is not `Send`; build this on the thread that polls it.
pub struct VadFrames<C> {
    consumer: C,
    vad: Vad,
    frame_f32: Vec<f32>,
    frame_i16: Vec<i16>,
    sample_rate: u32,
}

impl<C> VadFrames<C>
where
    C: Consumer<Item = f32>,
{
    pub fn new(consumer: C, sample_rate: u32, frame_ms: u32, mode: u8) -> Result<Self, AgentError> {
        let rate = match sample_rate {
            8000 => SampleRate::Rate8kHz,
            16000 => SampleRate::Rate16kHz,
            32000 => SampleRate::Rate32kHz,
            48000 => SampleRate::Rate48kHz,
            other => return Err(AgentError::Vad(format!("unsupported sample rate {}", other))),
        };
        if !matches!(frame_ms, 10 | 20 | 30) {
            return Err(AgentError::Vad(format!("frame length must be 10, 20 or 30 ms, got {}", frame_ms)));
        }

        let frame_size = (sample_rate * frame_ms / 1000) as usize;
        Ok(Self {
            consumer,
            vad: Vad::new_with_rate_and_mode(rate, vad_mode(mode)),
            frame_f32: vec![0.0; frame_size],
            frame_i16: vec![0; frame_size],
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// PCM of the most recently classified frame.
    pub fn samples(&self) -> &[i16] {
        &self.frame_i16
    }
}

impl<C> FrameSource for VadFrames<C>
where
    C: Consumer<Item = f32>,
{
    fn next_frame(&mut self) -> Frame {
        if self.consumer.occupied_len() < self.frame_f32.len() {
            return Frame::Pending;
        }

        self.consumer.pop_slice(&mut self.frame_f32);
        for (out, &sample) in self.frame_i16.iter_mut().zip(&self.frame_f32) {
            *out = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        }

        match self.vad.is_voice_segment(&self.frame_i16) {
            Ok(true) => Frame::Voiced,
            Ok(false) => Frame::Unvoiced,
            Err(()) => {
                debug!("VAD rejected frame of {} samples", self.frame_i16.len());
                Frame::Unvoiced
            }
        }
    }
}

fn vad_mode(mode: u8) -> VadMode {
    match mode {
        0 => VadMode::Quality,
        1 => VadMode::LowBitrate,
        2 => VadMode::Aggressive,
        _ => VadMode::VeryAggressive,
    }
}
