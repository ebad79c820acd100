//! Microphone, voice activity detection, utterance recording and
//! interruptible playback.

pub mod capture;
pub mod monitor;
pub mod playback;
pub mod recorder;
pub mod vad;

use ringbuf::traits::Split;
use ringbuf::{HeapCons, HeapRb};

use capture::MicCapture;
use vad::{Frame, FrameSource, VadFrames};

/// Two seconds at the highest supported rate.
const RING_CAPACITY: usize = 48_000 * 2;

/// An open input device with a VAD reading from it. Opened per listen or
/// playback cycle; dropping it releases the device.
pub struct Microphone {
    _capture: MicCapture,
    frames: VadFrames<HeapCons<f32>>,
}

impl Microphone {
    pub fn open(frame_ms: u32, vad_mode: u8) -> anyhow::Result<Self> {
        let (producer, consumer) = HeapRb::<f32>::new(RING_CAPACITY).split();
        let capture = MicCapture::open(producer)?;
        let frames = VadFrames::new(consumer, capture.sample_rate, frame_ms, vad_mode)?;
        Ok(Self { _capture: capture, frames })
    }

    pub fn sample_rate(&self) -> u32 {
        self.frames.sample_rate()
    }

    pub fn samples(&self) -> &[i16] {
        self.frames.samples()
    }
}

impl FrameSource for Microphone {
    fn next_frame(&mut self) -> Frame {
        self.frames.next_frame()
    }
}
