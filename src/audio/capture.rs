use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::Producer;
use tracing::{error, info};

/// Rates webrtc-vad accepts, in order of preference.
pub const VAD_RATES: [u32; 4] = [16000, 32000, 48000, 8000];

/// Live microphone stream feeding mono `f32` samples into a ring buffer.
/// Dropping it releases the device.
pub struct MicCapture {
    _stream: cpal::Stream,
    pub sample_rate: u32,
    pub channels: u16,
}

impl MicCapture {
    pub fn open<P>(mut producer: P) -> Result<Self, anyhow::Error>
    where
        P: Producer<Item = f32> + Send + 'static,
    {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No input device available"))?;

        info!("Audio input device: {}", device.name().unwrap_or_default());

        let mut selected = None;
        for &rate in &VAD_RATES {
            selected = device.supported_input_configs()?.find_map(|range| {
                (range.min_sample_rate().0 <= rate && range.max_sample_rate().0 >= rate)
                    .then(|| range.with_sample_rate(cpal::SampleRate(rate)))
            });
            if selected.is_some() {
                break;
            }
        }

        let config = match selected {
            Some(config) => config,
            None => {
                let fallback = device.default_input_config()?;
                let rate = fallback.sample_rate().0;
                if !VAD_RATES.contains(&rate) {
                    return Err(anyhow::anyhow!(
                        "Unsupported sample rate: {}. VAD requires 8k, 16k, 32k, or 48k.",
                        rate
                    ));
                }
                fallback
            }
        };

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();
        info!("Audio config selected: rate={}Hz, channels={}", sample_rate, channels);

        let err_fn = |err| error!("an error occurred on stream: {}", err);
        let width = channels as usize;

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config.into(),
                move |data: &[f32], _: &_| push_mono(data, width, |s| s, &mut producer),
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I16 => device.build_input_stream(
                &config.into(),
                move |data: &[i16], _: &_| {
                    push_mono(data, width, |s| s as f32 / i16::MAX as f32, &mut producer)
                },
                err_fn,
                None,
            )?,
            other => return Err(anyhow::anyhow!("Unsupported sample format: {:?}", other)),
        };

        stream.play()?;

        Ok(Self { _stream: stream, sample_rate, channels })
    }
}

/// Averages interleaved channels into one. Samples that do not fit are
/// dropped (lossy when the consumer falls behind).
pub fn push_mono<T, P>(data: &[T], channels: usize, to_f32: impl Fn(T) -> f32, producer: &mut P)
where
    T: Copy,
    P: Producer<Item = f32>,
{
    let channels = channels.max(1);
    for frame in data.chunks(channels) {
        let sum: f32 = frame.iter().map(|&s| to_f32(s)).sum();
        let _ = producer.try_push(sum / frame.len() as f32);
    }
}
