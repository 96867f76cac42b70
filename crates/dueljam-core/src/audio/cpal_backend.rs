//! CPAL output stream
//!
//! The device callback never renders audio itself. It only drains the
//! [`OutputReader`] end of the ring buffer the engine thread keeps topped up:
//!
//! ```text
//! ┌──────────────────┐   push()   ┌─────────────────────┐   pop_into()   ┌─────────────────────┐
//! │  "audio-engine"  │───────────►│    OutputQueue      │───────────────►│  CPAL Audio Thread  │
//! │  (master pass)   │            │  (rtrb ring, f32)   │                │  (device callback)  │
//! └──────────────────┘            └─────────────────────┘                └─────────────────────┘
//! ```
//!
//! A callback that finds too little data plays silence for the shortfall;
//! the reader counts it as an underflow.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::config::AudioConfig;
use super::device::open_output_device;
use super::error::{AudioError, AudioResult};
use super::queue::OutputReader;

/// Keeps the output stream alive. Drop this to stop audio.
pub struct CpalAudioHandle {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
    channels: u16,
    buffer_size: u32,
}

impl CpalAudioHandle {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Buffer size in frames as requested from the device
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// One-way output latency of the device buffer in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Open the configured (or default) output device and start a stream that
/// drains `output`
///
/// The device must accept the engine's mix rate; tracks are never converted
/// on the way out.
pub fn start_output(config: &AudioConfig, output: OutputReader) -> AudioResult<CpalAudioHandle> {
    let device = open_output_device(config.device.as_ref())?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported = get_output_config(&device, config)?;
    let buffer_size = config.device_buffer_frames();
    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: CpalBufferSize::Fixed(buffer_size),
    };

    let handle = CpalAudioHandle {
        _stream: build_output_stream(&device, &stream_config, output)?,
        device_name,
        sample_rate: stream_config.sample_rate.0,
        channels: stream_config.channels,
        buffer_size,
    };
    handle
        ._stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        handle.channels,
        handle.sample_rate,
        handle.buffer_size,
        handle.latency_ms()
    );
    Ok(handle)
}

/// Pick an f32 configuration at the engine's mix rate, stereo if possible
fn get_output_config(device: &cpal::Device, config: &AudioConfig) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if supported_configs.is_empty() {
        return Err(AudioError::ConfigError("No supported output configurations".to_string()));
    }

    let rate = config.sample_rate;
    let at_rate: Vec<_> = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&rate))
        .collect();

    if at_rate.is_empty() {
        if supported_configs.iter().all(|c| c.sample_format() != SampleFormat::F32) {
            return Err(AudioError::UnsupportedFormat(
                "device offers no f32 output configuration".to_string(),
            ));
        }
        return Err(AudioError::ConfigError(format!("device does not support {}Hz output", rate)));
    }

    let best = at_rate
        .iter()
        .find(|c| c.channels() == 2)
        .or_else(|| at_rate.iter().find(|c| c.channels() > 2))
        .or_else(|| at_rate.first())
        .copied()
        .ok_or_else(|| AudioError::ConfigError("No suitable output configuration found".to_string()))?;

    Ok(best.clone().with_sample_rate(cpal::SampleRate(rate)))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut output: OutputReader,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                output.pop_into(data, channels);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}
