//! Audio subsystem configuration
//!
//! Covers output device selection, the engine's mix format and the
//! per-track render quality used when the session starts.

use serde::{Deserialize, Serialize};

use crate::types::{RenderConfig, RenderQuality, FRAME_COUNT, SAMPLE_RATE};

/// Default buffer size requested from the output device (frames)
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Largest device buffer we accept
pub const MAX_BUFFER_SIZE: u32 = 8192;

/// Audio device identifier
///
/// Includes both the device name and the host backend (ALSA, CoreAudio, ...)
/// so the same name under different hosts can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    pub name: String,
    /// If None, every available host is searched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the audio engine and its output device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device (None = system default)
    pub device: Option<DeviceId>,

    /// Mix rate of every track
    pub sample_rate: u32,

    /// Frames rendered per engine pass
    pub frame_count: usize,

    /// Buffer size requested from the device (frames)
    pub buffer_size: u32,

    /// Initial render quality of the player and autoplay tracks
    pub quality: RenderQuality,

    /// Smallest level shown on meters, in dBFS
    pub dbfs_floor: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: SAMPLE_RATE,
            frame_count: FRAME_COUNT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            quality: RenderQuality::Default,
            dbfs_floor: -96.0,
        }
    }
}

impl AudioConfig {
    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn with_frame_count(mut self, frames: usize) -> Self {
        self.frame_count = frames;
        self
    }

    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = frames;
        self
    }

    pub fn with_quality(mut self, quality: RenderQuality) -> Self {
        self.quality = quality;
        self
    }

    /// Render configuration shared by the master and child tracks
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig::new(self.sample_rate, self.frame_count.max(1)).with_quality(self.quality)
    }

    /// Device buffer size clamped to sane bounds
    pub fn device_buffer_frames(&self) -> u32 {
        self.buffer_size.clamp(64, MAX_BUFFER_SIZE)
    }

    /// Engine latency of one render pass in milliseconds
    pub fn pass_latency_ms(&self) -> f32 {
        self.frame_count as f32 / self.sample_rate as f32 * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AudioConfig::default();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.frame_count, 4096);
        assert!(config.device.is_none());
        assert_eq!(config.render_config().frame_count, 4096);
    }

    #[test]
    fn test_builders() {
        let config = AudioConfig::default()
            .with_device(DeviceId::with_host("hw:0,0", "ALSA"))
            .with_frame_count(256)
            .with_buffer_frames(16)
            .with_quality(RenderQuality::Fast);

        assert_eq!(config.device.as_ref().map(|d| d.display_label()).as_deref(), Some("[ALSA] hw:0,0"));
        assert_eq!(config.render_config().frame_count, 256);
        assert_eq!(config.render_config().quality, RenderQuality::Fast);
        assert_eq!(config.device_buffer_frames(), 64, "buffer size is clamped");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: AudioConfig = serde_yaml::from_str("frame_count: 1024\n").expect("parse");
        assert_eq!(config.frame_count, 1024);
        assert_eq!(config.sample_rate, 48000);
    }
}
