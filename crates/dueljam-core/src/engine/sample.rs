//! Decoded PCM samples
//!
//! A [`Sample`] is immutable once built. Its PCM buffer is stored as
//! interleaved 16-bit fixed point normalized by a peak factor, so formats
//! that decode beyond unit range keep their headroom. Cloning is cheap:
//! the buffer is reference counted through the audio GC.

use std::collections::HashMap;

use basedrop::Shared;

use super::gc::gc_handle;
use crate::audio::{AudioError, AudioResult};

/// Chart-scoped table of samples keyed by their numeric ID
pub type SampleMap = HashMap<u32, Sample>;

const I16_SCALE: f32 = i16::MAX as f32;

#[derive(Clone)]
pub struct Sample {
    id: u32,
    name: String,
    data: Shared<Vec<i16>>,
    channels: usize,
    sample_rate: u32,
    peak: f32,
}

impl std::fmt::Debug for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sample")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frame_count())
            .field("peak", &self.peak)
            .finish()
    }
}

impl Sample {
    /// Build a sample from interleaved float PCM
    ///
    /// When `peak` is None it is computed as `max(1.0, max |x|)`.
    pub fn from_f32(
        id: u32,
        name: impl Into<String>,
        interleaved: &[f32],
        channels: usize,
        sample_rate: u32,
        peak: Option<f32>,
    ) -> AudioResult<Self> {
        let name = name.into();
        if channels != 1 && channels != 2 {
            return Err(AudioError::UnsupportedChannelCount { name, channels });
        }

        let peak = peak
            .filter(|p| p.is_finite() && *p > 0.0)
            .unwrap_or_else(|| interleaved.iter().fold(1.0_f32, |m, x| m.max(x.abs())));

        // Drop a trailing partial frame
        let usable = interleaved.len() - interleaved.len() % channels;
        let data: Vec<i16> = interleaved[..usable]
            .iter()
            .map(|x| ((x / peak) * I16_SCALE).round().clamp(-I16_SCALE, I16_SCALE) as i16)
            .collect();

        Ok(Self {
            id,
            name,
            data: Shared::new(&gc_handle(), data),
            channels,
            sample_rate,
            peak,
        })
    }

    /// A silent sample of the given length
    pub fn silence(
        id: u32,
        name: impl Into<String>,
        frames: usize,
        channels: usize,
        sample_rate: u32,
    ) -> AudioResult<Self> {
        Self::from_f32(id, name, &vec![0.0; frames * channels.max(1)], channels, sample_rate, Some(1.0))
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Normalization factor applied back on playback
    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn frame_count(&self) -> usize {
        self.data.len() / self.channels
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / f64::from(self.sample_rate.max(1))
    }

    /// Raw interleaved fixed-point data
    pub fn data(&self) -> &[i16] {
        &self.data
    }

    /// Normalized value of one channel of one frame (no peak applied)
    ///
    /// Mono samples return the same value for both channels; frames past the
    /// end read as silence.
    #[inline]
    pub fn value(&self, frame: usize, channel: usize) -> f32 {
        let ch = if self.channels == 1 { 0 } else { channel.min(1) };
        self.data
            .get(frame * self.channels + ch)
            .map_or(0.0, |v| f32::from(*v) / I16_SCALE)
    }

    /// Whether two handles share the same PCM buffer
    pub fn shares_data(&self, other: &Sample) -> bool {
        std::ptr::eq(self.data.as_ptr(), other.data.as_ptr())
    }
}
