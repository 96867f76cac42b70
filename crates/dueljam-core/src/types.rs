//! Common types for DuelJam
//!
//! Frame and buffer primitives shared by the mixing engine, plus the render
//! configuration handed to every source and filter on each pass.

use std::ops::{Index, IndexMut};

/// Default mix rate of the engine (48kHz)
pub const SAMPLE_RATE: u32 = 48000;

/// Default number of frames rendered per engine pass
pub const FRAME_COUNT: usize = 4096;

/// Number of channels in a mixing frame
pub const CHANNELS: usize = 2;

/// Smallest step of a 16-bit normalized sample
pub const INT16_EPSILON: f32 = 1.0 / 65535.0;

/// Convert a linear magnitude to dBFS
#[inline]
pub fn to_dbfs(value: f32) -> f32 {
    20.0 * value.log10()
}

/// Convert a dBFS level to a linear magnitude
#[inline]
pub fn from_dbfs(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// A single stereo frame (left and right channels)
///
/// `#[repr(C)]` keeps the layout `[left, right]` so a slice of frames can be
/// viewed as interleaved `f32` without copying.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Frame {
    pub left: f32,
    pub right: f32,
}

impl Frame {
    #[inline]
    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Same value in both channels
    #[inline]
    pub fn mono(value: f32) -> Self {
        Self { left: value, right: value }
    }

    /// Multiply each channel by its own gain
    #[inline]
    pub fn apply_gain(&self, gain: [f32; CHANNELS]) -> Self {
        Self {
            left: self.left * gain[0],
            right: self.right * gain[1],
        }
    }

    /// Peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> f32 {
        self.left.abs().max(self.right.abs())
    }

    /// Channel access by index (0 = left, 1 = right)
    #[inline]
    pub fn channel(&self, index: usize) -> f32 {
        if index == 0 {
            self.left
        } else {
            self.right
        }
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut f32 {
        if index == 0 {
            &mut self.left
        } else {
            &mut self.right
        }
    }
}

impl std::ops::Add for Frame {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for Frame {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Sub for Frame {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self {
            left: self.left - other.left,
            right: self.right - other.right,
        }
    }
}

impl std::ops::Mul<f32> for Frame {
    type Output = Self;

    #[inline]
    fn mul(self, factor: f32) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

impl std::ops::MulAssign<f32> for Frame {
    #[inline]
    fn mul_assign(&mut self, factor: f32) {
        self.left *= factor;
        self.right *= factor;
    }
}

/// A fixed-length buffer of stereo frames
///
/// Tracks allocate these once at construction and never resize them on the
/// render path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameBuffer {
    frames: Vec<Frame>,
}

impl FrameBuffer {
    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            frames: vec![Frame::silence(); len],
        }
    }

    /// Create a buffer from interleaved samples [L, R, L, R, ...]
    pub fn from_interleaved(interleaved: &[f32]) -> Self {
        assert!(interleaved.len() % CHANNELS == 0, "Interleaved buffer must have even length");
        Self {
            frames: bytemuck::cast_slice(interleaved).to_vec(),
        }
    }

    pub fn from_vec(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    /// Number of frames in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn fill_silence(&mut self) {
        self.frames.fill(Frame::silence());
    }

    #[inline]
    pub fn as_slice(&self) -> &[Frame] {
        &self.frames
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    /// Zero-copy interleaved view [L, R, L, R, ...]
    #[inline]
    pub fn as_interleaved(&self) -> &[f32] {
        bytemuck::cast_slice(&self.frames)
    }

    #[inline]
    pub fn as_interleaved_mut(&mut self) -> &mut [f32] {
        bytemuck::cast_slice_mut(&mut self.frames)
    }

    /// Sum `other` into this buffer starting at frame `offset`
    ///
    /// Panics if `other` does not fit; a size mismatch between a source and
    /// its target is a programming error.
    pub fn mix_from(&mut self, other: &FrameBuffer, offset: usize) {
        let end = offset + other.len();
        assert!(
            end <= self.frames.len(),
            "mix_from: {} frames at offset {} overflow a buffer of {}",
            other.len(),
            offset,
            self.frames.len()
        );
        for (dst, src) in self.frames[offset..end].iter_mut().zip(other.frames.iter()) {
            *dst += *src;
        }
    }

    pub fn scale(&mut self, factor: f32) {
        for frame in &mut self.frames {
            *frame *= factor;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Frame> {
        self.frames.iter_mut()
    }

    /// Peak amplitude across the buffer
    pub fn peak(&self) -> f32 {
        self.frames.iter().map(|f| f.peak()).fold(0.0, f32::max)
    }
}

impl Index<usize> for FrameBuffer {
    type Output = Frame;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.frames[index]
    }
}

impl IndexMut<usize> for FrameBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.frames[index]
    }
}

/// Render quality hint passed down with every render call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum RenderQuality {
    #[default]
    Default,
    Fast,
    Medium,
    Best,
    /// Process everything but discard the output
    Mute,
    /// Do no work at all
    Skip,
}

/// Render configuration of a track's source pool
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    pub sample_rate: u32,
    pub frame_count: usize,
    /// First frame of the target buffer to write into
    pub frame_offset: usize,
    pub quality: RenderQuality,
}

impl RenderConfig {
    pub fn new(sample_rate: u32, frame_count: usize) -> Self {
        Self {
            sample_rate,
            frame_count,
            frame_offset: 0,
            quality: RenderQuality::Default,
        }
    }

    pub fn with_quality(mut self, quality: RenderQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_offset(mut self, frame_offset: usize) -> Self {
        self.frame_offset = frame_offset;
        self
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::new(SAMPLE_RATE, FRAME_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_operations() {
        let a = Frame::new(0.5, 0.25);
        let b = Frame::new(0.25, 0.5);

        let sum = a + b;
        assert_eq!(sum.left, 0.75);
        assert_eq!(sum.right, 0.75);

        let diff = a - b;
        assert_eq!(diff.left, 0.25);
        assert_eq!(diff.right, -0.25);

        let gained = a.apply_gain([2.0, 4.0]);
        assert_eq!(gained.left, 1.0);
        assert_eq!(gained.right, 1.0);

        assert_eq!(Frame::new(-0.8, 0.3).peak(), 0.8);
    }

    #[test]
    fn test_interleaved_view() {
        let buffer = FrameBuffer::from_interleaved(&[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer[1], Frame::new(0.3, 0.4));
        assert_eq!(buffer.as_interleaved(), &[0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_mix_from_offset() {
        let mut target = FrameBuffer::silence(4);
        let source = FrameBuffer::from_vec(vec![Frame::mono(1.0); 2]);
        target.mix_from(&source, 1);
        target.mix_from(&source, 2);

        assert_eq!(target[0], Frame::silence());
        assert_eq!(target[1], Frame::mono(1.0));
        assert_eq!(target[2], Frame::mono(2.0));
        assert_eq!(target[3], Frame::mono(1.0));
    }

    #[test]
    #[should_panic]
    fn test_mix_from_overflow_panics() {
        let mut target = FrameBuffer::silence(2);
        target.mix_from(&FrameBuffer::silence(2), 1);
    }

    #[test]
    fn test_dbfs_conversions() {
        assert!((from_dbfs(0.0) - 1.0).abs() < 1e-6);
        assert!((from_dbfs(-6.0) - 0.501).abs() < 1e-3);
        assert!((to_dbfs(from_dbfs(-0.1)) + 0.1).abs() < 1e-4);
    }
}
