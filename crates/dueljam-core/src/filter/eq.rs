//! Three-band equalizer built from a low-pass / high-pass split

use super::{Biquad, Filter};
use crate::types::{Frame, FrameBuffer, CHANNELS};

const DEFAULT_LOW_CUTOFF: f32 = 880.0;   // Low band below 880 Hz
const DEFAULT_HIGH_CUTOFF: f32 = 5000.0; // High band above 5 kHz

/// Splits the signal into low, mid and high bands and recombines them with
/// independent gains
///
/// The mid band is what remains after removing the low and high bands, so a
/// flat setting (all gains 1.0) reproduces the input exactly.
#[derive(Debug, Clone)]
pub struct ThreeBandEq {
    low_pass: Biquad,
    high_pass: Biquad,
    low_gain: f32,
    mid_gain: f32,
    high_gain: f32,
}

impl ThreeBandEq {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_frequencies(sample_rate, DEFAULT_LOW_CUTOFF, DEFAULT_HIGH_CUTOFF)
    }

    pub fn with_frequencies(sample_rate: u32, low_cutoff: f32, high_cutoff: f32) -> Self {
        Self {
            low_pass: Biquad::low_pass(sample_rate, low_cutoff),
            high_pass: Biquad::high_pass(sample_rate, high_cutoff),
            low_gain: 1.0,
            mid_gain: 1.0,
            high_gain: 1.0,
        }
    }

    pub fn set_frequencies(&mut self, low_cutoff: f32, high_cutoff: f32) {
        self.low_pass.set_cutoff(low_cutoff);
        self.high_pass.set_cutoff(high_cutoff);
    }

    pub fn set_gains(&mut self, low: f32, mid: f32, high: f32) {
        self.low_gain = low;
        self.mid_gain = mid;
        self.high_gain = high;
    }

    pub fn set_low_gain(&mut self, gain: f32) {
        self.low_gain = gain;
    }

    pub fn set_mid_gain(&mut self, gain: f32) {
        self.mid_gain = gain;
    }

    pub fn set_high_gain(&mut self, gain: f32) {
        self.high_gain = gain;
    }

    pub fn frequencies(&self) -> (f32, f32) {
        (self.low_pass.cutoff(), self.high_pass.cutoff())
    }

    pub fn gains(&self) -> (f32, f32, f32) {
        (self.low_gain, self.mid_gain, self.high_gain)
    }
}

impl Filter for ThreeBandEq {
    fn reset_state(&mut self) {
        self.low_pass.reset_state();
        self.high_pass.reset_state();
    }

    fn filter_buffer(&mut self, buffer: &mut FrameBuffer) {
        for frame in buffer.iter_mut() {
            let mut out = Frame::silence();
            for ch in 0..CHANNELS {
                let x = frame.channel(ch);
                let low = self.low_pass.process_sample(ch, x);
                let high = self.high_pass.process_sample(ch, x);
                let mid = x - low - high;
                *out.channel_mut(ch) =
                    low * self.low_gain + mid * self.mid_gain + high * self.high_gain;
            }
            *frame = out;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(len: usize) -> FrameBuffer {
        // Deterministic pseudo-random signal
        let mut seed: u32 = 0x1234_5678;
        FrameBuffer::from_vec(
            (0..len)
                .map(|_| {
                    seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                    let v = (seed >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0;
                    Frame::new(v, -v)
                })
                .collect(),
        )
    }

    #[test]
    fn test_flat_gains_reconstruct_input() {
        let mut eq = ThreeBandEq::new(48000);
        let input = noise(1024);
        let mut buffer = input.clone();
        eq.filter_buffer(&mut buffer);

        for (a, b) in input.iter().zip(buffer.iter()) {
            assert!((a.left - b.left).abs() < 1e-5);
            assert!((a.right - b.right).abs() < 1e-5);
        }
    }

    #[test]
    fn test_zero_gains_silence_output() {
        let mut eq = ThreeBandEq::new(48000);
        eq.set_gains(0.0, 0.0, 0.0);
        let mut buffer = noise(256);
        eq.filter_buffer(&mut buffer);
        assert_eq!(buffer.peak(), 0.0);
    }

    #[test]
    fn test_low_cut_removes_dc() {
        let mut eq = ThreeBandEq::new(48000);
        eq.set_low_gain(0.0);
        let mut buffer = FrameBuffer::from_vec(vec![Frame::mono(0.5); 9600]);
        eq.filter_buffer(&mut buffer);
        assert!(buffer[9599].peak() < 1e-3, "DC lives in the low band");
    }

    #[test]
    fn test_set_frequencies() {
        let mut eq = ThreeBandEq::new(48000);
        eq.set_frequencies(200.0, 8000.0);
        assert_eq!(eq.frequencies(), (200.0, 8000.0));
    }
}
