//! 2nd-order IIR filter (transposed direct form II)

use std::f64::consts::{PI, SQRT_2};

use super::Filter;
use crate::types::{FrameBuffer, CHANNELS};

/// Delay-line values below this are flushed to zero to avoid denormals
const DENORMAL_EPSILON: f64 = 1e-12;

/// Response shape of a [`Biquad`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiquadKind {
    LowPass,
    HighPass,
}

/// Normalized biquad coefficients (a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Butterworth low-pass via the bilinear transform
    pub fn low_pass(sample_rate: f64, cutoff: f64) -> Self {
        let n = 1.0 / (PI * cutoff / sample_rate).tan();
        let c = 1.0 / (1.0 + SQRT_2 * n + n * n);
        Self {
            b0: c,
            b1: 2.0 * c,
            b2: c,
            a1: 2.0 * c * (1.0 - n * n),
            a2: c * (1.0 - SQRT_2 * n + n * n),
        }
        .finite_or_zero()
    }

    /// Butterworth high-pass via the bilinear transform
    pub fn high_pass(sample_rate: f64, cutoff: f64) -> Self {
        let n = (PI * cutoff / sample_rate).tan();
        let c = 1.0 / (1.0 + SQRT_2 * n + n * n);
        Self {
            b0: c,
            b1: -2.0 * c,
            b2: c,
            a1: 2.0 * c * (n * n - 1.0),
            a2: c * (1.0 - SQRT_2 * n + n * n),
        }
        .finite_or_zero()
    }

    pub fn new(kind: BiquadKind, sample_rate: f64, cutoff: f64) -> Self {
        match kind {
            BiquadKind::LowPass => Self::low_pass(sample_rate, cutoff),
            BiquadKind::HighPass => Self::high_pass(sample_rate, cutoff),
        }
    }

    // Degenerate cutoffs (0 Hz, Nyquist) produce inf/NaN terms
    fn finite_or_zero(self) -> Self {
        let fix = |v: f64| if v.is_finite() { v } else { 0.0 };
        Self {
            b0: fix(self.b0),
            b1: fix(self.b1),
            b2: fix(self.b2),
            a1: fix(self.a1),
            a2: fix(self.a2),
        }
    }
}

/// Per-channel delay line
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    z0: f64,
    z1: f64,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, x: f64, k: &BiquadCoeffs) -> f64 {
        let y = x * k.b0 + self.z0;
        self.z0 = x * k.b1 - y * k.a1 + self.z1;
        self.z1 = x * k.b2 - y * k.a2;

        if self.z0.abs() < DENORMAL_EPSILON {
            self.z0 = 0.0;
        }
        if self.z1.abs() < DENORMAL_EPSILON {
            self.z1 = 0.0;
        }
        y
    }
}

/// Stereo biquad filter with independent state per channel
#[derive(Debug, Clone)]
pub struct Biquad {
    kind: BiquadKind,
    sample_rate: f64,
    cutoff: f64,
    coeffs: BiquadCoeffs,
    state: [BiquadState; CHANNELS],
}

impl Biquad {
    pub fn new(kind: BiquadKind, sample_rate: u32, cutoff: f32) -> Self {
        let sample_rate = f64::from(sample_rate);
        let cutoff = f64::from(cutoff);
        Self {
            kind,
            sample_rate,
            cutoff,
            coeffs: BiquadCoeffs::new(kind, sample_rate, cutoff),
            state: [BiquadState::default(); CHANNELS],
        }
    }

    pub fn low_pass(sample_rate: u32, cutoff: f32) -> Self {
        Self::new(BiquadKind::LowPass, sample_rate, cutoff)
    }

    pub fn high_pass(sample_rate: u32, cutoff: f32) -> Self {
        Self::new(BiquadKind::HighPass, sample_rate, cutoff)
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff as f32
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    /// Retune the filter; the delay lines are kept
    pub fn set_cutoff(&mut self, cutoff: f32) {
        self.cutoff = f64::from(cutoff);
        self.coeffs = BiquadCoeffs::new(self.kind, self.sample_rate, self.cutoff);
    }

    /// Filter one sample of one channel
    #[inline]
    pub fn process_sample(&mut self, channel: usize, x: f32) -> f32 {
        self.state[channel].process(f64::from(x), &self.coeffs) as f32
    }
}

impl Filter for Biquad {
    fn reset_state(&mut self) {
        self.state = [BiquadState::default(); CHANNELS];
    }

    fn filter_buffer(&mut self, buffer: &mut FrameBuffer) {
        for frame in buffer.iter_mut() {
            frame.left = self.process_sample(0, frame.left);
            frame.right = self.process_sample(1, frame.right);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Frame;

    fn sine(freq: f32, rate: u32, len: usize) -> FrameBuffer {
        FrameBuffer::from_vec(
            (0..len)
                .map(|i| {
                    let v = (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin();
                    Frame::mono(v)
                })
                .collect(),
        )
    }

    /// Peak over the second half, after the filter has settled
    fn settled_peak(buffer: &FrameBuffer) -> f32 {
        buffer.as_slice()[buffer.len() / 2..]
            .iter()
            .map(|f| f.peak())
            .fold(0.0, f32::max)
    }

    #[test]
    fn test_low_pass_unity_dc_gain() {
        let k = BiquadCoeffs::low_pass(48000.0, 1000.0);
        let gain = (k.b0 + k.b1 + k.b2) / (1.0 + k.a1 + k.a2);
        assert!((gain - 1.0).abs() < 1e-9, "DC gain was {}", gain);
    }

    #[test]
    fn test_low_pass_attenuates_high_frequencies() {
        let mut lpf = Biquad::low_pass(48000, 500.0);
        let mut low = sine(100.0, 48000, 4800);
        let mut high = sine(10000.0, 48000, 4800);

        lpf.filter_buffer(&mut low);
        lpf.reset_state();
        lpf.filter_buffer(&mut high);

        assert!(settled_peak(&low) > 0.9, "passband should pass");
        assert!(settled_peak(&high) < 0.05, "stopband should be attenuated");
    }

    #[test]
    fn test_high_pass_blocks_dc() {
        let mut hpf = Biquad::high_pass(48000, 1000.0);
        let mut dc = FrameBuffer::from_vec(vec![Frame::mono(0.5); 4800]);
        hpf.filter_buffer(&mut dc);
        assert!(settled_peak(&dc) < 1e-3);
    }

    #[test]
    fn test_denormals_flushed_to_zero() {
        let mut lpf = Biquad::low_pass(48000, 2000.0);
        let mut impulse = FrameBuffer::silence(48000);
        impulse[0] = Frame::mono(1.0);
        lpf.filter_buffer(&mut impulse);

        assert_eq!(lpf.state[0].z0, 0.0);
        assert_eq!(lpf.state[0].z1, 0.0);
        assert_eq!(impulse[47999], Frame::silence());
    }

    #[test]
    fn test_degenerate_cutoff_is_finite() {
        let k = BiquadCoeffs::low_pass(48000.0, 0.0);
        assert!(k.b0.is_finite() && k.a1.is_finite() && k.a2.is_finite());
    }
}
