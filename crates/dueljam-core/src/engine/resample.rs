//! Per-voice sample-rate conversion
//!
//! Each voice owns one converter that produces exactly one render pass of
//! output frames per call and reports how many source frames it consumed.
//! Identity ratios bypass rubato entirely.

use rubato::{
    FastFixedOut, PolynomialDegree, Resampler, SincFixedOut, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};

use super::sample::Sample;
use crate::audio::{AudioError, AudioResult};
use crate::types::{Frame, FrameBuffer, RenderQuality};

/// Ratios closer to 1.0 than this are played back without conversion
const IDENTITY_TOLERANCE: f64 = 1e-6;

/// Headroom for ratio adjustments (required by rubato, unused here)
const MAX_RATIO_RELATIVE: f64 = 1.1;

enum Engine {
    Direct,
    Polynomial(FastFixedOut<f32>),
    Sinc(SincFixedOut<f32>),
}

/// Converter from a sample's native rate to a track's mix rate
pub struct VoiceResampler {
    engine: Engine,
    chunk: usize,
    channels: usize,
    source_rate: u32,
    target_rate: u32,
    input: Vec<Vec<f32>>,
    output: Vec<Vec<f32>>,
}

/// Whether two rates are close enough to skip conversion
pub fn is_identity(source_rate: u32, target_rate: u32) -> bool {
    (f64::from(target_rate) / f64::from(source_rate.max(1)) - 1.0).abs() < IDENTITY_TOLERANCE
}

fn sinc_parameters(quality: RenderQuality) -> SincInterpolationParameters {
    match quality {
        RenderQuality::Best => SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        },
        _ => SincInterpolationParameters {
            sinc_len: 64,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::Blackman,
        },
    }
}

impl VoiceResampler {
    /// Build a converter producing `chunk` frames per call
    ///
    /// MUTE and SKIP select the DEFAULT tier.
    pub fn new(
        source_rate: u32,
        target_rate: u32,
        channels: usize,
        chunk: usize,
        quality: RenderQuality,
    ) -> AudioResult<Self> {
        let ratio = f64::from(target_rate) / f64::from(source_rate.max(1));
        let construction = |e: rubato::ResamplerConstructionError| {
            AudioError::ResamplerConstruction(e.to_string())
        };

        let engine = if is_identity(source_rate, target_rate) {
            Engine::Direct
        } else {
            match quality {
                RenderQuality::Fast => Engine::Polynomial(
                    FastFixedOut::new(ratio, MAX_RATIO_RELATIVE, PolynomialDegree::Linear, chunk, channels)
                        .map_err(construction)?,
                ),
                RenderQuality::Medium | RenderQuality::Best => Engine::Sinc(
                    SincFixedOut::new(ratio, MAX_RATIO_RELATIVE, sinc_parameters(quality), chunk, channels)
                        .map_err(construction)?,
                ),
                RenderQuality::Default | RenderQuality::Mute | RenderQuality::Skip => Engine::Polynomial(
                    FastFixedOut::new(ratio, MAX_RATIO_RELATIVE, PolynomialDegree::Cubic, chunk, channels)
                        .map_err(construction)?,
                ),
            }
        };

        let (input, output) = match &engine {
            Engine::Direct => (Vec::new(), Vec::new()),
            Engine::Polynomial(r) => (r.input_buffer_allocate(true), r.output_buffer_allocate(true)),
            Engine::Sinc(r) => (r.input_buffer_allocate(true), r.output_buffer_allocate(true)),
        };

        Ok(Self {
            engine,
            chunk,
            channels,
            source_rate,
            target_rate,
            input,
            output,
        })
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.engine, Engine::Direct)
    }

    pub fn chunk(&self) -> usize {
        self.chunk
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    /// Source frames the next call will consume
    pub fn input_frames_next(&self) -> usize {
        match &self.engine {
            Engine::Direct => self.chunk,
            Engine::Polynomial(r) => r.input_frames_next(),
            Engine::Sinc(r) => r.input_frames_next(),
        }
    }

    /// Convert one chunk starting at source frame `read` into `out`
    ///
    /// Reads past the end of the sample are zero. `out` receives normalized
    /// values (no gain, no peak). Returns the number of source frames
    /// consumed.
    pub fn process(&mut self, sample: &Sample, read: usize, out: &mut FrameBuffer) -> AudioResult<usize> {
        if let Engine::Direct = self.engine {
            for (i, frame) in out.iter_mut().enumerate() {
                *frame = Frame::new(sample.value(read + i, 0), sample.value(read + i, 1));
            }
            return Ok(self.chunk);
        }

        let needed = self.input_frames_next();
        for (ch, channel) in self.input.iter_mut().enumerate() {
            if channel.len() < needed {
                channel.resize(needed, 0.0);
            }
            for (i, value) in channel[..needed].iter_mut().enumerate() {
                *value = sample.value(read + i, ch);
            }
        }

        let result = match &mut self.engine {
            Engine::Polynomial(r) => r.process_into_buffer(&self.input, &mut self.output, None),
            Engine::Sinc(r) => r.process_into_buffer(&self.input, &mut self.output, None),
            Engine::Direct => Ok((needed, self.chunk)),
        };
        let (consumed, produced) = result.map_err(|e| AudioError::Resample(e.to_string()))?;

        let right = if self.channels > 1 { 1 } else { 0 };
        for (i, frame) in out.iter_mut().enumerate() {
            *frame = if i < produced {
                Frame::new(self.output[0][i], self.output[right][i])
            } else {
                Frame::silence()
            };
        }

        Ok(consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, rate: u32) -> Sample {
        let data: Vec<f32> = (0..frames).map(|i| i as f32 / frames as f32).collect();
        Sample::from_f32(1, "ramp", &data, 1, rate, Some(1.0)).expect("mono ramp")
    }

    #[test]
    fn test_identity_detection() {
        assert!(is_identity(48000, 48000));
        assert!(!is_identity(44100, 48000));
    }

    #[test]
    fn test_direct_copy_path() {
        let sample = ramp(100, 48000);
        let mut resampler = VoiceResampler::new(48000, 48000, 1, 64, RenderQuality::Best).expect("direct");
        assert!(resampler.is_direct());

        let mut out = FrameBuffer::silence(64);
        let consumed = resampler.process(&sample, 10, &mut out).expect("process");
        assert_eq!(consumed, 64);
        assert_eq!(out[0].left, sample.value(10, 0));
        assert_eq!(out[0].left, out[0].right, "mono is duplicated");
    }

    #[test]
    fn test_each_tier_converts() {
        let sample = ramp(4800, 44100);
        for quality in [RenderQuality::Fast, RenderQuality::Default, RenderQuality::Medium, RenderQuality::Best] {
            let mut resampler = VoiceResampler::new(44100, 48000, 1, 256, quality)
                .unwrap_or_else(|e| panic!("{:?} failed: {}", quality, e));
            assert!(!resampler.is_direct());

            let mut out = FrameBuffer::silence(256);
            let needed = resampler.input_frames_next();
            let consumed = resampler.process(&sample, 0, &mut out).expect("process");
            assert_eq!(consumed, needed, "{:?} consumed an unexpected amount", quality);
            assert!(out.peak() > 0.0, "{:?} produced only silence", quality);
        }
    }
}
