//! A playing instance of a sample

use super::resample::VoiceResampler;
use super::sample::Sample;
use crate::audio::AudioResult;
use crate::types::{FrameBuffer, RenderConfig, RenderQuality, CHANNELS};

/// One sounding note: a sample bound to a track with its own converter
///
/// The voice holds a reference to its sample, so the PCM data outlives
/// every voice that plays it.
pub struct Voice {
    sample: Sample,
    track_id: u8,
    gain: [f32; CHANNELS],
    quality: RenderQuality,
    resampler: VoiceResampler,
    /// Source frames consumed so far
    read: usize,
    scratch: FrameBuffer,
}

impl std::fmt::Debug for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Voice")
            .field("sample", &self.sample.id())
            .field("track_id", &self.track_id)
            .field("read", &self.read)
            .field("frames", &self.sample.frame_count())
            .finish()
    }
}

impl Voice {
    /// Create a voice targeting the render format of its track
    pub fn new(sample: Sample, track_id: u8, config: &RenderConfig, gain: [f32; CHANNELS]) -> AudioResult<Self> {
        let resampler = VoiceResampler::new(
            sample.sample_rate(),
            config.sample_rate,
            sample.channels(),
            config.frame_count,
            config.quality,
        )?;
        Ok(Self {
            sample,
            track_id,
            gain,
            quality: config.quality,
            resampler,
            read: 0,
            scratch: FrameBuffer::silence(config.frame_count),
        })
    }

    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    pub fn sample_id(&self) -> u32 {
        self.sample.id()
    }

    pub fn track_id(&self) -> u8 {
        self.track_id
    }

    pub fn gain(&self) -> [f32; CHANNELS] {
        self.gain
    }

    /// Source frames consumed so far
    pub fn position(&self) -> usize {
        self.read
    }

    /// True until the converter has consumed the whole sample
    pub fn is_active(&self) -> bool {
        self.read < self.sample.frame_count()
    }

    /// Rebuild the converter and rewind to the start
    pub fn make_active(&mut self) -> AudioResult<()> {
        self.resampler = VoiceResampler::new(
            self.sample.sample_rate(),
            self.resampler.target_rate(),
            self.sample.channels(),
            self.resampler.chunk(),
            self.quality,
        )?;
        self.read = 0;
        Ok(())
    }

    /// Stop playback; the voice is pruned on the next pass
    pub fn deactivate(&mut self) {
        self.read = self.sample.frame_count();
    }

    /// Mix the next pass of this voice into `buffer` at `config.frame_offset`
    ///
    /// On a converter fault the error is returned and `buffer` is left
    /// untouched.
    pub fn render(&mut self, buffer: &mut FrameBuffer, config: &RenderConfig) -> AudioResult<()> {
        if config.quality == RenderQuality::Skip || !self.is_active() {
            return Ok(());
        }

        if config.frame_count != self.resampler.chunk() || config.sample_rate != self.resampler.target_rate() {
            log::debug!(
                "Voice {}: render format changed to {} frames @ {}Hz, rebuilding converter",
                self.sample.id(),
                config.frame_count,
                config.sample_rate
            );
            self.resampler = VoiceResampler::new(
                self.sample.sample_rate(),
                config.sample_rate,
                self.sample.channels(),
                config.frame_count,
                self.quality,
            )?;
            self.scratch = FrameBuffer::silence(config.frame_count);
        }

        let consumed = self.resampler.process(&self.sample, self.read, &mut self.scratch)?;
        self.read = (self.read + consumed).min(self.sample.frame_count());

        if config.quality == RenderQuality::Mute {
            return Ok(());
        }

        let peak = self.sample.peak();
        let gain = [self.gain[0] * peak, self.gain[1] * peak];
        for frame in self.scratch.iter_mut() {
            *frame = frame.apply_gain(gain);
        }
        buffer.mix_from(&self.scratch, config.frame_offset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Frame;

    fn constant(frames: usize, channels: usize, value: f32) -> Sample {
        Sample::from_f32(9, "const", &vec![value; frames * channels], channels, 48000, Some(1.0)).expect("sample")
    }

    #[test]
    fn test_inactive_once_consumed() {
        let sample = Sample::silence(1, "silence", 300, 2, 48000).expect("silence");
        let config = RenderConfig::new(48000, 256);
        let mut voice = Voice::new(sample, 0, &config, [1.0, 1.0]).expect("voice");
        let mut buffer = FrameBuffer::silence(256);

        voice.render(&mut buffer, &config).expect("first pass");
        assert!(voice.is_active(), "44 frames remain after the first pass");

        voice.render(&mut buffer, &config).expect("second pass");
        assert!(!voice.is_active());

        voice.render(&mut buffer, &config).expect("third pass");
        assert!(!voice.is_active(), "stays inactive");
        assert_eq!(buffer.len(), 256);
    }

    #[test]
    fn test_gain_and_peak_applied() {
        let data = vec![0.5_f32; 64];
        let sample = Sample::from_f32(2, "mono", &data, 1, 48000, Some(2.0)).expect("mono");
        let config = RenderConfig::new(48000, 32);
        let mut voice = Voice::new(sample, 0, &config, [1.0, 0.5]).expect("voice");

        let mut buffer = FrameBuffer::silence(32);
        voice.render(&mut buffer, &config).expect("render");
        assert!((buffer[0].left - 0.5).abs() < 1e-3, "x * peak * gain");
        assert!((buffer[0].right - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_render_is_additive_at_offset() {
        let config = RenderConfig::new(48000, 4);
        let mut voice = Voice::new(constant(8, 2, 0.25), 0, &config, [1.0, 1.0]).expect("voice");

        let mut buffer = FrameBuffer::from_vec(vec![Frame::mono(0.5); 6]);
        voice.render(&mut buffer, &config.with_offset(2)).expect("render");
        assert_eq!(buffer[1], Frame::mono(0.5));
        assert!((buffer[2].left - 0.75).abs() < 1e-3);
    }

    #[test]
    fn test_mute_drains_without_writing() {
        let config = RenderConfig::new(48000, 16).with_quality(RenderQuality::Mute);
        let mut voice = Voice::new(constant(16, 1, 0.8), 0, &config, [1.0, 1.0]).expect("voice");
        let mut buffer = FrameBuffer::silence(16);

        voice.render(&mut buffer, &config).expect("render");
        assert_eq!(buffer.peak(), 0.0);
        assert!(!voice.is_active(), "cursor still advanced");
    }

    #[test]
    fn test_skip_does_nothing() {
        let config = RenderConfig::new(48000, 16).with_quality(RenderQuality::Skip);
        let mut voice = Voice::new(constant(16, 1, 0.8), 0, &config, [1.0, 1.0]).expect("voice");
        let mut buffer = FrameBuffer::silence(16);

        voice.render(&mut buffer, &config).expect("render");
        assert_eq!(voice.position(), 0);
    }

    #[test]
    fn test_make_active_rewinds() {
        let config = RenderConfig::new(48000, 16);
        let mut voice = Voice::new(constant(16, 2, 0.1), 0, &config, [1.0, 1.0]).expect("voice");
        let mut buffer = FrameBuffer::silence(16);
        voice.render(&mut buffer, &config).expect("render");
        assert!(!voice.is_active());

        voice.make_active().expect("rebuild");
        assert!(voice.is_active());
        assert_eq!(voice.position(), 0);
    }

    #[test]
    fn test_resampled_voice_finishes() {
        let data = vec![0.3_f32; 4410];
        let sample = Sample::from_f32(4, "cd", &data, 1, 44100, None).expect("sample");
        let config = RenderConfig::new(48000, 512);
        let mut voice = Voice::new(sample, 0, &config, [1.0, 1.0]).expect("voice");

        let mut passes = 0;
        while voice.is_active() {
            let mut buffer = FrameBuffer::silence(512);
            voice.render(&mut buffer, &config).expect("render");
            passes += 1;
            assert!(passes < 100, "voice never finished");
        }
        // ~4800 output frames at 512 per pass
        assert!((9..=11).contains(&passes), "took {} passes", passes);
    }
}
