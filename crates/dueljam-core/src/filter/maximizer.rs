//! Boosting peak limiter for the master track
//!
//! Signal path per frame:
//!   boost → peak detection → gain reduction → ceiling
//!
//! The gain envelope jumps instantly to whatever reduction a new peak needs
//! and then decays linearly. Two release slopes are used:
//! - **Peak release**: while the gain is above `1 / threshold` the decay
//!   slope is derived from the last overshoot and the peak-release time.
//! - **Slow release**: once the gain drops below `1 / threshold` it returns
//!   to unity over the slow-release time.

use super::Filter;
use crate::types::{from_dbfs, FrameBuffer};

// ═══════════════════════════════════════════════════════════════════════════════
// Defaults
// ═══════════════════════════════════════════════════════════════════════════════

const DEFAULT_BOOST_DB: f32 = 0.0;
const DEFAULT_THRESHOLD_DB: f32 = -0.1;
const DEFAULT_CEILING_DB: f32 = 0.0;
const DEFAULT_SLOW_RELEASE_MS: f32 = 1.0;
const DEFAULT_PEAK_RELEASE_MS: f32 = 200.0;

/// Per-frame decay needed to move from `a` to `b` over `seconds`
#[inline]
fn calc_diff(a: f32, b: f32, seconds: f32, frame_rate: f32) -> f32 {
    (a - b) / (seconds * frame_rate)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Maximizer
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct Maximizer {
    frame_rate: f32,

    /// Linear input gain applied before detection
    boost: f32,
    /// Linear level above which gain reduction starts
    threshold: f32,
    /// Linear output scale applied after reduction
    ceiling: f32,
    slow_release_ms: f32,
    peak_release_ms: f32,

    // — Envelope ————————————————————————————————————————————————————————————

    /// Current gain divisor (1.0 = no reduction)
    gain: f32,
    /// Per-frame decrement of `gain`
    decay: f32,
    /// Loudest boosted sample of the last pass
    peak_sample: f32,
}

impl Maximizer {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            frame_rate: frame_rate as f32,
            boost: from_dbfs(DEFAULT_BOOST_DB),
            threshold: from_dbfs(DEFAULT_THRESHOLD_DB),
            ceiling: from_dbfs(DEFAULT_CEILING_DB),
            slow_release_ms: DEFAULT_SLOW_RELEASE_MS,
            peak_release_ms: DEFAULT_PEAK_RELEASE_MS,
            gain: 1.0,
            decay: 0.0,
            peak_sample: 0.0,
        }
    }

    pub fn with_boost_db(mut self, db: f32) -> Self {
        self.set_boost_db(db);
        self
    }

    pub fn with_threshold_db(mut self, db: f32) -> Self {
        self.set_threshold_db(db);
        self
    }

    pub fn with_ceiling_db(mut self, db: f32) -> Self {
        self.set_ceiling_db(db);
        self
    }

    pub fn with_release_ms(mut self, slow_ms: f32, peak_ms: f32) -> Self {
        self.set_slow_release_ms(slow_ms);
        self.set_peak_release_ms(peak_ms);
        self
    }

    pub fn set_boost_db(&mut self, db: f32) {
        self.boost = from_dbfs(db);
    }

    pub fn set_ceiling_db(&mut self, db: f32) {
        self.ceiling = from_dbfs(db);
    }

    /// Changing the threshold restarts the envelope
    pub fn set_threshold_db(&mut self, db: f32) {
        self.threshold = from_dbfs(db);
        self.reset_state();
    }

    pub fn set_slow_release_ms(&mut self, ms: f32) {
        self.slow_release_ms = ms.max(f32::EPSILON);
        self.reset_state();
    }

    pub fn set_peak_release_ms(&mut self, ms: f32) {
        self.peak_release_ms = ms.max(f32::EPSILON);
        self.reset_state();
    }

    pub fn boost(&self) -> f32 {
        self.boost
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Current gain divisor (1.0 when idle)
    pub fn current_gain(&self) -> f32 {
        self.gain
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }

    /// Loudest boosted sample of the last pass
    pub fn peak_sample(&self) -> f32 {
        self.peak_sample
    }

    fn slow_decay(&self) -> f32 {
        calc_diff(1.0, self.threshold, self.slow_release_ms / 1000.0, self.frame_rate)
    }
}

impl Filter for Maximizer {
    fn reset_state(&mut self) {
        self.gain = 1.0;
        self.decay = 0.0;
        self.peak_sample = 0.0;
    }

    fn filter_buffer(&mut self, buffer: &mut FrameBuffer) {
        let release_floor = 1.0 / self.threshold;
        self.peak_sample = 0.0;

        for frame in buffer.iter_mut() {
            *frame *= self.boost;

            let peak = frame.peak();
            self.peak_sample = self.peak_sample.max(peak);

            if peak > self.threshold {
                let needed = peak / self.threshold;
                if needed > self.gain {
                    self.gain = needed;
                    self.decay = if peak > 1.0 {
                        calc_diff(peak, 1.0, self.peak_release_ms / 1000.0, self.frame_rate)
                    } else {
                        calc_diff(peak, self.threshold, self.slow_release_ms / 1000.0, self.frame_rate)
                    };
                }
            }

            *frame *= self.ceiling / self.gain;

            if self.gain > release_floor {
                self.gain -= self.decay;
                if self.gain < release_floor {
                    self.decay = self.slow_decay();
                }
            } else if self.gain > 1.0 {
                self.gain -= self.decay;
            } else {
                self.gain = 1.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Frame;

    fn make_buffer(value: f32, len: usize) -> FrameBuffer {
        FrameBuffer::from_vec(vec![Frame::mono(value); len])
    }

    fn sine(amplitude: f32, len: usize) -> FrameBuffer {
        FrameBuffer::from_vec(
            (0..len)
                .map(|i| {
                    let v = amplitude * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 48000.0).sin();
                    Frame::new(v, -v)
                })
                .collect(),
        )
    }

    #[test]
    fn test_quiet_signal_untouched() {
        let mut max = Maximizer::new(48000);
        let input = sine(0.5, 1024);
        let mut buffer = input.clone();
        max.filter_buffer(&mut buffer);

        for (a, b) in input.iter().zip(buffer.iter()) {
            assert!((a.left - b.left).abs() < 1e-6);
        }
        assert_eq!(max.current_gain(), 1.0);
    }

    #[test]
    fn test_hot_signal_limited_to_ceiling() {
        let mut max = Maximizer::new(48000);
        let mut buffer = sine(from_dbfs(6.0), 4096);
        max.filter_buffer(&mut buffer);

        assert!(buffer.peak() <= max.ceiling(), "peak {} exceeds ceiling", buffer.peak());
        assert!(max.current_gain() > 1.0, "gain reduction should still be engaged");
        assert!((max.peak_sample() - from_dbfs(6.0)).abs() < 1e-2);
    }

    #[test]
    fn test_gain_recovers_after_hot_burst() {
        let mut max = Maximizer::new(48000);
        let mut hot = make_buffer(from_dbfs(6.0), 64);
        max.filter_buffer(&mut hot);
        let engaged = max.current_gain();
        assert!(engaged > 1.9);

        // Peak release first: linear decrement per frame
        let decay = max.decay();
        let mut quiet = make_buffer(0.1, 256);
        max.filter_buffer(&mut quiet);
        let after = max.current_gain();
        assert!(after < engaged);
        assert!((engaged - after - decay * 256.0).abs() < 1e-3);

        // ~200 ms of peak release plus the slow tail brings it back to unity
        let mut gain = after;
        for _ in 0..48 {
            let mut quiet = make_buffer(0.1, 256);
            max.filter_buffer(&mut quiet);
            // The final slow step may undershoot unity by one decrement
            assert!(max.current_gain() <= gain + 1e-3, "gain must not rise on quiet input");
            gain = max.current_gain();
        }
        assert_eq!(max.current_gain(), 1.0);
    }

    #[test]
    fn test_peak_sample_covers_last_pass_only() {
        let mut max = Maximizer::new(48000);
        let mut hot = make_buffer(2.0, 16);
        max.filter_buffer(&mut hot);
        assert!((max.peak_sample() - 2.0).abs() < 1e-6);

        let mut quiet = make_buffer(0.1, 16);
        max.filter_buffer(&mut quiet);
        assert!((max.peak_sample() - 0.1).abs() < 1e-6, "got {}", max.peak_sample());
    }

    #[test]
    fn test_boost_and_ceiling() {
        let mut max = Maximizer::new(48000)
            .with_boost_db(6.0)
            .with_ceiling_db(-6.0);
        let mut buffer = make_buffer(0.8, 128);
        max.filter_buffer(&mut buffer);
        assert!(buffer.peak() <= from_dbfs(-6.0) + 1e-6);
    }

    #[test]
    fn test_reset_restores_idle_envelope() {
        let mut max = Maximizer::new(48000);
        let mut hot = make_buffer(2.0, 16);
        max.filter_buffer(&mut hot);
        assert!(max.current_gain() > 1.0);

        max.reset_state();
        assert_eq!(max.current_gain(), 1.0);
        assert_eq!(max.decay(), 0.0);
        assert_eq!(max.peak_sample(), 0.0);
    }

    #[test]
    fn test_threshold_change_resets() {
        let mut max = Maximizer::new(48000);
        let mut hot = make_buffer(2.0, 16);
        max.filter_buffer(&mut hot);

        max.set_threshold_db(-3.0);
        assert_eq!(max.current_gain(), 1.0);
        assert!((max.threshold() - from_dbfs(-3.0)).abs() < 1e-6);
    }
}
