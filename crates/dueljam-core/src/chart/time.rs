//! Musical time: positions and time signatures

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ticks per beat of the standard 4/4 measure
pub const DEFAULT_TICKS_PER_BEAT: u32 = 48;

/// Beats per measure of the standard 4/4 measure
pub const DEFAULT_BEATS_PER_MEASURE: u32 = 4;

/// Ticks in a measure of scale 1.0
const TICKS_PER_WHOLE: f64 = (DEFAULT_TICKS_PER_BEAT * DEFAULT_BEATS_PER_MEASURE) as f64;

/// Position in a chart as measure, beat and tick
///
/// Ordered measure-major, then beat, then tick. The tick is signed so a
/// clock can sit one tick before `0:0:0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TTime {
    pub measure: u32,
    pub beat: u32,
    pub tick: i32,
}

impl TTime {
    pub const ZERO: TTime = TTime {
        measure: 0,
        beat: 0,
        tick: 0,
    };

    pub const fn new(measure: u32, beat: u32, tick: i32) -> Self {
        Self { measure, beat, tick }
    }
}

impl fmt::Display for TTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.measure, self.beat, self.tick)
    }
}

/// Beats per measure (A) and ticks per beat (B)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSignature {
    pub beats: u32,
    pub ticks_per_beat: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats: DEFAULT_BEATS_PER_MEASURE,
            ticks_per_beat: DEFAULT_TICKS_PER_BEAT,
        }
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl TimeSignature {
    pub const fn new(beats: u32, ticks_per_beat: u32) -> Self {
        Self { beats, ticks_per_beat }
    }

    /// Ticks in one measure (A·B)
    pub fn tick_count(&self) -> u32 {
        self.beats * self.ticks_per_beat
    }

    /// Signature of a measure stretched by `scale` (1.0 is four beats)
    ///
    /// The measure keeps the standard tick length, so its tick count is
    /// `round(scale · 192)`, split into as few beats as evenly divide it.
    /// Returns None for scales that leave no ticks.
    pub fn from_measure_scale(scale: f64) -> Option<Self> {
        if !scale.is_finite() {
            return None;
        }
        let ticks = (scale * TICKS_PER_WHOLE).round();
        if ticks < 1.0 || ticks > f64::from(u32::MAX) {
            return None;
        }
        let ticks = ticks as u32;
        let per_beat = gcd(ticks, DEFAULT_TICKS_PER_BEAT);
        Some(Self::new(ticks / per_beat, per_beat))
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.ticks_per_beat)
    }
}
