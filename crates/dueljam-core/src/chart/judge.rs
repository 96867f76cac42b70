//! Timing windows and scoring

use std::fmt;

use serde::{Deserialize, Serialize};

/// Verdict for a single edge, ordered worst to best (AUTO last)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JudgeRank {
    /// Too early to count
    None,
    Miss,
    Bad,
    Good,
    Cool,
    Perfect,
    /// Played by the game, not judged
    Auto,
}

impl JudgeRank {
    pub const ALL: [JudgeRank; 7] = [
        JudgeRank::None,
        JudgeRank::Miss,
        JudgeRank::Bad,
        JudgeRank::Good,
        JudgeRank::Cool,
        JudgeRank::Perfect,
        JudgeRank::Auto,
    ];

    /// Ranks that keep a combo going
    pub fn is_hit(self) -> bool {
        matches!(self, JudgeRank::Perfect | JudgeRank::Cool | JudgeRank::Good)
    }
}

impl fmt::Display for JudgeRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JudgeRank::None => "NONE",
            JudgeRank::Miss => "MISS",
            JudgeRank::Bad => "BAD",
            JudgeRank::Good => "GOOD",
            JudgeRank::Cool => "COOL",
            JudgeRank::Perfect => "PERFECT",
            JudgeRank::Auto => "AUTO",
        };
        f.write_str(name)
    }
}

/// Rank, points and the tick offset that produced them
///
/// A positive delta means the note was hit early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JudgeScore {
    pub rank: JudgeRank,
    pub score: i32,
    pub delta: i64,
}

impl JudgeScore {
    pub const fn new(rank: JudgeRank, score: i32, delta: i64) -> Self {
        Self { rank, score, delta }
    }

    pub const fn auto(delta: i64) -> Self {
        Self::new(JudgeRank::Auto, 0, delta)
    }

    pub const fn miss(delta: i64) -> Self {
        Self::new(JudgeRank::Miss, 0, delta)
    }
}

/// Named window sets in milliseconds (PERFECT, COOL, GOOD, BAD)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgePreset {
    Easy,
    #[default]
    Normal,
    Hard,
    Lunatic,
    Jikogu,
    Debug,
}

impl JudgePreset {
    pub fn windows_ms(self) -> [u32; 4] {
        match self {
            JudgePreset::Easy => [125, 150, 125, 100],
            JudgePreset::Normal => [40, 60, 80, 100],
            JudgePreset::Hard => [25, 35, 40, 50],
            JudgePreset::Lunatic => [16, 18, 22, 24],
            JudgePreset::Jikogu => [8, 10, 10, 8],
            JudgePreset::Debug => [100, 100, 100, 100],
        }
    }
}

/// Default rounding ceiling for [`Judge::calculate_timing`]
pub const DEFAULT_TICK_CEILING: i64 = 2;

// Score at the start of each band; every band ends where the next starts.
const PERFECT_TOP: i64 = 100;
const COOL_TOP: i64 = 50;
const GOOD_TOP: i64 = 25;
const BAD_TOP: i64 = 10;

/// Timing windows in milliseconds and their tick equivalents
///
/// Windows are stacked: COOL starts where PERFECT ends and so on. The tick
/// windows have to be recomputed whenever the tempo changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judge {
    windows_ms: [u32; 4],
    windows_ticks: [i64; 4],
}

impl Default for Judge {
    fn default() -> Self {
        Self::from_preset(JudgePreset::default())
    }
}

impl Judge {
    pub fn new(perfect: u32, cool: u32, good: u32, bad: u32) -> Self {
        Self {
            windows_ms: [perfect, cool, good, bad],
            windows_ticks: [0; 4],
        }
    }

    pub fn from_preset(preset: JudgePreset) -> Self {
        let [p, c, g, b] = preset.windows_ms();
        Self::new(p, c, g, b)
    }

    pub fn set_base_timing(&mut self, perfect: u32, cool: u32, good: u32, bad: u32) {
        self.windows_ms = [perfect, cool, good, bad];
    }

    pub fn windows_ms(&self) -> [u32; 4] {
        self.windows_ms
    }

    pub fn windows_ticks(&self) -> [i64; 4] {
        self.windows_ticks
    }

    /// Whole width of the hittable window in ticks
    pub fn window(&self) -> i64 {
        self.windows_ticks.iter().sum()
    }

    pub fn calculate_timing(&mut self, ms_per_tick: f64) {
        self.calculate_timing_with_ceiling(ms_per_tick, DEFAULT_TICK_CEILING);
    }

    /// Convert the ms windows to ticks at `ms_per_tick`
    ///
    /// Each window is rounded to ticks and then pushed up to the next
    /// multiple of `ceiling` (always adding at least one step).
    pub fn calculate_timing_with_ceiling(&mut self, ms_per_tick: f64, ceiling: i64) {
        let ceiling = ceiling.max(1);
        for (ticks, &ms) in self.windows_ticks.iter_mut().zip(&self.windows_ms) {
            let t = if ms_per_tick > 0.0 {
                (f64::from(ms) / ms_per_tick).round() as i64
            } else {
                0
            };
            *ticks = t + ceiling - t.rem_euclid(ceiling);
        }
        log::debug!(
            "Judge windows at {:.3} ms/tick: {:?} ticks",
            ms_per_tick,
            self.windows_ticks
        );
    }

    /// The note can still be scored; anything later than this is a miss
    pub fn is_in_scoring_range(&self, delta: i64) -> bool {
        delta < self.window()
    }

    /// Judge a hit `delta` ticks before the note (negative when late)
    ///
    /// Past the late end of the window the note is a MISS. An early hit
    /// outside the window, or one sitting exactly on the late boundary,
    /// is NONE.
    pub fn judge(&self, delta: i64) -> JudgeScore {
        if delta < -self.window() {
            return JudgeScore::miss(delta);
        }

        let offset = delta.abs();
        let bands = [
            (JudgeRank::Perfect, PERFECT_TOP, COOL_TOP),
            (JudgeRank::Cool, COOL_TOP, GOOD_TOP),
            (JudgeRank::Good, GOOD_TOP, BAD_TOP),
            (JudgeRank::Bad, BAD_TOP, 0),
        ];

        let mut start = 0;
        for (&width, (rank, top, bottom)) in self.windows_ticks.iter().zip(bands) {
            if offset < start + width {
                let score = top - (top - bottom) * (offset - start) / width;
                return JudgeScore::new(rank, score as i32, delta);
            }
            start += width;
        }

        JudgeScore::new(JudgeRank::None, 0, delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hard_at_120() -> Judge {
        let mut judge = Judge::from_preset(JudgePreset::Hard);
        judge.calculate_timing(60000.0 / 48.0 / 120.0);
        judge
    }

    #[test]
    fn test_hard_windows_at_120_bpm() {
        let judge = hard_at_120();
        assert_eq!(judge.windows_ticks(), [4, 4, 6, 6]);
        assert_eq!(judge.window(), 20);
    }

    #[test]
    fn test_bands() {
        let judge = hard_at_120();
        assert_eq!(judge.judge(0).rank, JudgeRank::Perfect);
        assert_eq!(judge.judge(0).score, 100);
        assert_eq!(judge.judge(3).rank, JudgeRank::Perfect);
        assert_eq!(judge.judge(-4).rank, JudgeRank::Cool);
        assert_eq!(judge.judge(-4).score, 50);
        assert_eq!(judge.judge(8).rank, JudgeRank::Good);
        assert_eq!(judge.judge(8).score, 25);
        assert_eq!(judge.judge(-14).rank, JudgeRank::Bad);
        assert_eq!(judge.judge(-14).score, 10);
        assert_eq!(judge.judge(19).rank, JudgeRank::Bad);
        assert_eq!(judge.judge(20).rank, JudgeRank::None);
        assert_eq!(judge.judge(500).rank, JudgeRank::None);
        assert_eq!(judge.judge(-21).rank, JudgeRank::Miss);
        assert_eq!(judge.judge(-21).score, 0);
    }

    #[test]
    fn test_late_boundary_is_none() {
        let judge = hard_at_120();
        let score = judge.judge(-20);
        assert_eq!(score.rank, JudgeRank::None);
        assert_eq!(score.delta, -20);
        assert!(judge.is_in_scoring_range(-20));
        assert!(!judge.is_in_scoring_range(20));
    }

    #[test]
    fn test_symmetric_inside_window() {
        let judge = hard_at_120();
        for d in 0..20 {
            let early = judge.judge(d);
            let late = judge.judge(-d);
            assert_eq!(early.rank, late.rank, "delta {}", d);
            assert_eq!(early.score, late.score, "delta {}", d);
            assert_eq!(late.delta, -d);
        }
    }

    #[test]
    fn test_score_never_rises_with_offset() {
        for preset in [JudgePreset::Easy, JudgePreset::Normal, JudgePreset::Lunatic, JudgePreset::Jikogu] {
            let mut judge = Judge::from_preset(preset);
            judge.calculate_timing(60000.0 / 48.0 / 173.0);
            let mut last = (JudgeRank::Perfect, 100);
            for d in 0..judge.window() {
                let s = judge.judge(d);
                assert!(s.rank <= last.0, "{:?} rank rose at {}", preset, d);
                assert!(s.score <= last.1, "{:?} score rose at {}", preset, d);
                assert!(s.score >= 0);
                last = (s.rank, s.score);
            }
        }
    }

    #[test]
    fn test_ceiling_always_steps_up() {
        let mut judge = Judge::new(10, 10, 10, 10);
        judge.calculate_timing_with_ceiling(2.5, 4);
        assert_eq!(judge.windows_ticks(), [8, 8, 8, 8], "4 ticks still step to 8");
        judge.calculate_timing_with_ceiling(2.5, 0);
        assert_eq!(judge.windows_ticks(), [5, 5, 5, 5], "ceiling clamps to 1");
    }
}
