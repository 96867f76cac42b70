//! Chart model, musical clock, judgement and tracking
//!
//! A [`Chart`] is a [`Sequence`] of measures holding control changes and
//! notes. The [`Tracker`] walks a chart with a [`Clock`], applies control
//! changes, runs each note's judgement state machine against key input and
//! collects the [`NoteAudio`] the audio manager should play.
//!
//! # Example Usage
//!
//! ```ignore
//! use dueljam_core::chart::{Chart, Judge, JudgePreset, Tracker};
//!
//! let mut tracker = Tracker::new(chart, Judge::from_preset(JudgePreset::Normal), &[], None);
//! tracker.clock_mut().start();
//! while !tracker.has_chart_ended() {
//!     tracker.update();
//!     manager.play_all(&tracker.take_note_audio());
//! }
//! ```

mod cc;
mod clock;
mod judge;
mod key;
mod note;
mod pairing;
mod sequence;
mod time;
mod tracker;

pub use cc::{CcValue, Control, EventCC};
pub use clock::{Clock, FALLBACK_BPM};
pub use judge::{Judge, JudgePreset, JudgeRank, JudgeScore, DEFAULT_TICK_CEILING};
pub use key::{InputKeyStatus, NoteKey};
pub use note::{EventNote, LongNote, NoteAudio, SingleNote};
pub use pairing::{pair_long_notes, Paired, PairingRepair};
pub use sequence::{Measure, Sequence};
pub use time::{TTime, TimeSignature, DEFAULT_BEATS_PER_MEASURE, DEFAULT_TICKS_PER_BEAT};
pub use tracker::{KeyBinding, KeyCode, Scoreboard, Tracker};

/// Descriptive data about a chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartInfo {
    pub name: String,
    pub charter: String,
    pub level: u32,
    /// Starting tempo in BPM
    pub tempo: f64,
}

impl Default for ChartInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            charter: String::new(),
            level: 0,
            tempo: FALLBACK_BPM,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chart {
    pub info: ChartInfo,
    pub sequence: Sequence,
}

impl Chart {
    pub fn new(info: ChartInfo, sequence: Sequence) -> Self {
        Self { info, sequence }
    }

    pub fn sort_sequence(&mut self) {
        self.sequence.sort_elements();
    }

    pub fn cc_count(&self) -> usize {
        self.sequence.measures().iter().map(|m| m.ccs.len()).sum()
    }

    pub fn note_count(&self) -> usize {
        let (singles, longs) = self.sequence.note_counts();
        singles + longs
    }

    /// Playing time at the starting tempo, ignoring tempo changes and stops
    pub fn nominal_duration_ms(&self) -> f64 {
        let mspt = 60_000.0 / f64::from(DEFAULT_TICKS_PER_BEAT) / self.info.tempo.max(1.0);
        self.sequence.total_ticks() as f64 * mspt
    }
}
