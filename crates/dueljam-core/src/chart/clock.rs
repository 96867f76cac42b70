//! Tick clock driven by wall time
//!
//! The clock converts elapsed milliseconds into ticks and keeps the chart
//! position as measure, beat and tick. Stops swallow ticks, and an
//! interrupt halts the clock exactly on a position so the caller can act
//! on it before time moves on.

use std::time::Instant;

use super::time::{TTime, TimeSignature, DEFAULT_TICKS_PER_BEAT};

/// Tempo used when a chart asks for a negative one
pub const FALLBACK_BPM: f64 = 120.0;

/// Milliseconds per tick at 1 BPM
const TEMPO_BASE: f64 = 60_000.0 / DEFAULT_TICKS_PER_BEAT as f64;

#[derive(Debug, Clone)]
pub struct Clock {
    signature: TimeSignature,
    measure_signatures: Vec<TimeSignature>,
    bpm: f64,
    /// Milliseconds per tick
    mspt: f64,
    /// Milliseconds left until the next tick
    ms_to_tick: f64,
    total_ticks: u64,
    stop_ticks: u32,
    ticking: bool,
    time: TTime,
    interrupt: Option<TTime>,
    last_update: Instant,
}

impl Clock {
    pub fn new(bpm: f64, start_now: bool) -> Self {
        let mut clock = Self {
            signature: TimeSignature::default(),
            measure_signatures: Vec::new(),
            bpm: FALLBACK_BPM,
            mspt: TEMPO_BASE / FALLBACK_BPM,
            ms_to_tick: 0.0,
            total_ticks: 0,
            stop_ticks: 0,
            ticking: false,
            time: TTime::ZERO,
            interrupt: None,
            last_update: Instant::now(),
        };
        clock.reset(bpm, start_now);
        clock
    }

    /// Rewind to one tick before `0:0:0`
    ///
    /// The interrupt is armed on `0:0:0` so events on the very first tick
    /// are seen.
    pub fn reset(&mut self, bpm: f64, start_now: bool) {
        let bpm = if bpm < 0.0 || !bpm.is_finite() {
            log::warn!("Invalid tempo {}, using {}", bpm, FALLBACK_BPM);
            FALLBACK_BPM
        } else {
            bpm
        };
        self.signature = TimeSignature::default();
        self.bpm = bpm;
        self.mspt = Self::ms_per_tick(bpm);
        self.ms_to_tick = self.mspt;
        self.total_ticks = 0;
        self.stop_ticks = 0;
        self.ticking = start_now;
        self.time = TTime::new(0, 0, -1);
        self.interrupt = Some(TTime::ZERO);
        self.last_update = Instant::now();
    }

    fn ms_per_tick(bpm: f64) -> f64 {
        if bpm > 0.0 {
            TEMPO_BASE / bpm
        } else {
            f64::INFINITY
        }
    }

    /// Advance by the wall time since the last update
    ///
    /// Returns false if the clock halted on its interrupt.
    pub fn update(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64() * 1000.0;
        self.last_update = now;
        self.advance(if self.ticking { elapsed } else { 0.0 })
    }

    /// Advance by `ms` milliseconds
    ///
    /// Returns false if the clock halted on its interrupt; the remaining
    /// time is kept and consumed by the next call.
    pub fn advance(&mut self, ms: f64) -> bool {
        if self.ticking {
            self.ms_to_tick -= ms;
        }

        while self.stop_ticks > 0 && self.ms_to_tick <= 0.0 {
            self.ms_to_tick += self.mspt;
            self.stop_ticks -= 1;
        }

        while self.ms_to_tick <= 0.0 {
            self.time.tick += 1;
            self.total_ticks += 1;
            self.ms_to_tick += self.mspt;
            self.roll_over();

            if self.interrupt == Some(self.time) {
                self.interrupt = None;
                return false;
            }
        }
        true
    }

    fn roll_over(&mut self) {
        let per_beat = self.signature.ticks_per_beat.max(1) as i32;
        while self.time.tick >= per_beat {
            self.time.tick -= per_beat;
            self.time.beat += 1;
        }
        while self.time.beat >= self.signature.beats.max(1) {
            self.time.beat -= self.signature.beats.max(1);
            self.time.measure += 1;
            if let Some(&next) = self.measure_signatures.get(self.time.measure as usize) {
                self.signature = next;
            }
        }
    }

    /// Start counting from the next update, ticking at once
    pub fn start(&mut self) {
        self.ticking = true;
        self.ms_to_tick = 0.0;
        self.last_update = Instant::now();
    }

    pub fn pause(&mut self) {
        self.ticking = false;
    }

    pub fn unpause(&mut self) {
        if !self.ticking {
            self.ticking = true;
            self.last_update = Instant::now();
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    /// Change tempo, keeping the progress into the current tick
    pub fn set_tempo(&mut self, bpm: f64) {
        if bpm <= 0.0 || !bpm.is_finite() {
            log::warn!("Ignoring tempo change to {}", bpm);
            return;
        }
        self.ms_to_tick -= self.mspt;
        self.bpm = bpm;
        self.mspt = Self::ms_per_tick(bpm);
        self.ms_to_tick += self.mspt;
    }

    pub fn tempo(&self) -> f64 {
        self.bpm
    }

    pub fn mspt(&self) -> f64 {
        self.mspt
    }

    pub fn ms_to_next_tick(&self) -> f64 {
        self.ms_to_tick
    }

    pub fn set_signature(&mut self, signature: TimeSignature) {
        self.signature = signature;
    }

    pub fn signature(&self) -> TimeSignature {
        self.signature
    }

    /// Signatures to switch to as each measure is entered
    pub fn set_measure_signatures(&mut self, signatures: Vec<TimeSignature>) {
        if let Some(&current) = signatures.get(self.time.measure as usize) {
            self.signature = current;
        }
        self.measure_signatures = signatures;
    }

    /// Hold the position for `ticks` ticks
    pub fn set_stop_ticks(&mut self, ticks: u32) {
        self.stop_ticks = ticks;
    }

    pub fn stop_ticks(&self) -> u32 {
        self.stop_ticks
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_ticks > 0
    }

    pub fn set_interrupt(&mut self, time: TTime) {
        self.interrupt = Some(time);
    }

    pub fn clear_interrupt(&mut self) {
        self.interrupt = None;
    }

    pub fn interrupt(&self) -> Option<TTime> {
        self.interrupt
    }

    pub fn time(&self) -> TTime {
        self.time
    }

    /// Ticks counted since the last reset, stops excluded
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Ticks elapsed in the current measure
    pub fn ticks_since_measure(&self) -> i64 {
        i64::from(self.time.beat) * i64::from(self.signature.ticks_per_beat)
            + i64::from(self.time.tick)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(FALLBACK_BPM, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Started clock sitting half a tick past `0:0:0`
    fn started(bpm: f64) -> Clock {
        let mut clock = Clock::new(bpm, false);
        clock.start();
        let half = clock.mspt() / 2.0;
        assert!(!clock.advance(half), "halts on 0:0:0");
        assert_eq!(clock.time(), TTime::ZERO);
        assert!(clock.advance(0.0));
        clock
    }

    #[test]
    fn test_reset_state() {
        let clock = Clock::new(-5.0, false);
        assert_eq!(clock.tempo(), FALLBACK_BPM);
        assert!((clock.mspt() - 10.416_666).abs() < 1e-4);
        assert_eq!(clock.time(), TTime::new(0, 0, -1));
        assert_eq!(clock.interrupt(), Some(TTime::ZERO));
        assert!(!clock.is_ticking());
        assert_eq!(clock.total_ticks(), 0);
    }

    #[test]
    fn test_paused_clock_holds() {
        let mut clock = Clock::new(120.0, false);
        assert!(clock.advance(1000.0));
        assert_eq!(clock.time(), TTime::new(0, 0, -1));
    }

    #[test]
    fn test_ticks_roll_into_beats_and_measures() {
        let mut clock = started(120.0);
        let mspt = clock.mspt();
        clock.advance(mspt * 47.0);
        assert_eq!(clock.time(), TTime::new(0, 0, 47));
        clock.advance(mspt);
        assert_eq!(clock.time(), TTime::new(0, 1, 0));
        clock.advance(mspt * 144.0);
        assert_eq!(clock.time(), TTime::new(1, 0, 0));
        assert_eq!(clock.total_ticks(), 193);
        assert_eq!(clock.ticks_since_measure(), 0);
    }

    #[test]
    fn test_measure_signatures_follow_position() {
        let mut clock = started(120.0);
        clock.set_measure_signatures(vec![TimeSignature::new(2, 48), TimeSignature::new(3, 24)]);
        let mspt = clock.mspt();
        clock.advance(mspt * 96.0);
        assert_eq!(clock.time(), TTime::new(1, 0, 0));
        assert_eq!(clock.signature(), TimeSignature::new(3, 24));
        clock.advance(mspt * 72.0);
        assert_eq!(clock.time(), TTime::new(2, 0, 0));
        clock.advance(mspt * 30.0);
        assert_eq!(clock.time(), TTime::new(2, 1, 6), "last signature carries on");
    }

    #[test]
    fn test_stop_swallows_ticks() {
        let mut clock = started(120.0);
        let mspt = clock.mspt();
        clock.set_stop_ticks(10);
        assert!(clock.is_stopped());
        clock.advance(mspt * 4.0);
        assert_eq!(clock.time(), TTime::ZERO);
        assert_eq!(clock.stop_ticks(), 6);
        clock.advance(mspt * 8.0);
        assert_eq!(clock.time(), TTime::new(0, 0, 2));
        assert!(!clock.is_stopped());
    }

    #[test]
    fn test_tempo_change_keeps_phase() {
        let mut clock = started(120.0);
        let old = clock.mspt();
        let before = clock.ms_to_next_tick();
        clock.set_tempo(240.0);
        assert!((clock.mspt() - old / 2.0).abs() < 1e-9);
        assert!((clock.ms_to_next_tick() - (before - old / 2.0)).abs() < 1e-9);

        // The next tick is due right away, then 48 more at the new rate
        clock.advance(clock.mspt() * 48.5);
        assert_eq!(clock.time(), TTime::new(0, 1, 1));

        clock.set_tempo(0.0);
        assert_eq!(clock.tempo(), 240.0, "non-positive tempo ignored");
    }

    #[test]
    fn test_interrupt_halts_on_position() {
        let mut clock = started(120.0);
        let mspt = clock.mspt();
        clock.set_interrupt(TTime::new(0, 0, 10));
        assert!(!clock.advance(mspt * 20.0));
        assert_eq!(clock.time(), TTime::new(0, 0, 10));
        assert_eq!(clock.interrupt(), None);

        // The rest of the elapsed time is still owed
        assert!(clock.advance(0.0));
        assert_eq!(clock.time(), TTime::new(0, 0, 20));
    }

    #[test]
    fn test_pause_and_unpause() {
        let mut clock = started(120.0);
        let mspt = clock.mspt();
        clock.pause();
        clock.advance(mspt * 10.0);
        assert_eq!(clock.time(), TTime::ZERO);
        clock.unpause();
        clock.advance(mspt * 10.0);
        assert_eq!(clock.time(), TTime::new(0, 0, 10));
    }
}
