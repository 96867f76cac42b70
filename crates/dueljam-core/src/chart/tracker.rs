//! Chart tracking: clock, control changes, notes and scoring

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::cc::{Control, EventCC};
use super::clock::Clock;
use super::judge::{Judge, JudgeRank, JudgeScore};
use super::key::{InputKeyStatus, NoteKey};
use super::note::{EventNote, NoteAudio};
use super::sequence::Sequence;
use super::time::TTime;
use super::Chart;

/// Device key code as reported by the input layer
pub type KeyCode = u32;

/// A lane bound to a physical key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyBinding {
    pub key: NoteKey,
    pub code: KeyCode,
}

impl KeyBinding {
    pub fn new(key: NoteKey, code: KeyCode) -> Self {
        Self { key, code }
    }
}

/// Judgement tally for a play
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scoreboard {
    ranks: BTreeMap<JudgeRank, u32>,
    points: i64,
    combo: u32,
    max_combo: u32,
}

impl Scoreboard {
    pub fn record(&mut self, score: &JudgeScore) {
        *self.ranks.entry(score.rank).or_default() += 1;
        self.points += i64::from(score.score);
        match score.rank {
            rank if rank.is_hit() => {
                self.combo += 1;
                self.max_combo = self.max_combo.max(self.combo);
            }
            JudgeRank::Bad | JudgeRank::Miss => self.combo = 0,
            _ => {}
        }
    }

    pub fn count(&self, rank: JudgeRank) -> u32 {
        self.ranks.get(&rank).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.ranks.values().sum()
    }

    pub fn points(&self) -> i64 {
        self.points
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }
}

#[derive(Debug, Clone)]
struct Channel {
    key: NoteKey,
    code: Option<KeyCode>,
    status: InputKeyStatus,
    notes: Vec<EventNote>,
    next: usize,
}

/// Shared state a channel needs while stepping its notes
struct Step<'a> {
    judge: &'a Judge,
    tick: i64,
    audio: &'a mut Vec<NoteAudio>,
    board: &'a mut Scoreboard,
}

impl Channel {
    fn is_autoplay(&self, global: bool) -> bool {
        global || self.key.is_autoplay() || self.code.is_none()
    }

    /// Update the next note once; true if it is finished with
    fn update_next(&mut self, step: &mut Step<'_>, status: InputKeyStatus) -> bool {
        let Some(note) = self.notes.get_mut(self.next) else {
            return false;
        };
        if let Some(audio) = note.update(step.judge, step.tick, status) {
            step.audio.push(audio);
        }
        if !(note.is_scored() || note.is_dead()) {
            return false;
        }
        if let Some(score) = note.score() {
            step.board.record(&score);
        }
        self.next += 1;
        true
    }

    /// Play every due note of an autoplay channel
    fn run_autoplay(&mut self, step: &mut Step<'_>, now: TTime) {
        while self.notes.get(self.next).is_some_and(|n| n.time() <= now) {
            if !self.update_next(step, InputKeyStatus::Auto) {
                break;
            }
        }
    }

    /// Resolve notes against the held key state
    fn run_held(&mut self, step: &mut Step<'_>) {
        let status = self.status;
        while self.update_next(step, status) {}
    }
}

/// Walks a chart in time, judging input and emitting note audio
pub struct Tracker {
    judge: Judge,
    scoreboard: Scoreboard,
    chart: Chart,
    ccs: Vec<EventCC>,
    next_cc: usize,
    channels: Vec<Channel>,
    note_audio: Vec<NoteAudio>,
    clock: Clock,
    current_tick: i64,
    chart_ended: bool,
    autoplay: bool,
    speed_x: f32,
}

impl Tracker {
    /// Prepare `chart` for play
    ///
    /// Without a clock one is created, stopped, at the chart's tempo. The
    /// clock has to be started before time moves. An empty binding list
    /// plays the whole chart automatically.
    pub fn new(
        mut chart: Chart,
        mut judge: Judge,
        bindings: &[KeyBinding],
        clock: Option<Clock>,
    ) -> Self {
        let mut clock = clock.unwrap_or_else(|| Clock::new(chart.info.tempo, false));
        judge.calculate_timing(clock.mspt());

        chart.sequence.populate_indices();
        clock.set_measure_signatures(
            chart.sequence.measures().iter().map(|m| m.signature()).collect(),
        );

        let mut ccs = chart.sequence.extract_ccs();
        for cc in &mut ccs {
            cc.rearm();
        }

        let mut notes = chart.sequence.extract_notes();
        for note in &mut notes {
            note.init(&chart.sequence);
        }

        let mut bound: Vec<KeyBinding> = Vec::with_capacity(bindings.len());
        for binding in bindings {
            if let Some(prev) = bound.iter().find(|b| b.key == binding.key) {
                log::warn!(
                    "Lane {} already bound to key {}, ignoring key {}",
                    binding.key,
                    prev.code,
                    binding.code
                );
                continue;
            }
            if let Some(prev) = bound.iter().find(|b| b.code == binding.code) {
                log::warn!(
                    "Key {} already bound to lane {}, ignoring lane {}",
                    binding.code,
                    prev.key,
                    binding.key
                );
                continue;
            }
            bound.push(*binding);
        }
        let autoplay = bound.is_empty();

        let mut lanes: BTreeMap<NoteKey, Vec<EventNote>> = BTreeMap::new();
        for binding in &bound {
            lanes.entry(binding.key).or_default();
        }
        for note in notes {
            lanes.entry(note.key()).or_default().push(note);
        }
        let channels: Vec<Channel> = lanes
            .into_iter()
            .map(|(key, notes)| Channel {
                key,
                code: bound.iter().find(|b| b.key == key).map(|b| b.code),
                status: InputKeyStatus::Off,
                notes,
                next: 0,
            })
            .collect();

        log::info!(
            "Tracking \"{}\": {} measures, {} CCs, {} lanes ({} bound){}",
            chart.info.name,
            chart.sequence.len(),
            ccs.len(),
            channels.len(),
            bound.len(),
            if autoplay { ", autoplay" } else { "" }
        );

        Self {
            judge,
            scoreboard: Scoreboard::default(),
            chart,
            ccs,
            next_cc: 0,
            channels,
            note_audio: Vec::new(),
            clock,
            current_tick: -1,
            chart_ended: false,
            autoplay,
            speed_x: 1.0,
        }
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    pub fn sequence(&self) -> &Sequence {
        &self.chart.sequence
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    pub fn judge(&self) -> &Judge {
        &self.judge
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn ccs(&self) -> &[EventCC] {
        &self.ccs
    }

    pub fn time(&self) -> TTime {
        self.clock.time()
    }

    pub fn current_tick(&self) -> i64 {
        self.current_tick
    }

    pub fn has_chart_ended(&self) -> bool {
        self.chart_ended
    }

    pub fn is_autoplay(&self) -> bool {
        self.autoplay
    }

    pub fn set_autoplay(&mut self, autoplay: bool) {
        self.autoplay = autoplay;
    }

    pub fn speed_x(&self) -> f32 {
        self.speed_x
    }

    /// Notes not yet played or judged
    pub fn pending_notes(&self) -> usize {
        self.channels.iter().map(|c| c.notes.len() - c.next).sum()
    }

    /// Audio emitted since the last call
    pub fn take_note_audio(&mut self) -> Vec<NoteAudio> {
        std::mem::take(&mut self.note_audio)
    }

    /// Advance by wall time and process everything that became due
    pub fn update(&mut self) {
        let running = self.clock.update();
        self.catch_up(running);
    }

    /// Advance by `ms` milliseconds and process everything that became due
    pub fn advance(&mut self, ms: f64) {
        let running = self.clock.advance(ms);
        self.catch_up(running);
    }

    /// Process the current position, then resume a clock that halted on
    /// an interrupt until it has spent its pending time
    fn catch_up(&mut self, mut running: bool) {
        self.process();
        while !running && !self.chart_ended {
            running = self.clock.advance(0.0);
            self.process();
        }
    }

    fn process(&mut self) {
        if self.chart_ended {
            return;
        }
        let time = self.clock.time();
        if time.measure as usize >= self.chart.sequence.len() {
            log::info!(
                "Chart ended at {}: {} judged, max combo {}",
                time,
                self.scoreboard.total(),
                self.scoreboard.max_combo()
            );
            self.chart_ended = true;
            return;
        }

        self.current_tick = self.chart.sequence.tick_distance(TTime::ZERO, time);
        let signature = self.chart.sequence.signature_of(time.measure);
        self.clock.set_signature(signature);

        self.update_ccs(time);
        self.update_notes(time);
    }

    fn update_ccs(&mut self, now: TTime) {
        while let Some(cc) = self.ccs.get(self.next_cc) {
            if cc.time > now {
                break;
            }
            if cc.time < now {
                log::warn!("{} at {} not handled on time (now {})", cc.control, cc.time, now);
            }
            self.apply_cc(self.next_cc);
            self.next_cc += 1;
        }

        if let Some(next) = self.ccs.get(self.next_cc) {
            let armed = self
                .clock
                .interrupt()
                .is_some_and(|at| at >= now && at <= next.time);
            if !armed {
                self.clock.set_interrupt(next.time);
            }
        }
    }

    fn apply_cc(&mut self, index: usize) {
        let cc = &mut self.ccs[index];
        cc.mark_consumed();
        match cc.control {
            Control::Tempo => {
                let bpm = f64::from(cc.value.as_f32());
                self.clock.set_tempo(bpm);
                self.judge.calculate_timing(self.clock.mspt());
                log::debug!("Tempo {} at {}", self.clock.tempo(), cc.time);
            }
            Control::StopTicks => {
                let ticks = cc.value.as_i32().max(0) as u32;
                self.clock.set_stop_ticks(ticks);
                log::debug!("Stop for {} ticks at {}", ticks, cc.time);
            }
            Control::SpeedX => {
                self.speed_x = cc.value.as_f32();
            }
            other => {
                log::warn!("Ignoring {} at {}", other, cc.time);
            }
        }
    }

    fn update_notes(&mut self, now: TTime) {
        let mut step = Step {
            judge: &self.judge,
            tick: self.current_tick,
            audio: &mut self.note_audio,
            board: &mut self.scoreboard,
        };
        for channel in &mut self.channels {
            if channel.is_autoplay(self.autoplay) {
                channel.run_autoplay(&mut step, now);
            } else {
                channel.run_held(&mut step);
            }
        }
    }

    /// Press the key with `code`
    ///
    /// The press is applied to the next pending note of its lane and then
    /// locked until release. Returns false if no playable lane uses the key.
    pub fn key_down(&mut self, code: KeyCode) -> bool {
        let tick = self.current_tick;
        let Some(channel) = self
            .channels
            .iter_mut()
            .find(|c| c.code == Some(code) && !c.is_autoplay(self.autoplay))
        else {
            return false;
        };

        if channel.status.is_off() {
            channel.status.turn_on();
            let mut step = Step {
                judge: &self.judge,
                tick,
                audio: &mut self.note_audio,
                board: &mut self.scoreboard,
            };
            channel.update_next(&mut step, InputKeyStatus::On);
            channel.status.try_lock();
        }
        true
    }

    /// Release the key with `code`
    pub fn key_up(&mut self, code: KeyCode) -> bool {
        let tick = self.current_tick;
        let Some(channel) = self
            .channels
            .iter_mut()
            .find(|c| c.code == Some(code) && !c.is_autoplay(self.autoplay))
        else {
            return false;
        };

        channel.status.turn_off();
        let mut step = Step {
            judge: &self.judge,
            tick,
            audio: &mut self.note_audio,
            board: &mut self.scoreboard,
        };
        channel.run_held(&mut step);
        true
    }

    /// Whether the lane of `code` is currently held
    pub fn is_key_held(&self, code: KeyCode) -> bool {
        self.channels
            .iter()
            .any(|c| c.code == Some(code) && c.status.is_on())
    }
}
