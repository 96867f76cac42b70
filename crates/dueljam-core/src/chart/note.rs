//! Note events and their judgement state machines
//!
//! Notes are updated once per game cycle with the current tick and the
//! state of their key. An update may hand back the sample to play; scoring
//! and death are read off the note afterwards.

use std::cmp::Ordering;

use super::judge::{Judge, JudgeRank, JudgeScore};
use super::key::{InputKeyStatus, NoteKey};
use super::sequence::Sequence;
use super::time::TTime;

/// What to play when a note sounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteAudio {
    pub sample_id: u16,
    pub track_id: u8,
    pub volume: f32,
    pub pan: f32,
}

impl NoteAudio {
    pub fn new(sample_id: u16, track_id: u8) -> Self {
        Self {
            sample_id,
            track_id,
            volume: 1.0,
            pan: 0.0,
        }
    }

    /// Routed to the track of the player that owns `key`
    pub fn for_key(sample_id: u16, key: NoteKey) -> Self {
        Self::new(sample_id, key.player().unwrap_or(0))
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_pan(mut self, pan: f32) -> Self {
        self.pan = pan.clamp(-1.0, 1.0);
        self
    }
}

fn is_final(score: &JudgeScore) -> bool {
    matches!(score.rank, JudgeRank::Miss | JudgeRank::Auto)
}

/// A tap note
#[derive(Debug, Clone, PartialEq)]
pub struct SingleNote {
    pub key: NoteKey,
    pub time: TTime,
    pub audio: NoteAudio,
    tick: i64,
    score: Option<JudgeScore>,
    dead: bool,
}

impl SingleNote {
    pub fn new(key: NoteKey, time: TTime, audio: NoteAudio) -> Self {
        Self {
            key,
            time,
            audio,
            tick: 0,
            score: None,
            dead: false,
        }
    }

    /// Resolve the absolute tick of the note and clear any judgement
    pub fn init(&mut self, sequence: &Sequence) {
        self.tick = sequence.tick_distance(TTime::ZERO, self.time);
        self.score = None;
        self.dead = false;
    }

    pub fn tick(&self) -> i64 {
        self.tick
    }

    pub fn score(&self) -> Option<JudgeScore> {
        self.score
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn update(
        &mut self,
        judge: &Judge,
        now_tick: i64,
        status: InputKeyStatus,
    ) -> Option<NoteAudio> {
        if self.dead {
            return None;
        }

        let verdict = judge.judge(self.tick - now_tick);
        match status {
            InputKeyStatus::Auto => {
                self.score = Some(JudgeScore::auto(verdict.delta));
                self.dead = true;
                Some(self.audio)
            }
            InputKeyStatus::On => {
                // An early press still sounds but leaves the note alone
                if verdict.rank != JudgeRank::None {
                    self.score = Some(verdict);
                    self.dead = true;
                }
                Some(self.audio)
            }
            InputKeyStatus::Off | InputKeyStatus::Locked => {
                if verdict.rank == JudgeRank::Miss {
                    self.score = Some(verdict);
                    self.dead = true;
                }
                None
            }
        }
    }
}

/// A hold note judged at its begin and end edges
#[derive(Debug, Clone, PartialEq)]
pub struct LongNote {
    pub key: NoteKey,
    pub begin: TTime,
    pub end: TTime,
    pub begin_audio: NoteAudio,
    pub end_audio: NoteAudio,
    begin_tick: i64,
    end_tick: i64,
    begin_score: Option<JudgeScore>,
    end_score: Option<JudgeScore>,
    score: Option<JudgeScore>,
    dead: bool,
}

impl LongNote {
    pub fn new(
        key: NoteKey,
        begin: TTime,
        end: TTime,
        begin_audio: NoteAudio,
        end_audio: NoteAudio,
    ) -> Self {
        Self {
            key,
            begin,
            end,
            begin_audio,
            end_audio,
            begin_tick: 0,
            end_tick: 0,
            begin_score: None,
            end_score: None,
            score: None,
            dead: false,
        }
    }

    /// Join a hold and its release into one note
    pub fn from_pair(hold: &SingleNote, release: &SingleNote) -> Self {
        Self::new(hold.key, hold.time, release.time, hold.audio, release.audio)
    }

    pub fn init(&mut self, sequence: &Sequence) {
        self.begin_tick = sequence.tick_distance(TTime::ZERO, self.begin);
        self.end_tick = sequence.tick_distance(TTime::ZERO, self.end);
        self.begin_score = None;
        self.end_score = None;
        self.score = None;
        self.dead = false;
    }

    pub fn begin_tick(&self) -> i64 {
        self.begin_tick
    }

    pub fn end_tick(&self) -> i64 {
        self.end_tick
    }

    pub fn begin_score(&self) -> Option<JudgeScore> {
        self.begin_score
    }

    pub fn end_score(&self) -> Option<JudgeScore> {
        self.end_score
    }

    /// Combined score: rank of the end edge, points and deltas summed
    pub fn score(&self) -> Option<JudgeScore> {
        self.score
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Sample for the edge currently being played
    pub fn audio(&self) -> NoteAudio {
        if self.end_score.is_none() {
            self.begin_audio
        } else {
            self.end_audio
        }
    }

    fn combine(&mut self) {
        if let (Some(b), Some(e)) = (self.begin_score, self.end_score) {
            self.score = Some(JudgeScore::new(e.rank, b.score + e.score, b.delta + e.delta));
        }
    }

    fn settle(&mut self, verdict: JudgeScore) {
        self.begin_score = Some(verdict);
        self.end_score = Some(verdict);
        self.combine();
    }

    pub fn update(
        &mut self,
        judge: &Judge,
        now_tick: i64,
        status: InputKeyStatus,
    ) -> Option<NoteAudio> {
        if self.dead {
            return None;
        }

        let begin = judge.judge(self.begin_tick - now_tick);
        let end = judge.judge(self.end_tick - now_tick);

        // Scored notes linger until the end edge has fully passed
        if self.score.is_some() {
            if end.rank == JudgeRank::Miss {
                self.dead = true;
            }
            return None;
        }

        match status {
            InputKeyStatus::Auto => {
                let mut audio = None;
                if self.begin_score.is_none() {
                    self.begin_score = Some(JudgeScore::auto(begin.delta));
                    audio = Some(self.begin_audio);
                }
                if self.end_score.is_none() {
                    self.end_score = Some(JudgeScore::auto(end.delta));
                }
                if end.delta <= 0 {
                    self.score = Some(JudgeScore::auto(0));
                    self.dead = true;
                }
                audio
            }
            InputKeyStatus::Locked => {
                if self.end_score.is_none() {
                    match self.begin_score {
                        Some(b) if !is_final(&b) => {
                            // Held past the end of the window
                            if end.rank == JudgeRank::Miss {
                                self.end_score = Some(end);
                                self.combine();
                                self.dead = true;
                            }
                        }
                        Some(b) => {
                            self.end_score = Some(b);
                            self.combine();
                        }
                        None => {
                            if begin.rank == JudgeRank::Miss {
                                self.settle(begin);
                            }
                        }
                    }
                }
                None
            }
            InputKeyStatus::Off => {
                match (self.begin_score, self.end_score) {
                    (None, _) => {
                        if begin.rank == JudgeRank::Miss {
                            self.settle(begin);
                        }
                    }
                    (Some(b), _) if is_final(&b) => {
                        if end.rank == JudgeRank::Miss {
                            self.dead = true;
                        }
                    }
                    (Some(_), None) => {
                        // Released too early counts as a miss
                        let verdict = if end.rank == JudgeRank::None {
                            JudgeScore::miss(end.delta)
                        } else {
                            end
                        };
                        self.end_score = Some(verdict);
                        self.combine();
                    }
                    (Some(_), Some(_)) => {
                        if end.rank == JudgeRank::Miss {
                            self.dead = true;
                        }
                    }
                }
                None
            }
            InputKeyStatus::On => match (self.begin_score, self.end_score) {
                (None, _) => {
                    match begin.rank {
                        JudgeRank::None => {}
                        JudgeRank::Miss | JudgeRank::Auto => self.settle(begin),
                        _ => self.begin_score = Some(begin),
                    }
                    Some(self.begin_audio)
                }
                (Some(_), None) => {
                    if end.rank == JudgeRank::Miss {
                        self.end_score = Some(end);
                        self.combine();
                        self.dead = true;
                        None
                    } else {
                        Some(self.audio())
                    }
                }
                (Some(_), Some(_)) => None,
            },
        }
    }
}

/// Either kind of note, as scheduled by the tracker
#[derive(Debug, Clone, PartialEq)]
pub enum EventNote {
    Single(SingleNote),
    Long(LongNote),
}

impl EventNote {
    pub fn key(&self) -> NoteKey {
        match self {
            EventNote::Single(n) => n.key,
            EventNote::Long(n) => n.key,
        }
    }

    /// Time the note starts
    pub fn time(&self) -> TTime {
        match self {
            EventNote::Single(n) => n.time,
            EventNote::Long(n) => n.begin,
        }
    }

    pub fn init(&mut self, sequence: &Sequence) {
        match self {
            EventNote::Single(n) => n.init(sequence),
            EventNote::Long(n) => n.init(sequence),
        }
    }

    pub fn score(&self) -> Option<JudgeScore> {
        match self {
            EventNote::Single(n) => n.score(),
            EventNote::Long(n) => n.score(),
        }
    }

    pub fn is_scored(&self) -> bool {
        self.score().is_some()
    }

    pub fn is_dead(&self) -> bool {
        match self {
            EventNote::Single(n) => n.is_dead(),
            EventNote::Long(n) => n.is_dead(),
        }
    }

    pub fn update(
        &mut self,
        judge: &Judge,
        now_tick: i64,
        status: InputKeyStatus,
    ) -> Option<NoteAudio> {
        match self {
            EventNote::Single(n) => n.update(judge, now_tick, status),
            EventNote::Long(n) => n.update(judge, now_tick, status),
        }
    }

    /// Order by start time, then by key
    pub fn chronological(a: &EventNote, b: &EventNote) -> Ordering {
        a.time().cmp(&b.time()).then_with(|| a.key().cmp(&b.key()))
    }
}
