//! Control change events

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::time::TTime;

/// What a control change acts on, with its wire code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Control {
    /// Tempo in BPM (float)
    Tempo,
    /// Beats per measure
    TimeSignatureA,
    /// Ticks per beat
    TimeSignatureB,
    /// Measure length scale (float)
    TimeSignatureZ,
    /// Stop for a number of ticks (int)
    StopTicks,
    /// Stop for a number of milliseconds
    StopReal,
    /// Scroll speed multiplier (float)
    SpeedX,
    AudioVolume,
    AudioPan,
    /// Codes this engine does not know; kept so they can be reported
    Unknown(u16),
}

impl Control {
    pub fn code(self) -> u16 {
        match self {
            Control::Tempo => 0x0310,
            Control::TimeSignatureA => 0x0321,
            Control::TimeSignatureB => 0x0322,
            Control::TimeSignatureZ => 0x0324,
            Control::StopTicks => 0x0325,
            Control::StopReal => 0x0326,
            Control::SpeedX => 0x0D10,
            Control::AudioVolume => 0x0111,
            Control::AudioPan => 0x0112,
            Control::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            0x0310 => Control::Tempo,
            0x0321 => Control::TimeSignatureA,
            0x0322 => Control::TimeSignatureB,
            0x0324 => Control::TimeSignatureZ,
            0x0325 => Control::StopTicks,
            0x0326 => Control::StopReal,
            0x0D10 => Control::SpeedX,
            0x0111 => Control::AudioVolume,
            0x0112 => Control::AudioPan,
            other => Control::Unknown(other),
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::Unknown(code) => write!(f, "unknown control {:#06x}", code),
            known => write!(f, "{:?} ({:#06x})", known, known.code()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CcValue {
    Float(f32),
    Int(i32),
}

impl CcValue {
    pub fn as_f32(self) -> f32 {
        match self {
            CcValue::Float(v) => v,
            CcValue::Int(v) => v as f32,
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            CcValue::Float(v) => v.round() as i32,
            CcValue::Int(v) => v,
        }
    }
}

/// A timed control change
#[derive(Debug, Clone, PartialEq)]
pub struct EventCC {
    pub time: TTime,
    pub control: Control,
    pub value: CcValue,
    consumed: bool,
}

impl EventCC {
    pub fn new(time: TTime, control: Control, value: CcValue) -> Self {
        Self {
            time,
            control,
            value,
            consumed: false,
        }
    }

    pub fn tempo(time: TTime, bpm: f32) -> Self {
        Self::new(time, Control::Tempo, CcValue::Float(bpm))
    }

    pub fn stop(time: TTime, ticks: i32) -> Self {
        Self::new(time, Control::StopTicks, CcValue::Int(ticks))
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    pub fn mark_consumed(&mut self) {
        self.consumed = true;
    }

    /// Make the event eligible for processing again
    pub fn rearm(&mut self) {
        self.consumed = false;
    }

    /// Order by time, then by control code
    pub fn chronological(a: &EventCC, b: &EventCC) -> Ordering {
        a.time
            .cmp(&b.time)
            .then_with(|| a.control.code().cmp(&b.control.code()))
    }
}
