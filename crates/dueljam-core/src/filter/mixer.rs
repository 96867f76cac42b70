//! Volume and pan stage

use std::f32::consts::PI;

use super::Filter;
use crate::types::{FrameBuffer, CHANNELS};

/// How a pan position is turned into left/right gains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum PanLaw {
    /// Linear interpolation between the channels, unity at center
    Linear,
    /// Constant power (sine/cosine)
    #[default]
    SinCos,
}

/// Per-channel gains for a volume and pan (-1.0 = hard left, 1.0 = hard right)
pub fn pan_gains(law: PanLaw, volume: f32, pan: f32) -> [f32; CHANNELS] {
    match law {
        PanLaw::Linear => {
            let r = (1.0 + pan) / 2.0;
            [2.0 * (1.0 - r) * volume, 2.0 * r * volume]
        }
        PanLaw::SinCos => {
            let p = PI * (1.0 + pan) / 4.0;
            [p.cos() * volume, p.sin() * volume]
        }
    }
}

/// Applies a cached gain pair to every frame
#[derive(Debug, Clone)]
pub struct PanMixer {
    law: PanLaw,
    volume: f32,
    pan: f32,
    gains: [f32; CHANNELS],
}

impl PanMixer {
    pub fn new() -> Self {
        Self::with_law(PanLaw::default())
    }

    pub fn with_law(law: PanLaw) -> Self {
        Self {
            law,
            volume: 1.0,
            pan: 0.0,
            gains: pan_gains(law, 1.0, 0.0),
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.recalculate();
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
        self.recalculate();
    }

    pub fn set_law(&mut self, law: PanLaw) {
        self.law = law;
        self.recalculate();
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn gains(&self) -> [f32; CHANNELS] {
        self.gains
    }

    fn recalculate(&mut self) {
        self.gains = pan_gains(self.law, self.volume, self.pan);
    }
}

impl Default for PanMixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for PanMixer {
    // Stateless
    fn reset_state(&mut self) {}

    fn filter_buffer(&mut self, buffer: &mut FrameBuffer) {
        for frame in buffer.iter_mut() {
            *frame = frame.apply_gain(self.gains);
        }
    }
}
