//! Peak / RMS meter with an overclip indicator
//!
//! The meter lives inside a track's rack and is owned by the render thread.
//! Readings are mirrored into [`MeterReadings`] so other threads can poll
//! them without touching the track's output lock.

use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use super::Filter;
use crate::types::{FrameBuffer, CHANNELS};

/// Overclip indicator value when a sample exceeds unity
const OCI_CLIP: i32 = 105;
/// Overclip indicator floor while the averaged RMS is hot
const OCI_HOT: i32 = 60;
/// Averaged RMS above which the indicator is held at `OCI_HOT` (~ -12 dB)
const HOT_RMS: f32 = 0.25;

/// Lock-free snapshot of the last metering pass
#[derive(Debug, Default)]
pub struct MeterReadings {
    peak: [AtomicU32; CHANNELS],
    rms: [AtomicU32; CHANNELS],
    avg_rms: [AtomicU32; CHANNELS],
    overclip: [AtomicI32; CHANNELS],
}

impl MeterReadings {
    pub fn peak(&self) -> [f32; CHANNELS] {
        load_pair(&self.peak)
    }

    pub fn rms(&self) -> [f32; CHANNELS] {
        load_pair(&self.rms)
    }

    pub fn avg_rms(&self) -> [f32; CHANNELS] {
        load_pair(&self.avg_rms)
    }

    pub fn overclip(&self) -> [i32; CHANNELS] {
        [
            self.overclip[0].load(Ordering::Relaxed),
            self.overclip[1].load(Ordering::Relaxed),
        ]
    }
}

fn load_pair(cells: &[AtomicU32; CHANNELS]) -> [f32; CHANNELS] {
    [
        f32::from_bits(cells[0].load(Ordering::Relaxed)),
        f32::from_bits(cells[1].load(Ordering::Relaxed)),
    ]
}

fn store_pair(cells: &[AtomicU32; CHANNELS], values: [f32; CHANNELS]) {
    for (cell, value) in cells.iter().zip(values) {
        cell.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Measures peak and RMS magnitude (linear scale) of every buffer
#[derive(Debug, Default)]
pub struct Metering {
    peak: [f32; CHANNELS],
    rms: [f32; CHANNELS],
    avg_rms: [f32; CHANNELS],
    overclip: [i32; CHANNELS],
    readings: Arc<MeterReadings>,
}

impl Metering {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the published readings
    pub fn readings(&self) -> Arc<MeterReadings> {
        Arc::clone(&self.readings)
    }

    pub fn peak(&self) -> [f32; CHANNELS] {
        self.peak
    }

    pub fn rms(&self) -> [f32; CHANNELS] {
        self.rms
    }

    pub fn avg_rms(&self) -> [f32; CHANNELS] {
        self.avg_rms
    }

    pub fn overclip(&self) -> [i32; CHANNELS] {
        self.overclip
    }

    fn publish(&self) {
        store_pair(&self.readings.peak, self.peak);
        store_pair(&self.readings.rms, self.rms);
        store_pair(&self.readings.avg_rms, self.avg_rms);
        for (cell, value) in self.readings.overclip.iter().zip(self.overclip) {
            cell.store(value, Ordering::Relaxed);
        }
    }
}

impl Filter for Metering {
    fn reset_state(&mut self) {
        self.peak = [0.0; CHANNELS];
        self.rms = [0.0; CHANNELS];
        self.avg_rms = [0.0; CHANNELS];
        self.overclip = [0; CHANNELS];
        self.publish();
    }

    fn filter_buffer(&mut self, buffer: &mut FrameBuffer) {
        let mut peak = [0.0_f32; CHANNELS];
        let mut sum = [0.0_f32; CHANNELS];

        for frame in buffer.iter() {
            for ch in 0..CHANNELS {
                let m = frame.channel(ch).abs();
                peak[ch] = peak[ch].max(m);
                sum[ch] += m * m;
            }
        }

        let frames = buffer.len().max(1) as f32;
        for ch in 0..CHANNELS {
            self.peak[ch] = peak[ch];
            self.rms[ch] = (sum[ch] / frames).sqrt();
            self.avg_rms[ch] =
                ((self.avg_rms[ch] * self.avg_rms[ch] + self.rms[ch] * self.rms[ch]) / 2.0).sqrt();

            let oci = if self.peak[ch] > 1.0 {
                OCI_CLIP
            } else if self.avg_rms[ch] > HOT_RMS {
                self.overclip[ch].max(OCI_HOT)
            } else {
                self.overclip[ch]
            };
            self.overclip[ch] = if oci > 0 { oci - 1 } else { 0 };
        }

        self.publish();
    }
}
