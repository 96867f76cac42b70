//! Master bus and the bridge to the output device
//!
//! The engine owns the master [`Track`] and the producing end of the
//! [`OutputQueue`]. The [`OutputReader`] is taken once and moved into the
//! device callback. One [`AudioEngine::update`] renders one master pass when
//! the queue has room for it.

use std::sync::Arc;

use super::track::Track;
use crate::audio::{output_queue, OutputQueue, OutputReader};
use crate::filter::{Maximizer, MeterReadings, Metering};
use crate::types::{RenderConfig, CHANNELS};

/// Name of the master track
pub const MASTER_TRACK: &str = "Master";

/// Rack slot of the master maximizer
pub(crate) const MAXIMIZER_SLOT: usize = 0;

pub struct AudioEngine {
    master: Arc<Track>,
    queue: OutputQueue,
    output: Option<OutputReader>,
    meter: Arc<MeterReadings>,
    /// Reused interleaved copy of the master output
    scratch: Vec<f32>,
}

impl AudioEngine {
    /// Create an engine whose master runs a maximizer followed by a meter
    pub fn new(config: RenderConfig) -> Self {
        let master = Arc::new(Track::new(MASTER_TRACK, config));
        let metering = Metering::new();
        let meter = metering.readings();
        master.with_rack(|rack| {
            rack.attach(Box::new(Maximizer::new(config.sample_rate)));
            rack.attach(Box::new(metering));
        });

        // Two passes: update() only renders while less than one is queued
        let (queue, output) = output_queue(config.frame_count * CHANNELS * 2);
        Self {
            master,
            queue,
            output: Some(output),
            meter,
            scratch: Vec::with_capacity(config.frame_count * CHANNELS),
        }
    }

    pub fn master(&self) -> &Arc<Track> {
        &self.master
    }

    /// Engine side of the output FIFO
    pub fn queue(&self) -> &OutputQueue {
        &self.queue
    }

    /// Device side of the output FIFO; None once taken
    pub fn take_output(&mut self) -> Option<OutputReader> {
        self.output.take()
    }

    /// Post-limiter readings of the master bus
    pub fn meter(&self) -> &Arc<MeterReadings> {
        &self.meter
    }

    /// Whether the queue holds less than one master pass
    pub fn needs_data(&self) -> bool {
        self.queue.len() < self.master.output_len() * CHANNELS
    }

    /// Pull and flip the master, then push its output to the queue
    ///
    /// The output is copied under the track's output lock, then pushed
    /// without any lock.
    pub fn render_pass(&mut self) {
        self.master.pull();
        self.master.flip();
        self.master.copy_output_interleaved(&mut self.scratch);
        self.queue.push(&self.scratch);
    }

    /// One engine step; false when the queue was already full
    pub fn update(&mut self) -> bool {
        if !self.needs_data() {
            return false;
        }
        self.render_pass();
        true
    }
}
