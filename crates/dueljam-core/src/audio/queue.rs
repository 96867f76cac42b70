//! Lock-free output FIFO between the engine thread and the device callback
//!
//! The engine pushes whole master buffers into the [`OutputQueue`]; the
//! device callback pops exactly what the hardware asks for through the
//! matching [`OutputReader`]. A shortfall is filled with silence and
//! counted, never treated as an error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};

use crate::types::CHANNELS;

/// Callback counters shared by both ends of the queue
#[derive(Debug, Default)]
pub struct OutputStats {
    callbacks: AtomicU64,
    underflows: AtomicU64,
}

impl OutputStats {
    /// Device callbacks served so far
    pub fn callbacks(&self) -> u64 {
        self.callbacks.load(Ordering::Relaxed)
    }

    /// Callbacks that had to be padded with silence
    pub fn underflows(&self) -> u64 {
        self.underflows.load(Ordering::Relaxed)
    }
}

/// Create a queue holding up to `capacity` interleaved stereo samples
pub fn output_queue(capacity: usize) -> (OutputQueue, OutputReader) {
    let (producer, consumer) = RingBuffer::<f32>::new(capacity);
    let stats = Arc::new(OutputStats::default());
    (
        OutputQueue {
            producer,
            stats: Arc::clone(&stats),
        },
        OutputReader { consumer, stats },
    )
}

/// Engine side of the output FIFO
pub struct OutputQueue {
    producer: Producer<f32>,
    stats: Arc<OutputStats>,
}

impl OutputQueue {
    /// Pending samples (not frames)
    pub fn len(&self) -> usize {
        self.capacity() - self.producer.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.producer.buffer().capacity()
    }

    /// Append interleaved stereo samples, returning how many fit
    ///
    /// Everything that fits is committed at once, so the reader never sees
    /// a partial frame.
    pub fn push(&mut self, interleaved: &[f32]) -> usize {
        let fits = interleaved.len().min(self.producer.slots());
        let fits = fits - fits % CHANNELS;
        match self.producer.write_chunk_uninit(fits) {
            Ok(chunk) => chunk.fill_from_iter(interleaved[..fits].iter().copied()),
            Err(_) => 0,
        }
    }

    pub fn stats(&self) -> &Arc<OutputStats> {
        &self.stats
    }
}

/// Device side of the output FIFO, moved into the output callback
pub struct OutputReader {
    consumer: Consumer<f32>,
    stats: Arc<OutputStats>,
}

impl OutputReader {
    /// Samples ready to be read
    pub fn len(&self) -> usize {
        self.consumer.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    /// Drop everything queued
    pub fn clear(&mut self) {
        let pending = self.consumer.slots();
        if let Ok(chunk) = self.consumer.read_chunk(pending) {
            chunk.commit_all();
        }
    }

    /// Fill a device buffer with `channels` interleaved channels
    ///
    /// Stereo is folded to mono for single-channel devices; channels beyond
    /// the second are silenced. Returns the number of frames that had to be
    /// padded with silence.
    pub fn pop_into(&mut self, out: &mut [f32], channels: usize) -> usize {
        let channels = channels.max(1);
        let mut missing = 0;
        for frame in out.chunks_mut(channels) {
            if self.consumer.slots() < CHANNELS {
                frame.fill(0.0);
                missing += 1;
                continue;
            }
            let left = self.consumer.pop().unwrap_or(0.0);
            let right = self.consumer.pop().unwrap_or(0.0);
            if channels == 1 {
                frame[0] = 0.5 * (left + right);
            } else {
                frame[0] = left;
                frame[1] = right;
                frame[2..].fill(0.0);
            }
        }

        self.stats.callbacks.fetch_add(1, Ordering::Relaxed);
        if missing > 0 {
            self.stats.underflows.fetch_add(1, Ordering::Relaxed);
        }
        missing
    }

    pub fn stats(&self) -> &Arc<OutputStats> {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let (mut queue, mut reader) = output_queue(16);
        assert_eq!(queue.push(&[0.1, 0.2, 0.3, 0.4]), 4);
        assert_eq!(queue.len(), 4);
        assert_eq!(reader.len(), 4);

        let mut out = [0.0; 4];
        assert_eq!(reader.pop_into(&mut out, 2), 0);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.4]);
        assert!(reader.is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_keeps_whole_frames() {
        let (mut queue, mut reader) = output_queue(5);
        assert_eq!(queue.push(&[0.5; 8]), 4, "only two frames fit");
        assert_eq!(queue.push(&[0.5; 2]), 0, "a single free slot takes no frame");

        reader.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.push(&[0.25; 3]), 2, "trailing half frame is dropped");
    }

    #[test]
    fn test_underflow_pads_and_counts() {
        let (mut queue, mut reader) = output_queue(16);
        queue.push(&[1.0, 1.0]);

        let mut out = [9.0; 6];
        let missing = reader.pop_into(&mut out, 2);
        assert_eq!(missing, 2);
        assert_eq!(out, [1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(queue.stats().callbacks(), 1);
        assert_eq!(queue.stats().underflows(), 1);

        queue.push(&[0.5; 6]);
        reader.pop_into(&mut out, 2);
        assert_eq!(reader.stats().underflows(), 1, "a full callback is not an underflow");
        assert_eq!(reader.stats().callbacks(), 2);
    }

    #[test]
    fn test_channel_mapping() {
        let (mut queue, mut reader) = output_queue(16);
        queue.push(&[0.2, 0.4, 0.6, 0.8]);

        let mut mono = [0.0; 1];
        reader.pop_into(&mut mono, 1);
        assert!((mono[0] - 0.3).abs() < 1e-6);

        let mut quad = [9.0; 4];
        reader.pop_into(&mut quad, 4);
        assert_eq!(quad, [0.6, 0.8, 0.0, 0.0]);
    }

    #[test]
    fn test_reader_on_another_thread() {
        let (mut queue, mut reader) = output_queue(64);
        let device = std::thread::spawn(move || {
            let mut out = [0.0; 2];
            let mut frames = Vec::new();
            while frames.len() < 16 {
                if reader.pop_into(&mut out, 2) == 0 {
                    frames.push(out[0]);
                }
            }
            frames
        });

        for i in 0..16 {
            let value = i as f32;
            while queue.push(&[value, value]) == 0 {
                std::thread::yield_now();
            }
        }
        let frames = device.join().expect("reader thread");
        assert_eq!(frames, (0..16).map(|i| i as f32).collect::<Vec<_>>(), "frames arrive in order");
    }
}
