//! Filter system - the trait, the rack, and the built-in filters
//!
//! A [`Filter`] is a stateful in-place transform over a [`FrameBuffer`].
//! Tracks own a [`Rack`] of filters that runs over the mixed output on
//! every render pass, in attachment order.
//!
//! Built-in filters:
//! - [`Biquad`]: 2nd-order IIR low-pass / high-pass
//! - [`ThreeBandEq`]: low / mid / high split with per-band gain
//! - [`PanMixer`]: volume and pan with linear or sine/cosine law
//! - [`Metering`]: peak, RMS and overclip readings
//! - [`Maximizer`]: boosting peak limiter with two release rates

mod eq;
mod iir;
mod maximizer;
mod metering;
mod mixer;

pub use eq::ThreeBandEq;
pub use iir::{Biquad, BiquadCoeffs, BiquadKind};
pub use maximizer::Maximizer;
pub use metering::{MeterReadings, Metering};
pub use mixer::{pan_gains, PanLaw, PanMixer};

use std::any::Any;

use crate::types::FrameBuffer;

/// Downcast access for filters stored behind `Box<dyn Filter>`
pub trait AsAny {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A stateful audio transform
///
/// Filters are called with buffers whose length equals the owning track's
/// frame count; there are no partial-buffer calls.
pub trait Filter: AsAny + Send {
    /// Clear internal memory (delay lines, envelopes) without touching the
    /// tuning parameters
    fn reset_state(&mut self);

    /// Transform the buffer in place
    fn filter_buffer(&mut self, buffer: &mut FrameBuffer);
}

/// An ordered chain of filters
#[derive(Default)]
pub struct Rack {
    filters: Vec<Box<dyn Filter>>,
}

impl Rack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter, returning its index
    pub fn attach(&mut self, filter: Box<dyn Filter>) -> usize {
        self.filters.push(filter);
        self.filters.len() - 1
    }

    /// Remove the filter at `index`, keeping the order of the rest
    pub fn detach(&mut self, index: usize) -> Option<Box<dyn Filter>> {
        if index < self.filters.len() {
            Some(self.filters.remove(index))
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Option<&dyn Filter> {
        self.filters.get(index).map(|f| f.as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn Filter + 'static)> {
        self.filters.get_mut(index).map(|f| f.as_mut())
    }

    /// Typed access to the filter at `index`
    pub fn get_typed_mut<F: Filter + 'static>(&mut self, index: usize) -> Option<&mut F> {
        self.filters
            .get_mut(index)?
            .as_mut()
            .as_any_mut()
            .downcast_mut::<F>()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Filter for Rack {
    fn reset_state(&mut self) {
        for filter in &mut self.filters {
            filter.reset_state();
        }
    }

    fn filter_buffer(&mut self, buffer: &mut FrameBuffer) {
        for filter in &mut self.filters {
            filter.filter_buffer(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Frame;

    /// Adds a constant to every sample so ordering shows up in the output
    struct Offset(f32);

    impl Filter for Offset {
        fn reset_state(&mut self) {}

        fn filter_buffer(&mut self, buffer: &mut FrameBuffer) {
            for frame in buffer.iter_mut() {
                *frame = Frame::new(frame.left * 10.0 + self.0, frame.right * 10.0 + self.0);
            }
        }
    }

    #[test]
    fn test_rack_runs_in_attachment_order() {
        let mut rack = Rack::new();
        rack.attach(Box::new(Offset(1.0)));
        rack.attach(Box::new(Offset(2.0)));
        rack.attach(Box::new(Offset(3.0)));

        let mut buffer = FrameBuffer::silence(1);
        rack.filter_buffer(&mut buffer);
        // ((0*10+1)*10+2)*10+3
        assert_eq!(buffer[0].left, 123.0);
    }

    #[test]
    fn test_detach_keeps_relative_order() {
        let mut rack = Rack::new();
        rack.attach(Box::new(Offset(1.0)));
        rack.attach(Box::new(Offset(2.0)));
        rack.attach(Box::new(Offset(3.0)));

        assert!(rack.detach(1).is_some());
        assert!(rack.detach(5).is_none());
        assert_eq!(rack.len(), 2);

        let mut buffer = FrameBuffer::silence(1);
        rack.filter_buffer(&mut buffer);
        assert_eq!(buffer[0].left, 13.0, "remaining filters must keep their order");
    }

    #[test]
    fn test_typed_access() {
        let mut rack = Rack::new();
        rack.attach(Box::new(Offset(1.0)));
        rack.attach(Box::new(PanMixer::new()));

        assert!(rack.get_typed_mut::<PanMixer>(0).is_none());
        let mixer = rack.get_typed_mut::<PanMixer>(1).expect("mixer at index 1");
        mixer.set_volume(0.5);
        assert_eq!(mixer.volume(), 0.5);
    }

    #[test]
    fn test_empty_rack_is_transparent() {
        let mut rack = Rack::new();
        let mut buffer = FrameBuffer::from_vec(vec![Frame::new(0.3, -0.2); 4]);
        let before = buffer.clone();
        rack.filter_buffer(&mut buffer);
        assert_eq!(buffer, before);
    }
}
