//! Audio engine - samples, voices, tracks and the session that drives them
//!
//! - [`Sample`]: immutable decoded PCM, shared through the audio GC
//! - [`Voice`]: one sounding sample with its own rate converter
//! - [`Track`]: double-buffered mixing bus with a filter rack
//! - [`AudioEngine`]: master bus feeding the output queue
//! - [`AudioManager`]: track registry, sample table and engine thread

mod engine;
mod gc;
mod manager;
mod resample;
mod sample;
mod track;
mod voice;

pub use engine::{AudioEngine, MASTER_TRACK};
pub use gc::gc_handle;
pub use manager::{AudioManager, AUTOPLAY_TRACK, PLAYER1_TRACK, PLAYER2_TRACK};
pub use resample::{is_identity, VoiceResampler};
pub use sample::{Sample, SampleMap};
pub use track::{Source, Track, TrackGuard};
pub use voice::Voice;
