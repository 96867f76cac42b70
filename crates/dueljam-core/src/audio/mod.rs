//! Audio output for DuelJam
//!
//! # Architecture
//!
//! - **Game thread**: runs the Tracker and asks the `AudioManager` to play
//!   samples
//! - **Engine thread**: renders one master pass at a time into the
//!   lock-free [`OutputQueue`]
//! - **Device thread**: the CPAL callback pops what the hardware asks for
//!   through its [`OutputReader`]
//!
//! # Example Usage
//!
//! ```ignore
//! use dueljam_core::audio::{start_output, AudioConfig};
//! use dueljam_core::engine::AudioManager;
//!
//! let config = AudioConfig::default();
//! let mut manager = AudioManager::new(&config)?;
//! let output = manager.take_output().expect("output taken once");
//! let _handle = start_output(&config, output)?;
//! ```

mod config;
mod cpal_backend;
mod device;
mod error;
mod queue;

pub use config::{AudioConfig, DeviceId, DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE};
pub use cpal_backend::{start_output, CpalAudioHandle};
pub use device::open_output_device;
pub use error::{AudioError, AudioResult};
pub use queue::{output_queue, OutputQueue, OutputReader, OutputStats};
