//! Audio error types

use thiserror::Error;

/// Errors raised while setting up or running the audio subsystem
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No default audio output device")]
    NoDefaultDevice,

    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Samples must be mono or stereo
    #[error("Unsupported channel count {channels} in sample '{name}'")]
    UnsupportedChannelCount { name: String, channels: usize },

    #[error("Failed to decode '{path}': {reason}")]
    Decode { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create resampler: {0}")]
    ResamplerConstruction(String),

    /// Runtime fault of a voice's converter; fatal for that voice only
    #[error("Resampler fault: {0}")]
    Resample(String),

    #[error("WAV error: {0}")]
    Wav(String),
}

pub type AudioResult<T> = Result<T, AudioError>;
