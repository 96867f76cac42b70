//! DuelJam Core - audio engine, chart model and judgement for the DuelJam rhythm game

pub mod audio;
pub mod audio_file;
pub mod chart;
pub mod config;
pub mod engine;
pub mod filter;
pub mod types;

pub use types::*;
