//! DuelJam Player - headless chart player
//!
//! Loads a sample pack, lays the demo chart over it and plays it on
//! autoplay, either live through the output device or rendered to a WAV
//! file.
//!
//! ## Command line flags
//!
//! - `--render <file.wav>`: render offline instead of opening the device
//! - `--samples <dir>`: sample pack directory (overrides the config)
//! - `--config <file.yaml>`: player config file

mod config;
mod demo;
mod session;

use std::path::PathBuf;

use anyhow::{bail, Result};

use dueljam_core::audio_file::load_sample_dir;
use dueljam_core::config::load_config;
use dueljam_core::engine::SampleMap;

use config::{default_player_config_path, PlayerConfig};

#[derive(Debug, Default)]
struct Args {
    render: Option<PathBuf>,
    samples: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        let slot = match arg.as_str() {
            "--render" => &mut parsed.render,
            "--samples" => &mut parsed.samples,
            "--config" => &mut parsed.config,
            other => bail!("Unknown argument: {}", other),
        };
        match args.next() {
            Some(value) => *slot = Some(PathBuf::from(value)),
            None => bail!("{} needs a value", arg),
        }
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    log::info!("dueljam-player starting up");

    let config_path = args.config.clone().unwrap_or_else(default_player_config_path);
    let mut config: PlayerConfig = load_config(&config_path);
    if let Some(dir) = args.samples {
        config.samples_dir = dir;
    }

    let samples = match load_sample_dir(&config.samples_dir) {
        Ok(samples) => samples,
        Err(e) => {
            log::warn!("Could not load samples from {:?}: {}", config.samples_dir, e);
            SampleMap::new()
        }
    };
    if samples.is_empty() {
        log::warn!("No samples loaded, the chart will play silently");
    }

    let mut ids: Vec<u32> = samples.keys().copied().collect();
    ids.sort_unstable();
    let chart = demo::build_demo_chart(&ids, &config.demo);

    match args.render {
        Some(out) => session::render_to_file(&config, chart, samples, &out)?,
        None => session::run_live(&config, chart, samples)?,
    }

    log::info!("dueljam-player stopped");
    Ok(())
}
