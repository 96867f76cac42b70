//! Player configuration
//!
//! Stored as YAML next to the shared game settings.
//! Default location: ~/.config/dueljam/player.yaml

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use dueljam_core::config::{default_config_path, default_samples_dir, GameConfig};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Audio, judge and key settings shared with other frontends
    pub game: GameConfig,
    /// Directory the sample pack is loaded from
    pub samples_dir: PathBuf,
    /// Shape of the generated demo chart
    pub demo: DemoConfig,
    /// Extra engine passes rendered after the chart ends so tails ring out
    pub tail_passes: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            samples_dir: default_samples_dir(),
            demo: DemoConfig::default(),
            tail_passes: 24,
        }
    }
}

/// Demo chart section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub measures: u32,
    /// Starting tempo in BPM
    pub tempo: f64,
    /// Tempo switched to halfway through (None keeps the starting tempo)
    pub tempo_change: Option<f64>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            measures: 8,
            tempo: 120.0,
            tempo_change: Some(150.0),
        }
    }
}

/// Get the default config file path
pub fn default_player_config_path() -> PathBuf {
    default_config_path("player.yaml")
}
