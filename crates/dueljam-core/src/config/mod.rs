//! Configuration for DuelJam
//!
//! Settings are plain serde structs persisted as YAML. Loading never fails:
//! a missing or broken file yields defaults so the game can always start.
//!
//! # Usage
//!
//! ```ignore
//! use dueljam_core::config::{default_config_path, load_config, save_config, GameConfig, GAME_CONFIG_FILE};
//!
//! let path = default_config_path(GAME_CONFIG_FILE);
//! let config: GameConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod game;
mod io;
mod paths;

pub use game::{GameConfig, GAME_CONFIG_FILE};
pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path, default_samples_dir};
