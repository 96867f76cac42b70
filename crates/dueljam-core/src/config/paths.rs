//! Default locations for DuelJam files

use std::path::PathBuf;

/// Directory name used under the platform config and data dirs
const APP_DIR: &str = "dueljam";

/// `<config dir>/dueljam`, or `./dueljam` when the platform has none
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// A file inside [`default_config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

/// `<data dir>/dueljam/samples`, where sample packs are looked up
pub fn default_samples_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("samples")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_namespaced() {
        assert!(default_config_dir().ends_with("dueljam"));
        assert!(default_config_path("player.yaml").ends_with("dueljam/player.yaml"));
        assert!(default_samples_dir().ends_with("dueljam/samples"));
    }
}
