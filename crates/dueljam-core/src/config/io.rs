//! YAML persistence for any serde configuration type

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Load a configuration file, falling back to defaults
///
/// A missing file is normal on first start and only logged at info; an
/// unreadable or invalid file is logged at warn. Fields absent from the
/// file take their defaults when `T` uses `#[serde(default)]`.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("No config at {}, using defaults", path.display());
        return T::default();
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            log::warn!("Cannot read {}: {}, using defaults", path.display(), e);
            return T::default();
        }
    };

    match serde_yaml::from_str::<T>(&contents) {
        Ok(config) => {
            log::info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            log::warn!("Invalid config {}: {}, using defaults", path.display(), e);
            T::default()
        }
    }
}

/// Write a configuration file, creating parent directories as needed
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file {}", path.display()))?;

    log::info!("Saved config to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Prefs {
        volume: f32,
        name: String,
    }

    impl Default for Prefs {
        fn default() -> Self {
            Self {
                volume: 0.8,
                name: "default".into(),
            }
        }
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config: Prefs = load_config(Path::new("/nonexistent/dueljam/config.yaml"));
        assert_eq!(config, Prefs::default());
    }

    #[test]
    fn test_save_creates_dirs_and_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("deeper").join("config.yaml");
        let config = Prefs {
            volume: 0.25,
            name: "quiet".into(),
        };

        save_config(&config, &path).expect("save");
        assert!(path.exists());
        assert_eq!(load_config::<Prefs>(&path), config);
    }

    #[test]
    fn test_partial_and_invalid_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");

        std::fs::write(&path, "name: partial\n").expect("write");
        let partial: Prefs = load_config(&path);
        assert_eq!(partial.name, "partial");
        assert_eq!(partial.volume, 0.8, "missing field falls back");

        std::fs::write(&path, "volume: [not, a, number]\n").expect("write");
        assert_eq!(load_config::<Prefs>(&path), Prefs::default());
    }
}
