//! Game session configuration

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;
use crate::chart::{JudgePreset, KeyBinding, NoteKey};

/// Default config file name inside the config directory
pub const GAME_CONFIG_FILE: &str = "dueljam.yaml";

/// Player 1 keyboard layout: scratch on Shift, lanes on S D F Space J K L
fn default_key_bindings() -> Vec<KeyBinding> {
    const CODES: [u32; 8] = [16, 83, 68, 70, 32, 74, 75, 76];
    CODES
        .iter()
        .zip(0u8..)
        .filter_map(|(&code, lane)| NoteKey::player1(lane).map(|key| KeyBinding::new(key, code)))
        .collect()
}

/// Everything a play session needs besides the chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub audio: AudioConfig,

    /// Timing window preset
    pub judge: JudgePreset,

    /// Play every lane automatically
    pub autoplay: bool,

    /// Lane to key assignments (ignored under autoplay)
    pub key_bindings: Vec<KeyBinding>,

    /// Master gain before the maximizer, in dB
    pub master_boost_db: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            judge: JudgePreset::Normal,
            autoplay: false,
            key_bindings: default_key_bindings(),
            master_boost_db: 0.0,
        }
    }
}

impl GameConfig {
    pub fn with_audio(mut self, audio: AudioConfig) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_judge(mut self, judge: JudgePreset) -> Self {
        self.judge = judge;
        self
    }

    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    pub fn with_key_bindings(mut self, bindings: Vec<KeyBinding>) -> Self {
        self.key_bindings = bindings;
        self
    }

    /// Bindings handed to the tracker; empty under autoplay
    pub fn effective_bindings(&self) -> &[KeyBinding] {
        if self.autoplay {
            &[]
        } else {
            &self.key_bindings
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config, save_config};

    #[test]
    fn test_default_layout() {
        let config = GameConfig::default();
        assert_eq!(config.key_bindings.len(), 8);
        assert_eq!(config.key_bindings[0], KeyBinding::new(NoteKey::P1_S, 16));
        assert_eq!(config.key_bindings[7].key, NoteKey::P1_7);
        assert_eq!(config.effective_bindings().len(), 8);
        assert!(config.with_autoplay(true).effective_bindings().is_empty());
    }

    #[test]
    fn test_round_trip_through_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(GAME_CONFIG_FILE);
        let config = GameConfig::default()
            .with_judge(JudgePreset::Lunatic)
            .with_key_bindings(vec![KeyBinding::new(NoteKey::P2_1, 90)]);

        save_config(&config, &path).expect("save");
        let loaded: GameConfig = load_config(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(GAME_CONFIG_FILE);
        std::fs::write(&path, "judge: hard\nautoplay: true\n").expect("write");

        let loaded: GameConfig = load_config(&path);
        assert_eq!(loaded.judge, JudgePreset::Hard);
        assert!(loaded.autoplay);
        assert_eq!(loaded.audio, AudioConfig::default());
        assert_eq!(loaded.key_bindings, GameConfig::default().key_bindings);
    }
}
