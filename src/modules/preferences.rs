use derive_more::with_trait::Display;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use crate::modules::types::PreferredMode;

/// Reader settings that outlive a session.
#[derive(Debug, Deserialize, Clone, Display, Serialize, PartialEq, Eq)]
#[display("mode={mode} margin={margin} lookahead={preload_lookahead} flip={enable_flip_animation} rtl={enable_right_to_left}")]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub mode: PreferredMode,
    pub margin: u32,
    pub preload_lookahead: usize,
    pub enable_flip_animation: bool,
    pub enable_right_to_left: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            mode: PreferredMode::Continuous,
            margin: 30,
            preload_lookahead: 3,
            enable_flip_animation: true,
            enable_right_to_left: false,
        }
    }
}

/// Where preferences are read at session start and written on explicit change.
pub trait PreferenceStore {
    fn load(&self) -> Result<Preferences, Box<dyn Error>>;
    fn save(&self, preferences: &Preferences) -> Result<(), Box<dyn Error>>;
}

pub struct TomlPreferenceStore {
    path: PathBuf,
}

impl TomlPreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PreferenceStore for TomlPreferenceStore {
    fn load(&self) -> Result<Preferences, Box<dyn Error>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Preferences::default()),
            Err(err) => return Err(err.into()),
        };
        let preferences: Preferences = toml::from_str(&text)?;
        Ok(preferences)
    }

    fn save(&self, preferences: &Preferences) -> Result<(), Box<dyn Error>> {
        let toml_str = toml::to_string_pretty(preferences)?;
        fs::write(&self.path, toml_str)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("reader-client-{}-{name}.toml", std::process::id()))
    }

    #[test]
    fn missing_file_gives_defaults() {
        let store = TomlPreferenceStore::new(scratch_path("missing"));
        let prefs = store.load().unwrap();
        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.margin, 30);
        assert_eq!(prefs.preload_lookahead, 3);
        assert!(prefs.enable_flip_animation);
        assert!(!prefs.enable_right_to_left);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = scratch_path("partial");
        fs::write(&path, "mode = \"paged\"\nenableRightToLeft = true\n").unwrap();
        let prefs = TomlPreferenceStore::new(&path).load().unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(prefs.mode, PreferredMode::Paged);
        assert!(prefs.enable_right_to_left);
        assert_eq!(prefs.margin, 30);
    }

    #[test]
    fn saved_preferences_load_back() {
        let path = scratch_path("saved");
        let store = TomlPreferenceStore::new(&path);
        let prefs = Preferences {
            mode: PreferredMode::Paged,
            margin: 0,
            preload_lookahead: 5,
            enable_flip_animation: false,
            enable_right_to_left: true,
        };
        store.save(&prefs).unwrap();
        let loaded = store.load().unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded, prefs);
    }
}
