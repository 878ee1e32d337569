use std::{fs, io, path::PathBuf};

use serde::{Deserialize, Serialize};

/// File name the preferences live under, inside the app's data directory.
pub const PREFERENCES_FILE: &str = "preferences.json";

pub const DEFAULT_THEME: &str = "minimal";

/// Durable client-side preferences. The active theme name is the only entry;
/// conversations and messages live behind the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub theme: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: DEFAULT_THEME.to_string(),
        }
    }
}

/// Read/write handle for the preferences file, constructed once at startup
/// and passed to whoever needs it. A missing or unreadable file yields
/// defaults; every change is written back immediately.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Preferences {
        if !self.path.exists() {
            return Preferences::default();
        }

        fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, preferences: &Preferences) -> io::Result<()> {
        let raw = serde_json::to_string_pretty(preferences)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, raw)
    }

    pub fn set_theme(&self, theme: impl Into<String>) -> io::Result<Preferences> {
        let mut preferences = self.load();
        preferences.theme = theme.into();
        self.save(&preferences)?;
        Ok(preferences)
    }
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
