//! Persisted settings — the saved server URL and the on-disk locations the
//! web engine's cache lives next to.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::log;

/// Application directory name under the platform config/cache roots.
const APP_DIR: &str = "jellyfin-desktop";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Saved Jellyfin server URL. Empty until the user completes onboarding.
    pub server_url: String,
}

impl Settings {
    /// Load settings from disk. An unreadable or malformed file is treated
    /// as empty.
    pub fn load() -> Self {
        let path = settings_path();
        match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(settings) => settings,
                Err(e) => {
                    log(&format!("settings: parse failed ({e}), using defaults"));
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Write settings to disk, creating the config directory if needed.
    pub fn save(&self) -> std::io::Result<()> {
        let dir = config_dir();
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(settings_path(), json)
    }
}

/// Platform config directory for this application.
pub fn config_dir() -> PathBuf {
    config_root().join(APP_DIR)
}

/// Full path of the settings file.
pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Web engine cache directory, sibling to the config directory. The engine
/// owns its schema; we only hand it the path.
pub fn cache_dir() -> PathBuf {
    cache_root().join(APP_DIR)
}

#[cfg(target_os = "macos")]
fn config_root() -> PathBuf {
    home().join("Library").join("Application Support")
}

#[cfg(target_os = "windows")]
fn config_root() -> PathBuf {
    std::env::var_os("LOCALAPPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|| home().join("AppData").join("Local"))
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn config_root() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home().join(".config"))
}

#[cfg(target_os = "macos")]
fn cache_root() -> PathBuf {
    home().join("Library").join("Caches")
}

#[cfg(target_os = "windows")]
fn cache_root() -> PathBuf {
    config_root()
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn cache_root() -> PathBuf {
    std::env::var_os("XDG_CACHE_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home().join(".cache"))
}

fn home() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let parsed: Settings = serde_json::from_str("{}").expect("deserialize");
        assert!(parsed.server_url.is_empty());
    }

    #[test]
    fn server_url_roundtrip() {
        let settings = Settings {
            server_url: "https://jf.example".to_owned(),
        };
        let json = serde_json::to_string(&settings).expect("serialize");
        assert!(json.contains("\"serverUrl\""));
        let parsed: Settings = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.server_url, "https://jf.example");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let parsed: Settings =
            serde_json::from_str(r#"{"serverUrl":"http://host:8096","theme":"dark"}"#)
                .expect("deserialize");
        assert_eq!(parsed.server_url, "http://host:8096");
    }

    #[test]
    fn settings_path_is_under_config_dir() {
        assert!(settings_path().starts_with(config_dir()));
        assert!(settings_path().ends_with("settings.json"));
    }
}
