//! Configuration file support
//!
//! Loads config from ~/.gastobot/config.toml

use serde::Deserialize;
use std::path::PathBuf;

use crate::state;

/// Configuration for gastobot
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Gemini API key
    pub gemini_api_key: Option<String>,

    /// Sheet script endpoint URL (Apps Script /exec deployment)
    pub sheet_url: Option<String>,

    /// Display name shown to the model
    pub user_name: Option<String>,

    /// Telegram bot token for the bridge
    pub telegram_token: Option<String>,

    /// Bridge inter-poll delay in seconds
    pub poll_secs: Option<u64>,
}

impl Config {
    /// Load config from ~/.gastobot/config.toml
    pub fn load() -> Self {
        let path = config_path();

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    state::data_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.gemini_api_key.is_none());
        assert!(config.sheet_url.is_none());
        assert!(config.telegram_token.is_none());
    }

    #[test]
    fn test_config_parse() {
        let config: Config = toml::from_str(
            "gemini_api_key = \"k\"\nsheet_url = \"https://script.google.com/x/exec\"\npoll_secs = 5\n",
        )
        .unwrap();
        assert_eq!(config.gemini_api_key.as_deref(), Some("k"));
        assert_eq!(config.poll_secs, Some(5));
    }

    #[test]
    fn test_config_path() {
        let path = config_path();
        assert!(path.to_string_lossy().contains(".gastobot"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }
}
