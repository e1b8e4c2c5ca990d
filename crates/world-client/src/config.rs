//! Configuration loading for the viewer client.
//!
//! All client settings are loaded from a TOML configuration file; every
//! section falls back to its defaults when absent, so an empty file is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::poll::PollConfig;
use world_model::DEFAULT_EXCLUDED_TAGS;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Complete client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend polling settings
    #[serde(default)]
    pub poll: PollConfig,
    /// Epoch playback settings
    #[serde(default)]
    pub playback: PlaybackConfig,
    /// Graph view settings
    #[serde(default)]
    pub graph: GraphConfig,
}

impl ClientConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Returns this configuration as a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Epoch playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Wall-clock duration of one epoch during playback, in milliseconds.
    pub epoch_duration_ms: u64,
    /// Start playing as soon as a world is loaded.
    pub autoplay: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            epoch_duration_ms: 1200,
            autoplay: false,
        }
    }
}

/// Graph view settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Lifecycle tags hidden from the graph view.
    pub exclude_tags: Vec<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            exclude_tags: DEFAULT_EXCLUDED_TAGS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Generates a default configuration file content.
pub fn default_config_toml() -> String {
    r#"# World viewer configuration

[poll]
interval_ms = 500
max_attempts = 240
stagnation_limit = 8

[playback]
epoch_duration_ms = 1200
autoplay = false

[graph]
exclude_tags = ["dead", "inactive", "absorbed"]
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.poll.interval_ms, 500);
        assert_eq!(config.poll.max_attempts, 240);
        assert_eq!(config.playback.epoch_duration_ms, 1200);
        assert!(!config.playback.autoplay);
        assert_eq!(config.graph.exclude_tags, vec!["dead", "inactive", "absorbed"]);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
            [playback]
            epoch_duration_ms = 400
        "#;
        let config = ClientConfig::from_toml_str(toml).unwrap();

        assert_eq!(config.playback.epoch_duration_ms, 400);
        // Untouched sections keep their defaults.
        assert!(!config.playback.autoplay);
        assert_eq!(config.poll.stagnation_limit, 8);
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config.poll.max_attempts, 240);
    }

    #[test]
    fn test_bad_toml_reports_error() {
        let result = ClientConfig::from_toml_str("[playback\nepoch_duration_ms = 400");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_default_config_toml_parses() {
        let config = ClientConfig::from_toml_str(&default_config_toml()).unwrap();
        assert_eq!(config.playback.epoch_duration_ms, 1200);
        assert_eq!(config.graph.exclude_tags.len(), 3);
    }

    #[test]
    fn test_round_trip() {
        let mut config = ClientConfig::default();
        config.playback.autoplay = true;
        config.poll.interval_ms = 50;

        let toml = config.to_toml().unwrap();
        let parsed = ClientConfig::from_toml_str(&toml).unwrap();
        assert!(parsed.playback.autoplay);
        assert_eq!(parsed.poll.interval_ms, 50);
    }

    #[test]
    fn test_from_file_missing() {
        let result = ClientConfig::from_file(Path::new("/nonexistent/viewer.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
