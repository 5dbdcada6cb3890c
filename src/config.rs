//! Engine configuration stored in `~/.caseintel/config.json`.
//!
//! Everything has a working default: a missing file yields a heuristic-only
//! engine with the store in the home directory. A present-but-broken file
//! is a configuration error, not a silent fallback.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

fn default_timeout_secs() -> u64 {
    8
}

fn default_model() -> String {
    "case-estimator-v2".to_string()
}

/// External generator settings. Disabled by default; the deterministic
/// path never depends on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            api_key: None,
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Trend store location; defaults to `~/.caseintel/trends.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend_db_path: Option<PathBuf>,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

impl EngineConfig {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load_default() -> Result<Self, EngineError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit path. A malformed file is fatal.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Configuration(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&data)
            .map_err(|e| EngineError::Configuration(format!("cannot parse {}: {}", path.display(), e)))
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".caseintel").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_generator_disabled() {
        let config = EngineConfig::default();
        assert!(!config.generator.enabled);
        assert_eq!(config.generator.timeout_secs, 8);
    }

    #[test]
    fn test_load_partial_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"generator": {"enabled": true, "endpoint": "https://gen.example/v1"}}"#)
            .expect("write");
        let config = EngineConfig::load(&path).expect("load");
        assert!(config.generator.enabled);
        assert_eq!(config.generator.endpoint, "https://gen.example/v1");
        assert_eq!(config.generator.model, "case-estimator-v2");
        assert!(config.trend_db_path.is_none());
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").expect("write");
        let err = EngineConfig::load(&path).unwrap_err();
        assert!(err.is_configuration());
    }
}
