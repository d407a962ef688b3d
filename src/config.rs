//! Search configuration.
//!
//! Defaults: paths of depth 2, seven rewrite steps, a budget of 200 000
//! explored states and no witness file.

use crate::backend::explicit::DEFAULT_MAX_STATES;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bounds and output options of a reachability search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Maximum length of a rewrite path.
    pub depth: usize,
    /// Maximum number of rewrite steps.
    pub max_steps: usize,
    /// Maximum number of distinct states the explicit backend explores.
    pub max_states: usize,
    /// Where to write the witness, if anywhere.
    pub witness_path: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { depth: 2, max_steps: 7, max_states: DEFAULT_MAX_STATES, witness_path: None }
    }
}

impl SearchConfig {
    /// Parses and validates a JSON configuration. Missing fields take their
    /// defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.depth == 0 {
            return Err(ConfigError::Invalid("depth must be at least 1".to_string()));
        }
        if self.max_states == 0 {
            return Err(ConfigError::Invalid("max_states must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_witness_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.witness_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = SearchConfig::from_json_str(r#"{ "max_steps": 3 }"#).unwrap();
        assert_eq!(config, SearchConfig::default().with_max_steps(3));
        assert_eq!(SearchConfig::from_json_str("{}").unwrap(), SearchConfig::default());
    }

    #[test]
    fn rejects_zero_depth_and_unknown_fields() {
        assert!(matches!(
            SearchConfig::from_json_str(r#"{ "depth": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SearchConfig::from_json_str(r#"{ "steps": 3 }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.json");
        std::fs::write(&path, r#"{ "depth": 3, "witness_path": "w.cbor" }"#).unwrap();
        let config = SearchConfig::from_path(&path).unwrap();
        assert_eq!(config.depth, 3);
        assert_eq!(config.witness_path, Some(PathBuf::from("w.cbor")));
        assert!(matches!(
            SearchConfig::from_path(&dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
