//! # Engine Configuration
//!
//! Settings fixed when an [`crate::Engine`] is built. Loaded from YAML or
//! JSON; every field has a default so an empty document is a valid
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use schemata_core::Draft;
use schemata_validate::ValidatorOptions;

use crate::error::ConfigError;

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Records collected before validation stops; 0 is unlimited.
    pub max_errors: usize,
    /// Registered format checkers assert when true, annotate when false.
    pub assert_formats: bool,
    /// Leave `title`, `description` and `$comment` out of schema identity.
    pub ignore_annotations_in_hash: bool,
    /// Keyword vocabulary to seed the registry with.
    pub draft: Draft,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_errors: 1,
            assert_formats: true,
            ignore_annotations_in_hash: true,
            draft: Draft::Draft7,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a configuration file; `.json` files parse as JSON, anything
    /// else as YAML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    /// Validator options implied by this configuration.
    pub fn validator_options(&self) -> ValidatorOptions {
        ValidatorOptions {
            max_errors: self.max_errors,
            assert_formats: self.assert_formats,
            deadline: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_errors, 1);
        assert!(config.assert_formats);
        assert!(config.ignore_annotations_in_hash);
        assert_eq!(config.draft, Draft::Draft7);
    }

    #[test]
    fn test_yaml_partial() {
        let config = EngineConfig::from_yaml_str("max_errors: 0\ndraft: draft2019-09\n").unwrap();
        assert_eq!(config.max_errors, 0);
        assert_eq!(config.draft, Draft::Draft201909);
        assert!(config.assert_formats);
        assert_eq!(EngineConfig::from_yaml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_json_and_unknown_fields() {
        let config = EngineConfig::from_json_str(r#"{"assert_formats": false}"#).unwrap();
        assert!(!config.assert_formats);
        assert!(EngineConfig::from_json_str(r#"{"max_error": 3}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"max_errors": 5}}"#).unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.max_errors, 5);

        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(yaml, "ignore_annotations_in_hash: false").unwrap();
        assert!(!EngineConfig::load(yaml.path()).unwrap().ignore_annotations_in_hash);
    }

    #[test]
    fn test_validator_options() {
        let options = EngineConfig::default().validator_options();
        assert_eq!(options.max_errors, 1);
        assert!(options.deadline.is_none());
    }
}
