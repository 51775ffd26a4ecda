//! Configuration for tag accumulators
//!
//! Supports TOML files, environment variable overrides, and sensible
//! defaults. The limits mirror the tag key/value limits used when
//! interning series metadata.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Maximum allowed length for tag names
pub const MAX_TAG_NAME_LENGTH: usize = 256;

/// Maximum allowed length for tag values
pub const MAX_TAG_VALUE_LENGTH: usize = 4096;

/// Accumulator configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccumulatorConfig {
    /// Longest tag name accepted by `try_add_tag`, in bytes
    #[serde(default = "default_max_tag_name_length")]
    pub max_tag_name_length: usize,

    /// Longest tag value accepted by `try_add_tag`, in bytes
    #[serde(default = "default_max_tag_value_length")]
    pub max_tag_value_length: usize,

    /// Pre-allocated number of distinct tag names
    #[serde(default = "default_initial_tag_capacity")]
    pub initial_tag_capacity: usize,

    /// Pre-allocated number of values per tag name
    #[serde(default = "default_initial_value_capacity")]
    pub initial_value_capacity: usize,

    /// Treat an empty tag value as a null identifier
    #[serde(default = "default_true")]
    pub reject_empty_values: bool,
}

fn default_max_tag_name_length() -> usize { MAX_TAG_NAME_LENGTH }
fn default_max_tag_value_length() -> usize { MAX_TAG_VALUE_LENGTH }
fn default_initial_tag_capacity() -> usize { 16 }
fn default_initial_value_capacity() -> usize { 4 }
fn default_true() -> bool { true }

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            max_tag_name_length: default_max_tag_name_length(),
            max_tag_value_length: default_max_tag_value_length(),
            initial_tag_capacity: default_initial_tag_capacity(),
            initial_value_capacity: default_initial_value_capacity(),
            reject_empty_values: true,
        }
    }
}

impl AccumulatorConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&contents)
    }

    /// Load configuration from a TOML file with environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    ///
    /// Unparseable values are ignored and the current setting is kept.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_usize("KUBA_TAGAGG_MAX_NAME_LENGTH") {
            self.max_tag_name_length = v;
        }
        if let Some(v) = env_usize("KUBA_TAGAGG_MAX_VALUE_LENGTH") {
            self.max_tag_value_length = v;
        }
        if let Some(v) = env_usize("KUBA_TAGAGG_TAG_CAPACITY") {
            self.initial_tag_capacity = v;
        }
        if let Some(v) = env_usize("KUBA_TAGAGG_VALUE_CAPACITY") {
            self.initial_value_capacity = v;
        }
        if let Ok(v) = std::env::var("KUBA_TAGAGG_REJECT_EMPTY_VALUES") {
            if let Ok(b) = v.parse() {
                self.reject_empty_values = b;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_tag_name_length == 0 {
            return Err(Error::Configuration(
                "max_tag_name_length must be > 0".to_string(),
            ));
        }
        if self.max_tag_value_length == 0 {
            return Err(Error::Configuration(
                "max_tag_value_length must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize configuration to a TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {}", e)))
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AccumulatorConfig::default();
        assert_eq!(config.max_tag_name_length, 256);
        assert_eq!(config.max_tag_value_length, 4096);
        assert!(config.reject_empty_values);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AccumulatorConfig::from_toml_str("max_tag_name_length = 64\n").unwrap();
        assert_eq!(config.max_tag_name_length, 64);
        assert_eq!(config.max_tag_value_length, MAX_TAG_VALUE_LENGTH);
        assert_eq!(config.initial_tag_capacity, 16);
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let err = AccumulatorConfig::from_toml_str("max_tag_value_length = 0\n").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        assert!(AccumulatorConfig::from_toml_str("max_tag_name_length = \"lots\"").is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagagg.toml");

        let mut config = AccumulatorConfig::default();
        config.reject_empty_values = false;
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = AccumulatorConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_file_with_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagagg.toml");
        std::fs::write(
            &path,
            "max_tag_value_length = 100\ninitial_value_capacity = 8\n",
        )
        .unwrap();

        std::env::set_var("KUBA_TAGAGG_MAX_VALUE_LENGTH", "50");
        let config = AccumulatorConfig::from_file_with_env(&path).unwrap();
        assert_eq!(config.max_tag_value_length, 50);
        // file values without an override survive
        assert_eq!(config.initial_value_capacity, 8);

        // an override is validated like the file itself
        std::env::set_var("KUBA_TAGAGG_MAX_VALUE_LENGTH", "0");
        let err = AccumulatorConfig::from_file_with_env(&path).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        std::env::remove_var("KUBA_TAGAGG_MAX_VALUE_LENGTH");
    }

    #[test]
    fn test_missing_file() {
        let err = AccumulatorConfig::from_file("/nonexistent/tagagg.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("KUBA_TAGAGG_MAX_NAME_LENGTH", "32");
        let config = AccumulatorConfig::from_env();
        assert_eq!(config.max_tag_name_length, 32);
        std::env::remove_var("KUBA_TAGAGG_MAX_NAME_LENGTH");
    }
}
