//! Configuration for genflow runs.
//!
//! Every section deserializes with defaults, so a partial JSON document (or
//! none at all) yields a usable configuration. Environment overrides are
//! applied on top with [`GenflowConfig::apply_env`].

use crate::errors::GenflowError;
use crate::manifest::{DEFAULT_CLOSE_TAG, DEFAULT_OPEN_TAG};
use crate::pipeline::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding [`GenflowConfig::model_id`].
pub const ENV_MODEL: &str = "GENFLOW_MODEL";
/// Environment variable overriding [`RetryConfig::max_retries`].
pub const ENV_MAX_RETRIES: &str = "GENFLOW_MAX_RETRIES";
/// Environment variable overriding [`RetryConfig::base_delay_ms`].
pub const ENV_RETRY_BASE_DELAY_MS: &str = "GENFLOW_RETRY_BASE_DELAY_MS";
/// Environment variable overriding [`MaterializeConfig::rollback_on_failure`].
pub const ENV_ROLLBACK: &str = "GENFLOW_ROLLBACK";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenflowConfig {
    /// Model identifier passed to the model client.
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Retry policy for stages and model calls.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Manifest block sentinels.
    #[serde(default)]
    pub manifest: ManifestConfig,
    /// Extension-less dependency resolution.
    #[serde(default)]
    pub resolution: ResolutionConfig,
    /// Materialization behavior.
    #[serde(default)]
    pub materialize: MaterializeConfig,
}

fn default_model_id() -> String {
    "default".to_string()
}

impl Default for GenflowConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            retry: RetryConfig::default(),
            manifest: ManifestConfig::default(),
            resolution: ResolutionConfig::default(),
            materialize: MaterializeConfig::default(),
        }
    }
}

impl GenflowConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, GenflowError> {
        serde_json::from_str(json).map_err(GenflowError::from)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, GenflowError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| GenflowError::io(path, e))?;
        Self::from_json_str(&text)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, GenflowError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self, GenflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup(ENV_MODEL) {
            self.model_id = model;
        }
        if let Some(value) = lookup(ENV_MAX_RETRIES) {
            self.retry.max_retries = parse_env(ENV_MAX_RETRIES, &value)?;
        }
        if let Some(value) = lookup(ENV_RETRY_BASE_DELAY_MS) {
            self.retry.base_delay_ms = parse_env(ENV_RETRY_BASE_DELAY_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_ROLLBACK) {
            self.materialize.rollback_on_failure = parse_bool(ENV_ROLLBACK, &value)?;
        }
        Ok(self)
    }

    /// Sets the model identifier.
    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the manifest sentinels.
    #[must_use]
    pub fn with_manifest(mut self, manifest: ManifestConfig) -> Self {
        self.manifest = manifest;
        self
    }

    /// Sets the resolution convention.
    #[must_use]
    pub fn with_resolution(mut self, resolution: ResolutionConfig) -> Self {
        self.resolution = resolution;
        self
    }

    /// Sets the materialization behavior.
    #[must_use]
    pub const fn with_rollback(mut self, rollback_on_failure: bool) -> Self {
        self.materialize.rollback_on_failure = rollback_on_failure;
        self
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, GenflowError> {
    value
        .trim()
        .parse()
        .map_err(|_| GenflowError::Validation(format!("{key}: invalid value '{value}'")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, GenflowError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(GenflowError::Validation(format!(
            "{key}: expected a boolean, got '{value}'"
        ))),
    }
}

/// Sentinels delimiting the manifest block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Opening sentinel.
    #[serde(default = "default_open_tag")]
    pub open_tag: String,
    /// Closing sentinel.
    #[serde(default = "default_close_tag")]
    pub close_tag: String,
}

fn default_open_tag() -> String {
    DEFAULT_OPEN_TAG.to_string()
}

fn default_close_tag() -> String {
    DEFAULT_CLOSE_TAG.to_string()
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            open_tag: default_open_tag(),
            close_tag: default_close_tag(),
        }
    }
}

impl ManifestConfig {
    /// Sets both sentinels.
    #[must_use]
    pub fn with_tags(mut self, open_tag: impl Into<String>, close_tag: impl Into<String>) -> Self {
        self.open_tag = open_tag.into();
        self.close_tag = close_tag.into();
        self
    }
}

/// Default-file convention for extension-less dependency specifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Stem of a directory's default file.
    #[serde(default = "default_index_stem")]
    pub index_stem: String,
    /// Extensions tried, in order.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_index_stem() -> String {
    "index".to_string()
}

fn default_extensions() -> Vec<String> {
    ["tsx", "ts", "jsx", "js"].map(String::from).to_vec()
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            index_stem: default_index_stem(),
            extensions: default_extensions(),
        }
    }
}

/// Materialization behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializeConfig {
    /// Undo completed writes when a later one fails.
    #[serde(default = "default_rollback")]
    pub rollback_on_failure: bool,
}

const fn default_rollback() -> bool {
    true
}

impl Default for MaterializeConfig {
    fn default() -> Self {
        Self {
            rollback_on_failure: default_rollback(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = GenflowConfig::default();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.manifest.open_tag, "<file_manifest>");
        assert_eq!(config.resolution.extensions, vec!["tsx", "ts", "jsx", "js"]);
        assert!(config.materialize.rollback_on_failure);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = GenflowConfig::from_json_str(
            r#"{"model_id": "m-1", "retry": {"max_retries": 5}, "materialize": {"rollback_on_failure": false}}"#,
        )
        .unwrap();

        assert_eq!(config.model_id, "m-1");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert!(!config.materialize.rollback_on_failure);
        assert_eq!(config.resolution, ResolutionConfig::default());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genflow.json");
        std::fs::write(&path, r#"{"manifest": {"open_tag": "<m>", "close_tag": "</m>"}}"#).unwrap();

        let config = GenflowConfig::from_json_file(&path).unwrap();
        assert_eq!(config.manifest.open_tag, "<m>");

        let missing = GenflowConfig::from_json_file(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(GenflowError::Io { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_MODEL, "big-model"),
            (ENV_MAX_RETRIES, "1"),
            (ENV_RETRY_BASE_DELAY_MS, "10"),
            (ENV_ROLLBACK, "off"),
        ]);

        let config = GenflowConfig::default()
            .apply_env_from(|key| vars.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.model_id, "big-model");
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.base_delay_ms, 10);
        assert!(!config.materialize.rollback_on_failure);
    }

    #[test]
    fn test_invalid_env_value() {
        let result = GenflowConfig::default()
            .apply_env_from(|key| (key == ENV_MAX_RETRIES).then(|| "many".to_string()));
        assert!(matches!(result, Err(GenflowError::Validation(_))));
    }
}
