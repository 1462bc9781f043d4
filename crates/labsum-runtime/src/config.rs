//! Runtime configuration from YAML/JSON.
//!
//! ```yaml
//! provider: gemini
//! model: gemini-2.0-flash
//! max_tokens: 2048
//! temperature: 0.0
//! request_timeout: 60s
//! guardrail:
//!   max_count_skew: 2
//!   match_threshold: 80
//! provider_config:
//!   base_url: https://generativelanguage.googleapis.com/v1beta
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use thiserror::Error;

use labsum_core::GuardrailConfig;

use crate::providers::{CompletionConfig, DEFAULT_MODEL};

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Provider type in the registry
    pub provider: String,

    /// Model used by every stage
    pub model: String,

    /// Maximum tokens per completion
    pub max_tokens: u32,

    /// Sampling temperature (0.0 for deterministic)
    pub temperature: f32,

    /// Per-request timeout, e.g. "60s" or "2m"
    #[serde(
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,

    /// Guardrail limits
    pub guardrail: GuardrailConfig,

    /// Passed verbatim to the provider factory (`api_key`, `base_url`)
    pub provider_config: JsonValue,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 2048,
            temperature: 0.0,
            request_timeout: Duration::from_secs(60),
            guardrail: GuardrailConfig::default(),
            provider_config: serde_json::json!({}),
        }
    }
}

impl RuntimeConfig {
    /// Parse from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; `.json` is parsed as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&contents)
        } else {
            Self::from_yaml(&contents)
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.trim().is_empty() {
            return Err(ConfigError::ValidationError("provider must not be empty".to_string()));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("model must not be empty".to_string()));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "request_timeout must be positive".to_string(),
            ));
        }

        if !self.provider_config.is_object() {
            return Err(ConfigError::ValidationError(
                "provider_config must be a mapping".to_string(),
            ));
        }

        self.guardrail
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Completion settings shared by all stages.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.request_timeout,
        }
    }
}

fn serialize_duration<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
}

fn deserialize_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}
