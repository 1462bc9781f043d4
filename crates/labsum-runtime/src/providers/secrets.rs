//! API key handling.
//!
//! The key is wrapped in [`ApiCredential`] as soon as it is read and handed
//! to the provider that needs it. `Debug` and `Display` never print it;
//! [`ApiCredential::expose`] is the only way to read it, at the point where
//! the request header is set.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;

use super::ProviderError;

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// `provider_config` in the runtime configuration
    Config,
    /// Environment variable
    Environment,
    /// Passed in by the caller
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CredentialSource::Config => "config",
            CredentialSource::Environment => "environment",
            CredentialSource::Programmatic => "caller",
        };
        f.write_str(label)
    }
}

/// A model API key that cannot leak through formatting.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
        }
    }

    /// Find a key in `config[config_key]`, then in `env_var`.
    ///
    /// Blank values are treated as missing, so an empty `api_key` in a config
    /// file does not hide a key set in the environment.
    pub fn lookup(config: &JsonValue, config_key: &str, env_var: &str) -> Option<Self> {
        if let Some(value) = config[config_key].as_str().filter(|v| !v.trim().is_empty()) {
            return Some(Self::new(value, CredentialSource::Config));
        }

        std::env::var(env_var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| Self::new(v, CredentialSource::Environment))
    }

    /// Like [`ApiCredential::lookup`], but a missing key is an error naming
    /// both places it was looked for.
    pub fn require(config: &JsonValue, config_key: &str, env_var: &str) -> Result<Self, ProviderError> {
        Self::lookup(config, config_key, env_var).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "API key required: set '{}' in provider_config or the {} environment variable",
                config_key, env_var
            ))
        })
    }

    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().trim().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API key from {} [REDACTED]", self.source)
    }
}
