//! Provider selection by name.
//!
//! `RuntimeConfig::provider` names a backend and `provider_config` carries its
//! settings; the registry turns the pair into an `Arc<dyn LlmProvider>`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{GeminiProviderFactory, LlmProvider, ProviderError};
use crate::config::RuntimeConfig;

/// Builds one kind of provider from its JSON settings.
pub trait ProviderFactory: Send + Sync {
    /// Name used in `RuntimeConfig::provider`.
    fn provider_type(&self) -> &'static str;

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Check settings without building the provider.
    fn validate_config(&self, _config: &JsonValue) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Known provider factories.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<&'static str, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with Gemini registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GeminiProviderFactory));
        registry
    }

    /// Add a factory. A later factory with the same name replaces the earlier one.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories.insert(factory.provider_type(), factory);
    }

    pub fn create(
        &self,
        provider_type: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.factory(provider_type)?.create(config)
    }

    /// Build the provider a runtime configuration asks for.
    pub fn create_from(&self, config: &RuntimeConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let provider = self.create(&config.provider, &config.provider_config)?;
        tracing::debug!(provider = provider.name(), model = %config.model, "Provider created");
        Ok(provider)
    }

    pub fn validate(&self, provider_type: &str, config: &JsonValue) -> Result<(), ProviderError> {
        self.factory(provider_type)?.validate_config(config)
    }

    /// Registered names, sorted.
    pub fn available_types(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    fn factory(&self, provider_type: &str) -> Result<&Arc<dyn ProviderFactory>, ProviderError> {
        self.factories.get(provider_type).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "unknown provider '{}' (available: {})",
                provider_type,
                self.available_types().join(", ")
            ))
        })
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::ScriptedProvider;
    use serde_json::json;

    /// Builds scripted providers that answer with `config["reply"]`.
    struct ScriptedFactory;

    impl ProviderFactory for ScriptedFactory {
        fn provider_type(&self) -> &'static str {
            "scripted"
        }

        fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
            self.validate_config(config)?;
            let reply = config["reply"].as_str().unwrap_or("{}");
            Ok(Arc::new(ScriptedProvider::new(vec![reply])))
        }

        fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
            if config["reply"].is_number() {
                return Err(ProviderError::NotConfigured("reply must be text".to_string()));
            }
            Ok(())
        }
    }

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::with_defaults();
        registry.register(Arc::new(ScriptedFactory));
        registry
    }

    #[test]
    fn test_available_types_sorted() {
        assert_eq!(registry().available_types(), vec!["gemini", "scripted"]);
        assert_eq!(format!("{:?}", registry()), r#"["gemini", "scripted"]"#);
    }

    #[test]
    fn test_create_from_runtime_config() {
        let config = RuntimeConfig {
            provider: "scripted".to_string(),
            provider_config: json!({ "reply": "{\"tests_raw\": []}" }),
            ..Default::default()
        };
        let provider = registry().create_from(&config).unwrap();
        assert_eq!(provider.name(), "scripted");
    }

    #[test]
    fn test_unknown_provider_lists_alternatives() {
        let err = registry().create("openai", &json!({})).err().expect("expected error");
        match err {
            ProviderError::NotConfigured(msg) => {
                assert_eq!(msg, "unknown provider 'openai' (available: gemini, scripted)");
            }
            other => panic!("Expected NotConfigured, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_delegates_to_factory() {
        let registry = registry();
        assert!(registry.validate("scripted", &json!({ "reply": "ok" })).is_ok());
        assert!(registry.validate("scripted", &json!({ "reply": 3 })).is_err());
        assert!(registry.validate("missing", &json!({})).is_err());
    }
}
