//! Google Gemini provider implementation.
//!
//! Talks to the Generative Language API (`models/{model}:generateContent`).
//! HTTP support is behind the `gemini` feature; without it the provider can
//! still be constructed and configured, but `complete` reports
//! `NotConfigured`.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, Role,
    TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Environment variable name for the Google API key.
pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider.
///
/// The API key is held in an [`ApiCredential`] and only exposed when the
/// request header is set.
pub struct GeminiProvider {
    credential: ApiCredential,
    base_url: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiProvider {
    /// Create a provider from an explicit API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(api_key, CredentialSource::Programmatic),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from the `GOOGLE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::from_config(&JsonValue::Null)
    }

    /// Create from JSON configuration with environment fallback.
    ///
    /// Reads `api_key` (falling back to `GOOGLE_API_KEY`) and an optional
    /// `base_url`.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::require(config, "api_key", GOOGLE_API_KEY_ENV)?;

        let base_url = config["base_url"]
            .as_str()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            credential,
            base_url,
        })
    }

    /// Set custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[cfg_attr(not(feature = "gemini"), allow(dead_code))]
    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    #[cfg(feature = "gemini")]
    fn get_client() -> Result<&'static reqwest::Client, ProviderError> {
        static CLIENT: std::sync::OnceLock<Result<reqwest::Client, String>> =
            std::sync::OnceLock::new();
        CLIENT
            .get_or_init(|| reqwest::Client::builder().build().map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| ProviderError::HttpError(format!("Failed to build HTTP client: {}", e)))
    }
}

/// generateContent request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(not(feature = "gemini"), allow(dead_code))]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(not(feature = "gemini"), allow(dead_code))]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(not(feature = "gemini"), allow(dead_code))]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(not(feature = "gemini"), allow(dead_code))]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

/// generateContent response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(not(feature = "gemini"), allow(dead_code))]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(not(feature = "gemini"), allow(dead_code))]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(not(feature = "gemini"), allow(dead_code))]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(not(feature = "gemini"), allow(dead_code))]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(not(feature = "gemini"), allow(dead_code))]
struct GeminiErrorDetail {
    message: String,
}

/// Map chat messages onto Gemini's request shape.
///
/// System messages become `systemInstruction`; assistant turns use the
/// `model` role.
#[cfg_attr(not(feature = "gemini"), allow(dead_code))]
fn build_request(messages: Vec<ChatMessage>, config: &CompletionConfig) -> GenerateRequest {
    let mut system: Vec<Part> = Vec::new();
    let mut contents = Vec::new();

    for msg in messages {
        let part = Part {
            text: Some(msg.content),
        };
        match msg.role {
            Role::System => system.push(part),
            Role::Assistant => contents.push(Content {
                role: Some("model".to_string()),
                parts: vec![part],
            }),
            Role::User => contents.push(Content {
                role: Some("user".to_string()),
                parts: vec![part],
            }),
        }
    }

    GenerateRequest {
        system_instruction: if system.is_empty() {
            None
        } else {
            Some(Content {
                role: None,
                parts: system,
            })
        },
        contents,
        generation_config: GenerationConfig {
            max_output_tokens: config.max_tokens,
            temperature: config.temperature,
        },
    }
}

/// Join the text parts of the first candidate.
#[cfg_attr(not(feature = "gemini"), allow(dead_code))]
fn into_completion(
    body: GenerateResponse,
    requested_model: &str,
) -> Result<CompletionResponse, ProviderError> {
    let candidate = body
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ParseError("Response contained no candidates".to_string()))?;

    let content = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let usage = body
        .usage_metadata
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
        })
        .unwrap_or_default();

    Ok(CompletionResponse {
        content,
        usage,
        model: body
            .model_version
            .unwrap_or_else(|| requested_model.to_string()),
        finish_reason: candidate.finish_reason,
    })
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    #[cfg(feature = "gemini")]
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        use std::time::Duration;

        let client = Self::get_client()?;
        let request = build_request(messages, config);

        let response = client
            .post(self.endpoint(&config.model))
            .header("x-goog-api-key", self.credential.expose())
            .header("content-type", "application/json")
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let message = match response.json::<GeminiError>().await {
                Ok(body) => body.error.message,
                Err(e) => format!("unreadable error body: {}", e),
            };
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        into_completion(body, &config.model)
    }

    #[cfg(not(feature = "gemini"))]
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            "Gemini provider requires 'gemini' feature".to_string(),
        ))
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Factory for creating Gemini providers from configuration.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "AIza...",              // Optional, falls back to GOOGLE_API_KEY env
///   "base_url": "https://..."           // Optional, custom API endpoint
/// }
/// ```
pub struct GeminiProviderFactory;

impl ProviderFactory for GeminiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "gemini"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.validate_config(config)?;
        Ok(Arc::new(GeminiProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        ApiCredential::require(config, "api_key", GOOGLE_API_KEY_ENV)?;

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }
}
