//! Language-model access.
//!
//! Every model call in the pipeline goes through [`LlmProvider`]. The
//! guardrail never sees a provider: agents call it and pass plain data on to
//! `labsum-core`. Credentials are explicit ([`ApiCredential`]) and there is no
//! process-wide model configuration.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod factory;
mod gemini;
pub mod secrets;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use gemini::{GeminiProvider, GeminiProviderFactory, GOOGLE_API_KEY_ENV};
pub use secrets::{ApiCredential, CredentialSource};

/// Model used by every stage unless configured otherwise.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Why a model call failed.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Model request failed: {0}")]
    HttpError(String),

    #[error("Model rate limit reached (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Model API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Unreadable model response: {0}")]
    ParseError(String),

    #[error("Model API rejected the API key")]
    AuthError,

    #[error("Model request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Model provider not configured: {0}")]
    NotConfigured(String),
}

/// Per-request generation settings.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub model: String,
    pub max_tokens: u32,
    /// 0.0 keeps extraction and normalization repeatable
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 2048,
            temperature: 0.0,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Who a chat message is from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Stage instructions
    System,
    /// Report text or stage input
    User,
    /// Earlier model output
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Text returned by the model, with what it cost.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: TokenUsage,
    /// Model version reported by the API, or the requested model
    pub model: String,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A text-generation backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one chat completion.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Whether the provider looks usable (e.g. has a key). Makes no request.
    async fn health_check(&self) -> bool;

    fn name(&self) -> &str;

    /// Rough token count, about four characters per token.
    fn estimate_tokens(&self, text: &str) -> u32 {
        u32::try_from(text.len().div_ceil(4)).unwrap_or(u32::MAX)
    }

    /// Complete a single user prompt.
    async fn generate(
        &self,
        prompt: &str,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        self.complete(vec![ChatMessage::user(prompt)], config).await
    }
}
