//! Model-backed stage agents.
//!
//! Each agent owns one pipeline stage: it builds the prompt, calls the
//! provider, and turns the model's answer into a typed result. Model output
//! is never trusted structurally: it is unfenced, parsed, validated against
//! the stage's JSON Schema and only then deserialized.

mod extractor;
mod normalizer;
mod summarizer;

pub use extractor::ExtractionAgent;
pub use normalizer::NormalizationAgent;
pub use summarizer::SummaryAgent;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;

use labsum_core::{validate_response, ResponseKind};

use crate::prompts::get_stage_prompt;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError, TokenUsage};

/// Errors from stage agents.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("AI {stage} failed: {source}")]
    Provider {
        stage: ResponseKind,
        #[source]
        source: ProviderError,
    },

    #[error("AI {stage} failed: {message}. Raw AI output: {raw}")]
    MalformedResponse {
        stage: ResponseKind,
        message: String,
        raw: String,
    },

    #[error("Failed to build {stage} prompt: {message}")]
    Prompt { stage: ResponseKind, message: String },
}

/// A typed stage result plus what it cost.
#[derive(Debug, Clone)]
pub struct AgentResponse<T> {
    pub result: T,
    pub usage: TokenUsage,
    pub model: String,
}

/// Parse a model answer for `kind` into `T`.
///
/// Accepts bare JSON or JSON wrapped in a Markdown code fence.
pub fn parse_model_json<T: DeserializeOwned>(raw: &str, kind: ResponseKind) -> Result<T, AgentError> {
    let malformed = |message: String| AgentError::MalformedResponse {
        stage: kind,
        message,
        raw: raw.to_string(),
    };

    let json_str = strip_code_fences(raw);
    let value: serde_json::Value =
        serde_json::from_str(json_str).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;

    validate_response(kind, &value)
        .map_err(|errors| malformed(format!("schema violation: {}", errors.join("; "))))?;

    serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
}

/// The JSON payload inside an optional ```json fence.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };

    let body = &trimmed[start + 3..];
    let body = body
        .strip_prefix("json")
        .or_else(|| body.strip_prefix("JSON"))
        .unwrap_or(body);

    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Send one stage request and parse the answer.
async fn run_stage<T: DeserializeOwned>(
    provider: &Arc<dyn LlmProvider>,
    config: &CompletionConfig,
    kind: ResponseKind,
    user_prompt: String,
) -> Result<AgentResponse<T>, AgentError> {
    let system_prompt = get_stage_prompt(kind);
    tracing::debug!(
        stage = %kind,
        provider = provider.name(),
        estimated_tokens = provider.estimate_tokens(system_prompt) + provider.estimate_tokens(&user_prompt),
        "Sending stage prompt"
    );

    let messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)];
    let response = provider
        .complete(messages, config)
        .await
        .map_err(|source| AgentError::Provider { stage: kind, source })?;

    tracing::debug!(
        stage = %kind,
        model = %response.model,
        prompt_tokens = response.usage.prompt_tokens,
        completion_tokens = response.usage.completion_tokens,
        "Stage response received"
    );

    let result = parse_model_json(&response.content, kind)?;

    Ok(AgentResponse {
        result,
        usage: response.usage,
        model: response.model,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted provider shared by agent and orchestrator tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::providers::{
        ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
    };

    /// Replays canned answers in order and records every request.
    pub struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        pub requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        pub fn new(replies: Vec<&str>) -> Self {
            Self::with_results(replies.into_iter().map(|r| Ok(r.to_string())).collect())
        }

        pub fn with_results(replies: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            self.requests.lock().unwrap().push(messages);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::NotConfigured("script exhausted".to_string())))?;

            Ok(CompletionResponse {
                content: reply,
                usage: TokenUsage {
                    prompt_tokens: 100,
                    completion_tokens: 20,
                },
                model: config.model.clone(),
                finish_reason: Some("STOP".to_string()),
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}
