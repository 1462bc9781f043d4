//! Normalization agent.

use std::sync::Arc;

use labsum_core::{NormalizationResult, ResponseKind};

use super::{run_stage, AgentError, AgentResponse};
use crate::prompts::normalization_prompt;
use crate::providers::{CompletionConfig, LlmProvider};

/// Turns raw test lines into structured tests with standard reference ranges.
pub struct NormalizationAgent {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
}

impl NormalizationAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self { provider, config }
    }

    pub async fn normalize(
        &self,
        raw_tests: &[String],
    ) -> Result<AgentResponse<NormalizationResult>, AgentError> {
        tracing::info!(raw = raw_tests.len(), model = %self.config.model, "Normalizing tests");

        let prompt = normalization_prompt(raw_tests).map_err(|e| AgentError::Prompt {
            stage: ResponseKind::Normalization,
            message: e.to_string(),
        })?;

        let response: AgentResponse<NormalizationResult> =
            run_stage(&self.provider, &self.config, ResponseKind::Normalization, prompt).await?;

        tracing::info!(
            tests = response.result.tests.len(),
            confidence = response.result.normalization_confidence,
            "Tests normalized"
        );
        Ok(response)
    }
}
