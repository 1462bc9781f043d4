//! Structured extraction agent.

use std::sync::Arc;

use labsum_core::{ExtractionResult, ResponseKind};

use super::{run_stage, AgentError, AgentResponse};
use crate::prompts::extraction_prompt;
use crate::providers::{CompletionConfig, LlmProvider};

/// Pulls raw test lines out of report text.
pub struct ExtractionAgent {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
}

impl ExtractionAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self { provider, config }
    }

    /// Extract one raw string per test line from `text`.
    pub async fn extract(&self, text: &str) -> Result<AgentResponse<ExtractionResult>, AgentError> {
        tracing::info!(chars = text.len(), model = %self.config.model, "Extracting raw tests");

        let response: AgentResponse<ExtractionResult> = run_stage(
            &self.provider,
            &self.config,
            ResponseKind::Extraction,
            extraction_prompt(text),
        )
        .await?;

        tracing::info!(
            tests = response.result.tests_raw.len(),
            confidence = response.result.confidence,
            "Raw tests extracted"
        );
        Ok(response)
    }
}
