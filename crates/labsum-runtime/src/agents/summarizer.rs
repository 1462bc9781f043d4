//! Patient summary agent.
//!
//! Only ever called with tests that passed the guardrail.

use std::sync::Arc;

use labsum_core::{NormalizedTest, PatientSummary, ResponseKind};

use super::{run_stage, AgentError, AgentResponse};
use crate::prompts::summary_prompt;
use crate::providers::{CompletionConfig, LlmProvider};

pub struct SummaryAgent {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
}

impl SummaryAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self { provider, config }
    }

    /// Summarize results in plain language, explaining each abnormal one.
    pub async fn summarize(
        &self,
        tests: &[NormalizedTest],
    ) -> Result<AgentResponse<PatientSummary>, AgentError> {
        let abnormal = tests.iter().filter(|t| t.status.is_abnormal()).count();
        tracing::info!(tests = tests.len(), abnormal, model = %self.config.model, "Generating summary");

        let prompt = summary_prompt(tests).map_err(|e| AgentError::Prompt {
            stage: ResponseKind::Summary,
            message: e.to_string(),
        })?;

        run_stage(&self.provider, &self.config, ResponseKind::Summary, prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::ScriptedProvider;
    use labsum_core::TestStatus;

    #[tokio::test]
    async fn test_summarize() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"summary": "Low hemoglobin and high white blood cell count.", "explanations": ["Low hemoglobin may relate to anemia.", "High WBC can occur with infections."]}"#,
        ]));
        let agent = SummaryAgent::new(provider, CompletionConfig::default());

        let tests = vec![
            NormalizedTest::new("Hemoglobin", 10.2, "g/dL", TestStatus::Low),
            NormalizedTest::new("WBC", 11200.0, "/uL", TestStatus::High),
        ];
        let response = agent.summarize(&tests).await.unwrap();
        assert_eq!(response.result.explanations.len(), 2);
    }

    #[tokio::test]
    async fn test_summarize_missing_summary_is_malformed() {
        let provider = Arc::new(ScriptedProvider::new(vec![r#"{"explanations": []}"#]));
        let agent = SummaryAgent::new(provider, CompletionConfig::default());

        let tests = vec![NormalizedTest::new("Glucose", 98.0, "mg/dL", TestStatus::Normal)];
        let err = agent.summarize(&tests).await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::MalformedResponse {
                stage: ResponseKind::Summary,
                ..
            }
        ));
    }
}
