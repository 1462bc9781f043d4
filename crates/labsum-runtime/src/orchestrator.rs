//! Report pipeline orchestrator.
//!
//! Runs the stages strictly in sequence:
//! text → structured extraction → normalization → guardrail gate → summary
//!
//! The guardrail is deterministic and lives in `labsum-core`. When it refuses
//! the normalized tests, the summarizer is never called and the run ends with
//! [`PipelineOutcome::Unprocessed`]. There are no retries and no state shared
//! between runs; usage is accumulated per call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use labsum_core::{
    ExtractionResult, Guardrail, GuardrailVerdict, NormalizationResult, NormalizedTest,
    PatientSummary,
};

use crate::agents::{AgentError, AgentResponse, ExtractionAgent, NormalizationAgent, SummaryAgent};
use crate::config::{ConfigError, RuntimeConfig};
use crate::providers::LlmProvider;
use crate::text::{DocumentSource, PassthroughExtractor, TextError, TextExtractor};
use crate::usage::LlmUsage;

/// Reason reported whenever the guardrail refuses a result.
pub const GUARDRAIL_FAILED_REASON: &str =
    "Guardrail failed: hallucinated tests not present in input";

/// Errors from the pipeline. A guardrail refusal is not one of them.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Text(#[from] TextError),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl PipelineError {
    /// HTTP-equivalent status: 400 for caller mistakes, 500 otherwise.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::InvalidInput(_) | PipelineError::Config(_) => 400,
            PipelineError::Text(e) if e.is_input_error() => 400,
            _ => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code() == 400
    }
}

/// A stage result plus the usage spent producing it.
#[derive(Debug, Clone, Serialize)]
pub struct StageOutput<T> {
    #[serde(flatten)]
    pub result: T,
    pub usage: LlmUsage,
}

/// A fully processed report.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedReport {
    pub tests: Vec<NormalizedTest>,
    pub summary: String,
    pub explanations: Vec<String>,
    pub usage: LlmUsage,
    pub processed_at: DateTime<Utc>,
}

/// Result of a guardrail-gated run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    #[serde(rename = "ok")]
    Processed(ProcessedReport),

    /// The guardrail refused the normalized tests.
    Unprocessed {
        reason: String,
        /// Which check failed and on what
        detail: String,
        #[serde(skip)]
        verdict: GuardrailVerdict,
        usage: LlmUsage,
    },
}

impl PipelineOutcome {
    /// HTTP-equivalent status: 200 processed, 422 unprocessed.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineOutcome::Processed(_) => 200,
            PipelineOutcome::Unprocessed { .. } => 422,
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, PipelineOutcome::Processed(_))
    }

    pub fn usage(&self) -> &LlmUsage {
        match self {
            PipelineOutcome::Processed(report) => &report.usage,
            PipelineOutcome::Unprocessed { usage, .. } => usage,
        }
    }
}

/// The report pipeline.
pub struct ReportPipeline {
    extraction: ExtractionAgent,
    normalization: NormalizationAgent,
    summary: SummaryAgent,
    text_extractor: Arc<dyn TextExtractor>,
    guardrail: Guardrail,
}

impl ReportPipeline {
    /// Create a pipeline that accepts text input only.
    pub fn new(provider: Arc<dyn LlmProvider>, config: RuntimeConfig) -> Self {
        Self::with_text_extractor(provider, Arc::new(PassthroughExtractor), config)
    }

    pub fn with_text_extractor(
        provider: Arc<dyn LlmProvider>,
        text_extractor: Arc<dyn TextExtractor>,
        config: RuntimeConfig,
    ) -> Self {
        let completion = config.completion_config();
        Self {
            extraction: ExtractionAgent::new(provider.clone(), completion.clone()),
            normalization: NormalizationAgent::new(provider.clone(), completion.clone()),
            summary: SummaryAgent::new(provider, completion),
            text_extractor,
            guardrail: Guardrail::with_config(config.guardrail),
        }
    }

    /// Step 1: extract raw test lines from a text or image document.
    pub async fn extract(
        &self,
        source: &DocumentSource,
    ) -> Result<StageOutput<ExtractionResult>, PipelineError> {
        let mut usage = LlmUsage::default();
        let result = self.extract_into(source, &mut usage).await?;
        Ok(StageOutput { result, usage })
    }

    /// Step 2: normalize raw test lines.
    pub async fn normalize(
        &self,
        raw_tests: &[String],
    ) -> Result<StageOutput<NormalizationResult>, PipelineError> {
        if raw_tests.is_empty() {
            return Err(PipelineError::InvalidInput(
                "tests_raw must contain at least one test".to_string(),
            ));
        }

        let mut usage = LlmUsage::default();
        let result = record(self.normalization.normalize(raw_tests).await?, &mut usage);
        Ok(StageOutput { result, usage })
    }

    /// Step 3: verify `tests` against `raw_tests`, then summarize.
    pub async fn summarize(
        &self,
        raw_tests: &[String],
        tests: Vec<NormalizedTest>,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.gate_and_summarize(raw_tests, tests, LlmUsage::default())
            .await
    }

    /// Run the whole pipeline on one document.
    pub async fn process(&self, source: &DocumentSource) -> Result<PipelineOutcome, PipelineError> {
        let mut usage = LlmUsage::default();

        let extracted = self.extract_into(source, &mut usage).await?;
        let normalized = record(
            self.normalization.normalize(&extracted.tests_raw).await?,
            &mut usage,
        );

        self.gate_and_summarize(&extracted.tests_raw, normalized.tests, usage)
            .await
    }

    async fn extract_into(
        &self,
        source: &DocumentSource,
        usage: &mut LlmUsage,
    ) -> Result<ExtractionResult, PipelineError> {
        let text = self.text_extractor.extract_text(source).await?;
        tracing::debug!(extractor = self.text_extractor.name(), chars = text.len(), "Report text ready");
        Ok(record(self.extraction.extract(&text).await?, usage))
    }

    async fn gate_and_summarize(
        &self,
        raw_tests: &[String],
        tests: Vec<NormalizedTest>,
        mut usage: LlmUsage,
    ) -> Result<PipelineOutcome, PipelineError> {
        let verdict = self.guardrail.verify(raw_tests, &tests);

        if let Some(failure) = verdict.failure() {
            let detail = failure.to_string();
            tracing::warn!(detail = %detail, "Report left unprocessed");
            return Ok(PipelineOutcome::Unprocessed {
                reason: GUARDRAIL_FAILED_REASON.to_string(),
                detail,
                verdict,
                usage,
            });
        }

        tracing::info!(tests = tests.len(), "Guardrail passed");
        let PatientSummary {
            summary,
            explanations,
        } = record(self.summary.summarize(&tests).await?, &mut usage);

        Ok(PipelineOutcome::Processed(ProcessedReport {
            tests,
            summary,
            explanations,
            usage,
            processed_at: Utc::now(),
        }))
    }
}

/// Record an agent's usage and unwrap its result.
fn record<T>(response: AgentResponse<T>, usage: &mut LlmUsage) -> T {
    usage.add(&response.usage, &response.model);
    response.result
}

/// Builder for [`ReportPipeline`].
pub struct ReportPipelineBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    text_extractor: Option<Arc<dyn TextExtractor>>,
    config: RuntimeConfig,
}

impl ReportPipelineBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            text_extractor: None,
            config: RuntimeConfig::default(),
        }
    }

    /// Set the LLM provider.
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the text extractor (defaults to text-only).
    pub fn text_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.text_extractor = Some(extractor);
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the pipeline.
    pub fn build(self) -> Result<ReportPipeline, PipelineError> {
        let provider = self
            .provider
            .ok_or_else(|| PipelineError::ProviderNotConfigured("No provider set".to_string()))?;

        self.config.validate()?;

        let text_extractor = self
            .text_extractor
            .unwrap_or_else(|| Arc::new(PassthroughExtractor));

        Ok(ReportPipeline::with_text_extractor(
            provider,
            text_extractor,
            self.config,
        ))
    }
}

impl Default for ReportPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::ScriptedProvider;
    use crate::providers::ProviderError;
    use labsum_core::{GuardrailFailure, TestStatus};

    const EXTRACTION: &str = r#"{"tests_raw": ["Hemoglobin 10.2 g/dL (Low)", "WBC 11200 /uL (High)"], "confidence": 0.8}"#;
    const NORMALIZATION: &str = r#"```json
{"tests": [
  {"name": "Hemoglobin", "value": 10.2, "unit": "g/dL", "status": "low", "ref_range": {"low": 12.0, "high": 15.0}},
  {"name": "WBC", "value": 11200, "unit": "/uL", "status": "high", "ref_range": {"low": 4000, "high": 11000}}
], "normalization_confidence": 0.84}
```"#;
    const HALLUCINATED: &str = r#"{"tests": [
  {"name": "Hemoglobin", "value": 10.2, "unit": "g/dL", "status": "low", "ref_range": {"low": 12.0, "high": 15.0}},
  {"name": "Cholesterol", "value": 240, "unit": "mg/dL", "status": "high", "ref_range": {"low": 0, "high": 200}}
], "normalization_confidence": 0.9}"#;
    const SUMMARY: &str = r#"{"summary": "Low hemoglobin and high white blood cell count.", "explanations": ["Low hemoglobin may relate to anemia.", "High WBC can occur with infections."]}"#;

    fn pipeline(provider: Arc<ScriptedProvider>) -> ReportPipeline {
        ReportPipelineBuilder::new().provider(provider).build().unwrap()
    }

    fn text(s: &str) -> DocumentSource {
        DocumentSource::Text(s.to_string())
    }

    #[test]
    fn test_builder_requires_provider() {
        let result = ReportPipelineBuilder::new().build();
        assert!(matches!(result, Err(PipelineError::ProviderNotConfigured(_))));
    }

    #[test]
    fn test_builder_rejects_bad_guardrail_threshold() {
        let mut config = RuntimeConfig::default();
        config.guardrail.match_threshold = 120;

        let err = ReportPipelineBuilder::new()
            .provider(Arc::new(ScriptedProvider::new(vec![])))
            .config(config)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Config(ConfigError::ValidationError(_))));
        assert_eq!(err.status_code(), 400);
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_full_pipeline_processes_report() {
        let provider = Arc::new(ScriptedProvider::new(vec![EXTRACTION, NORMALIZATION, SUMMARY]));
        let outcome = pipeline(provider.clone())
            .process(&text("CBC: Hemglobin 10.2 g/dL (Low); WBC 11200 /uL (Hgh)"))
            .await
            .unwrap();

        assert_eq!(outcome.status_code(), 200);
        assert_eq!(provider.calls(), 3);
        assert_eq!(outcome.usage().llm_calls, 3);
        assert_eq!(outcome.usage().total_tokens, 360);

        match outcome {
            PipelineOutcome::Processed(report) => {
                assert_eq!(report.tests.len(), 2);
                assert_eq!(report.explanations.len(), 2);
            }
            other => panic!("Expected Processed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_guardrail_failure_skips_summary() {
        let provider = Arc::new(ScriptedProvider::new(vec![EXTRACTION, HALLUCINATED, SUMMARY]));
        let outcome = pipeline(provider.clone())
            .process(&text("Hemoglobin 10.2 g/dL (Low) WBC 11200 /uL (High)"))
            .await
            .unwrap();

        assert_eq!(outcome.status_code(), 422);
        assert_eq!(provider.calls(), 2, "summarizer must not be called");

        match &outcome {
            PipelineOutcome::Unprocessed {
                reason,
                detail,
                verdict,
                ..
            } => {
                assert_eq!(reason, GUARDRAIL_FAILED_REASON);
                assert!(detail.contains("cholesterol"));
                assert!(matches!(
                    verdict.failure(),
                    Some(GuardrailFailure::Unmatched { .. })
                ));
            }
            other => panic!("Expected Unprocessed, got {:?}", other),
        }

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "unprocessed");
        assert_eq!(json["reason"], GUARDRAIL_FAILED_REASON);
    }

    #[tokio::test]
    async fn test_summarize_step_runs_guardrail() {
        let provider = Arc::new(ScriptedProvider::new(vec![SUMMARY]));
        let pipeline = pipeline(provider.clone());

        let raw = vec!["Hemoglobin 10.2 (Low)".to_string()];
        let outcome = pipeline
            .summarize(&raw, vec![NormalizedTest::new("Cholesterol", 240.0, "mg/dL", TestStatus::High)])
            .await
            .unwrap();
        assert!(!outcome.is_processed());
        assert_eq!(provider.calls(), 0);

        let outcome = pipeline
            .summarize(&raw, vec![NormalizedTest::new("Hemoglobin", 10.2, "g/dL", TestStatus::Low)])
            .await
            .unwrap();
        assert!(outcome.is_processed());

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["processed_at"].is_string());
    }

    #[tokio::test]
    async fn test_empty_text_is_client_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let err = pipeline(provider.clone()).process(&text("   ")).await.unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Input text cannot be empty.");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_normalize_requires_tests() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let err = pipeline(provider).normalize(&[]).await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_malformed_model_output_is_server_error() {
        let provider = Arc::new(ScriptedProvider::new(vec!["Sorry, I can't read this report."]));
        let err = pipeline(provider)
            .extract(&text("Glucose 98 mg/dL"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("Sorry, I can't read this report."));
    }

    #[tokio::test]
    async fn test_provider_failure_aborts_run() {
        let provider = Arc::new(ScriptedProvider::with_results(vec![
            Ok(EXTRACTION.to_string()),
            Err(ProviderError::RateLimited { retry_after: None }),
        ]));
        let err = pipeline(provider.clone())
            .process(&text("Hemoglobin 10.2 g/dL (Low)"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 500);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_image_without_ocr_is_client_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let err = pipeline(provider)
            .extract(&DocumentSource::Image(vec![0xFF, 0xD8]))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_extract_reports_usage() {
        let provider = Arc::new(ScriptedProvider::new(vec![EXTRACTION]));
        let output = pipeline(provider)
            .extract(&text("Hemoglobin 10.2 g/dL (Low)"))
            .await
            .unwrap();

        assert_eq!(output.result.tests_raw.len(), 2);
        assert_eq!(output.usage.llm_calls, 1);

        let json = serde_json::to_value(&output).unwrap();
        assert!(json["tests_raw"].is_array());
        assert_eq!(json["usage"]["llm_calls"], 1);
    }
}
