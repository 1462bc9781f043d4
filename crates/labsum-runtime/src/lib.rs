//! # labsum-runtime
//!
//! Model-backed lab-report pipeline.
//!
//! A report goes through four stages: text extraction (pass-through or OCR),
//! structured extraction of raw test lines, normalization into typed tests,
//! and a patient-friendly summary. The three middle stages call a language
//! model through [`LlmProvider`]. Between normalization and summary, the
//! deterministic guardrail from `labsum-core` decides whether the normalized
//! tests can be trusted; if not, the run ends as unprocessed and the summary
//! is never generated.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use labsum_runtime::{DocumentSource, GeminiProvider, ReportPipelineBuilder};
//!
//! let pipeline = ReportPipelineBuilder::new()
//!     .provider(Arc::new(GeminiProvider::from_env()?))
//!     .build()?;
//!
//! let outcome = pipeline
//!     .process(&DocumentSource::Text("Hemoglobin 10.2 g/dL (Low)".into()))
//!     .await?;
//! println!("{}", outcome.status_code());
//! ```

pub mod agents;
pub mod config;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod text;
pub mod usage;

pub use agents::{AgentError, AgentResponse, ExtractionAgent, NormalizationAgent, SummaryAgent};
pub use config::{ConfigError, RuntimeConfig};
pub use orchestrator::{
    PipelineError, PipelineOutcome, ProcessedReport, ReportPipeline, ReportPipelineBuilder,
    StageOutput, GUARDRAIL_FAILED_REASON,
};
pub use providers::{
    ApiCredential, ChatMessage, CompletionConfig, CompletionResponse, GeminiProvider,
    LlmProvider, ProviderError, ProviderRegistry, Role, TokenUsage,
};
pub use text::{DocumentSource, PassthroughExtractor, TesseractExtractor, TextError, TextExtractor};
pub use usage::LlmUsage;
