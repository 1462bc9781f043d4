//! Stage results exchanged between pipeline steps.

use serde::{Deserialize, Serialize};

use crate::types::NormalizedTest;

/// Output of the structured-extraction step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// One string per test line, with obvious OCR typos corrected
    pub tests_raw: Vec<String>,

    /// Model-reported confidence (0.0 - 1.0)
    #[serde(default)]
    pub confidence: f64,
}

/// Output of the normalization step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationResult {
    pub tests: Vec<NormalizedTest>,

    /// Model-reported confidence (0.0 - 1.0)
    #[serde(default)]
    pub normalization_confidence: f64,
}

/// Patient-facing summary of normalized results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSummary {
    /// Main findings in plain language
    pub summary: String,

    /// One sentence per abnormal result
    #[serde(default)]
    pub explanations: Vec<String>,
}

/// Input of the guardrail-gated summarize step: the raw lines plus the
/// normalized tests derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizeRequest {
    pub tests_raw: Vec<String>,
    pub tests: Vec<NormalizedTest>,
}
