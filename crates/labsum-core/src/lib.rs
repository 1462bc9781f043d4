//! # labsum-core
//!
//! Deterministic hallucination guardrail for lab-report processing.
//!
//! A language model first extracts raw test lines from a report, then
//! normalizes them into structured records. This crate decides whether the
//! structured records can be trusted with respect to the raw lines:
//! - Does every normalized test name appear in the raw extraction?
//! - Exactly, or within a fuzzy-similarity threshold?
//! - Are the counts plausibly related?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces the same verdict
//! 2. **No I/O**: No model calls, no network, no filesystem
//! 3. **All-or-nothing**: One unverifiable test fails the whole batch
//! 4. **Explainable**: Every FAIL carries the failing check and its data
//!
//! ## Example
//!
//! ```rust
//! use labsum_core::{verify, NormalizedTest, TestStatus};
//!
//! let raw = vec!["Hemoglobin 10.2 g/dL (Low)".to_string()];
//! let normalized = vec![NormalizedTest::new("Hemoglobin", 10.2, "g/dL", TestStatus::Low)];
//!
//! let verdict = verify(&raw, &normalized);
//! assert!(verdict.is_pass());
//! ```

pub mod guardrail;
pub mod names;
pub mod report;
pub mod schema;
pub mod similarity;
pub mod types;

// Re-export main types at crate root
pub use guardrail::{Guardrail, GuardrailConfig};
pub use names::{extract_raw_name, extract_raw_names};
pub use report::{ExtractionResult, NormalizationResult, PatientSummary, SummarizeRequest};
pub use schema::{validate_response, ResponseKind};
pub use similarity::{best_match, Similarity, WeightedRatio};
pub use types::{GuardrailFailure, GuardrailVerdict, NormalizedTest, RefRange, TestStatus};

use thiserror::Error;

/// Errors raised by the core crate.
///
/// A failing guardrail is not an error; it is a [`GuardrailVerdict::Fail`].
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid guardrail configuration: {0}")]
    InvalidConfig(String),
}

/// Verify normalized tests against raw test lines with the default policy
/// (count skew 2, fuzzy threshold 80, [`WeightedRatio`] similarity).
pub fn verify(raw_tests: &[String], normalized: &[NormalizedTest]) -> GuardrailVerdict {
    Guardrail::new().verify(raw_tests, normalized)
}
