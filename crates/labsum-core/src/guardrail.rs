//! Guardrail: verifies normalized tests against the raw extraction.
//!
//! The policy is strict and all-or-nothing:
//! 1. If raw and normalized counts differ by more than `max_count_skew` → FAIL
//! 2. If no test names can be parsed from the raw lines → FAIL
//! 3. For each normalized test, in order:
//!    - empty name → FAIL
//!    - exact (folded) match with a raw name → accept
//!    - best fuzzy score `< match_threshold` → FAIL
//! 4. Otherwise → PASS
//!
//! The first failing check ends verification. A single unverifiable test
//! invalidates the whole batch because the patient-facing summary must never
//! reference a test the report does not contain.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::names::extract_raw_names;
use crate::similarity::{best_match, Similarity, WeightedRatio};
use crate::types::{GuardrailFailure, GuardrailVerdict, NormalizedTest};
use crate::CoreError;

/// Default allowed difference between raw and normalized counts.
pub const DEFAULT_MAX_COUNT_SKEW: usize = 2;

/// Default minimum fuzzy score for a non-exact match.
pub const DEFAULT_MATCH_THRESHOLD: u8 = 80;

/// Tunable guardrail limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    /// Normalization may merge or split a few lines; larger divergence is
    /// treated as a systemic failure.
    pub max_count_skew: usize,

    /// Minimum similarity (0-100) for a fuzzy match.
    pub match_threshold: u8,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_count_skew: DEFAULT_MAX_COUNT_SKEW,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

impl GuardrailConfig {
    /// Check the limits are meaningful.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.match_threshold > 100 {
            return Err(CoreError::InvalidConfig(format!(
                "match_threshold must be between 0 and 100, got {}",
                self.match_threshold
            )));
        }
        Ok(())
    }
}

/// The guardrail verifier.
///
/// Generic over the similarity measure so tests and callers can substitute a
/// different scorer; [`WeightedRatio`] is the default.
#[derive(Debug, Clone, Default)]
pub struct Guardrail<S = WeightedRatio> {
    config: GuardrailConfig,
    similarity: S,
}

impl Guardrail<WeightedRatio> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GuardrailConfig) -> Self {
        Self {
            config,
            similarity: WeightedRatio,
        }
    }
}

impl<S: Similarity> Guardrail<S> {
    /// Create a guardrail with a custom similarity measure.
    pub fn with_similarity(config: GuardrailConfig, similarity: S) -> Self {
        Self { config, similarity }
    }

    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    /// Decide whether `normalized` is a trustworthy refinement of `raw_tests`.
    ///
    /// Pure and total: no I/O, always terminates.
    pub fn verify(&self, raw_tests: &[String], normalized: &[NormalizedTest]) -> GuardrailVerdict {
        let skew = raw_tests.len().abs_diff(normalized.len());
        if skew > self.config.max_count_skew {
            tracing::warn!(
                raw = raw_tests.len(),
                normalized = normalized.len(),
                "Guardrail rejected: test count skew"
            );
            return GuardrailVerdict::fail(GuardrailFailure::CountSkew {
                raw: raw_tests.len(),
                normalized: normalized.len(),
                max_skew: self.config.max_count_skew,
            });
        }

        let candidates = extract_raw_names(raw_tests);
        if candidates.is_empty() {
            tracing::warn!(raw = raw_tests.len(), "Guardrail rejected: no raw test names");
            return GuardrailVerdict::fail(GuardrailFailure::NoRawNames {
                raw: raw_tests.len(),
            });
        }

        let exact: HashSet<&str> = candidates.iter().map(String::as_str).collect();

        for (index, test) in normalized.iter().enumerate() {
            let name = test.folded_name();
            if name.is_empty() {
                tracing::warn!(index, "Guardrail rejected: normalized test without name");
                return GuardrailVerdict::fail(GuardrailFailure::EmptyName { index });
            }

            if exact.contains(name.as_str()) {
                continue;
            }

            let (best, score) = match best_match(&name, &candidates, &self.similarity) {
                Some((best, score)) => (Some(best.to_string()), score),
                None => (None, 0),
            };

            if score < self.config.match_threshold {
                tracing::warn!(
                    name = %name,
                    best_match = ?best,
                    score,
                    "Guardrail rejected: normalized test not found in raw tests"
                );
                return GuardrailVerdict::fail(GuardrailFailure::Unmatched {
                    name,
                    best_match: best,
                    score,
                    threshold: self.config.match_threshold,
                });
            }

            tracing::debug!(name = %name, best_match = ?best, score, "Fuzzy match accepted");
        }

        GuardrailVerdict::Pass
    }
}
