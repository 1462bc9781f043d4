//! Core data types for lab-report verification.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Interpretation of a result against its reference range.
///
/// Serialized lowercase; parsed in any letter case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Low,
    High,
    Normal,
}

impl<'de> Deserialize<'de> for TestStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.to_ascii_lowercase().as_str() {
            "low" => Ok(TestStatus::Low),
            "high" => Ok(TestStatus::High),
            "normal" => Ok(TestStatus::Normal),
            _ => Err(serde::de::Error::unknown_variant(&raw, &["low", "high", "normal"])),
        }
    }
}

impl TestStatus {
    /// Whether the result falls outside the reference range.
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, TestStatus::Normal)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Low => write!(f, "low"),
            TestStatus::High => write!(f, "high"),
            TestStatus::Normal => write!(f, "normal"),
        }
    }
}

/// Standard adult reference range for a test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefRange {
    pub low: f64,
    pub high: f64,
}

/// A structured test record produced by the normalization step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTest {
    /// Test name (e.g. "Hemoglobin"). Missing names deserialize as empty
    /// and are rejected by the guardrail.
    #[serde(default)]
    pub name: String,

    /// Measured value
    pub value: f64,

    /// Unit of measure (e.g. "g/dL")
    #[serde(default)]
    pub unit: String,

    /// Low / high / normal
    pub status: TestStatus,

    /// Reference range chosen by the normalizer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_range: Option<RefRange>,
}

impl NormalizedTest {
    /// Create a test without a reference range.
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>, status: TestStatus) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
            status,
            ref_range: None,
        }
    }

    /// Attach a reference range.
    pub fn with_ref_range(mut self, low: f64, high: f64) -> Self {
        self.ref_range = Some(RefRange { low, high });
        self
    }

    /// Name trimmed and case-folded, as compared by the guardrail.
    pub fn folded_name(&self) -> String {
        self.name.trim().to_lowercase()
    }
}

/// Why the guardrail refused a normalized result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GuardrailFailure {
    /// Raw and normalized counts diverge by more than the allowed skew.
    CountSkew {
        raw: usize,
        normalized: usize,
        max_skew: usize,
    },

    /// No test names could be parsed out of the raw lines.
    NoRawNames { raw: usize },

    /// A normalized test has an empty name.
    EmptyName { index: usize },

    /// A normalized test matches no raw name closely enough.
    Unmatched {
        name: String,
        best_match: Option<String>,
        score: u8,
        threshold: u8,
    },
}

impl fmt::Display for GuardrailFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardrailFailure::CountSkew {
                raw,
                normalized,
                max_skew,
            } => write!(
                f,
                "test count mismatch: {} raw vs {} normalized (max skew {})",
                raw, normalized, max_skew
            ),
            GuardrailFailure::NoRawNames { raw } => {
                write!(f, "no test names found in {} raw test line(s)", raw)
            }
            GuardrailFailure::EmptyName { index } => {
                write!(f, "normalized test at index {} has no name", index)
            }
            GuardrailFailure::Unmatched {
                name,
                best_match,
                score,
                threshold,
            } => match best_match {
                Some(best) => write!(
                    f,
                    "'{}' not found in raw tests: best match '{}' (score {} < {})",
                    name, best, score, threshold
                ),
                None => write!(f, "'{}' not found in raw tests", name),
            },
        }
    }
}

/// Outcome of the guardrail check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum GuardrailVerdict {
    /// Every normalized test is grounded in the raw extraction.
    Pass,

    /// At least one check failed; the batch must not be trusted.
    Fail { failure: GuardrailFailure },
}

impl GuardrailVerdict {
    pub fn fail(failure: GuardrailFailure) -> Self {
        GuardrailVerdict::Fail { failure }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, GuardrailVerdict::Pass)
    }

    /// The failure, if any.
    pub fn failure(&self) -> Option<&GuardrailFailure> {
        match self {
            GuardrailVerdict::Pass => None,
            GuardrailVerdict::Fail { failure } => Some(failure),
        }
    }

    /// Diagnostic reason for a failing verdict.
    pub fn reason(&self) -> Option<String> {
        self.failure().map(|f| f.to_string())
    }
}
