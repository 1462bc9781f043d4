//! Property-based tests for the guardrail verifier
//!
//! These check decision rules that must hold for every input, not just the
//! hand-picked report lines in the unit tests.

use proptest::prelude::*;
use labsum_core::{
    Guardrail, GuardrailConfig, GuardrailFailure, NormalizedTest, Similarity, TestStatus,
};

/// Scores every pair with the same value, isolating the guardrail from
/// the default similarity measure.
struct FixedScore(u8);

impl Similarity for FixedScore {
    fn score(&self, _a: &str, _b: &str) -> u8 {
        self.0
    }
}

fn test_named(name: &str) -> NormalizedTest {
    NormalizedTest::new(name, 1.0, "mg/dL", TestStatus::Normal)
}

// Test names as they appear on reports: letters, optional hyphenated suffix.
fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z]{2,12}(-[A-Za-z]{1,3})?"
}

// A raw line whose name prefix ends at the colon.
fn raw_line(name: &str, value: u32) -> String {
    format!("{}: {}.{} mg/dL (High)", name, value / 10, value % 10)
}

fn raw_lines_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[A-Za-z0-9 ./()%:-]{0,30}", 0..8)
}

fn normalized_strategy() -> impl Strategy<Value = Vec<NormalizedTest>> {
    prop::collection::vec(name_strategy().prop_map(|n| test_named(&n)), 0..8)
}

// ============================================================================
// Count skew
// ============================================================================

proptest! {
    // Property: a count difference above 2 always fails, whatever the names
    #[test]
    fn test_large_count_skew_always_fails(
        raw in raw_lines_strategy(),
        normalized in normalized_strategy()
    ) {
        prop_assume!(raw.len().abs_diff(normalized.len()) > 2);

        let verdict = Guardrail::new().verify(&raw, &normalized);
        let is_count_skew = matches!(verdict.failure(), Some(GuardrailFailure::CountSkew { .. }));
        prop_assert!(is_count_skew, "Expected CountSkew, got {:?}", verdict);
    }

    // Property: count skew is checked first, even with a perfect scorer
    #[test]
    fn test_count_skew_ignores_similarity(
        names in prop::collection::vec(name_strategy(), 3..8)
    ) {
        let raw: Vec<String> = names.iter().map(|n| raw_line(n, 102)).collect();
        let guardrail = Guardrail::with_similarity(GuardrailConfig::default(), FixedScore(100));

        prop_assert!(!guardrail.verify(&raw, &[]).is_pass());
    }
}

// ============================================================================
// Matching
// ============================================================================

proptest! {
    // Property: names equal to a raw prefix pass regardless of fuzzy score
    #[test]
    fn test_exact_names_always_pass(
        names in prop::collection::vec(name_strategy(), 1..8),
        value in 0u32..100_000,
        upper in any::<bool>()
    ) {
        let raw: Vec<String> = names.iter().map(|n| raw_line(n, value)).collect();
        let normalized: Vec<NormalizedTest> = names
            .iter()
            .map(|n| {
                let shown = if upper { n.to_uppercase() } else { n.to_lowercase() };
                test_named(&format!("  {}  ", shown))
            })
            .collect();

        let guardrail = Guardrail::with_similarity(GuardrailConfig::default(), FixedScore(0));
        let verdict = guardrail.verify(&raw, &normalized);
        prop_assert!(verdict.is_pass(), "Exact names rejected: {:?}", verdict);
    }

    // Property: fuzzy acceptance flips exactly at the threshold
    #[test]
    fn test_fuzzy_acceptance_is_monotonic(score in 0u8..=100) {
        let raw = vec!["Hemoglobin 10.2 g/dL (Low)".to_string()];
        let normalized = vec![test_named("Haemoglobin")];

        let guardrail = Guardrail::with_similarity(GuardrailConfig::default(), FixedScore(score));
        let verdict = guardrail.verify(&raw, &normalized);
        prop_assert_eq!(verdict.is_pass(), score >= 80);
    }

    // Property: the verdict does not depend on the order of raw lines
    #[test]
    fn test_raw_order_does_not_change_verdict(
        (raw, shuffled) in raw_lines_strategy()
            .prop_flat_map(|raw| (Just(raw.clone()), Just(raw).prop_shuffle())),
        normalized in normalized_strategy()
    ) {
        let guardrail = Guardrail::new();
        prop_assert_eq!(
            guardrail.verify(&raw, &normalized).is_pass(),
            guardrail.verify(&shuffled, &normalized).is_pass()
        );
    }

    // Property: verification is deterministic
    #[test]
    fn test_verify_is_deterministic(
        raw in raw_lines_strategy(),
        normalized in normalized_strategy()
    ) {
        let guardrail = Guardrail::new();
        prop_assert_eq!(
            guardrail.verify(&raw, &normalized),
            guardrail.verify(&raw, &normalized)
        );
    }
}

// ============================================================================
// Short-circuit diagnostics
// ============================================================================

#[test]
fn test_failing_test_position_changes_diagnostic_only() {
    let raw = vec![
        "Hemoglobin 10.2 g/dL (Low)".to_string(),
        "WBC 11200 /uL (High)".to_string(),
    ];

    let first = vec![test_named("Cholesterol"), test_named("WBC")];
    let second = vec![test_named("WBC"), test_named("Ferritin")];

    let guardrail = Guardrail::new();
    let a = guardrail.verify(&raw, &first);
    let b = guardrail.verify(&raw, &second);

    assert!(!a.is_pass());
    assert!(!b.is_pass());
    assert_ne!(a.reason(), b.reason());
}
