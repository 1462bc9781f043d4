//! Token usage accounting for one pipeline run.

use serde::{Deserialize, Serialize};

use crate::providers::TokenUsage;

/// USD per million (input, output) tokens, matched by model-name fragment.
/// The first matching row wins; unknown models use the last row.
const GEMINI_PRICING: &[(&str, f64, f64)] = &[
    ("flash-lite", 0.075, 0.30),
    ("2.5-pro", 1.25, 10.0),
    ("2.5-flash", 0.30, 2.50),
    ("", 0.10, 0.40),
];

/// Usage summed over every model call of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub llm_calls: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    /// Rough USD cost from list prices
    pub estimated_cost: f64,
}

impl LlmUsage {
    /// Count one call made with `model`.
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.llm_calls += 1;
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.estimated_cost += call_cost(usage, model);
    }
}

fn call_cost(usage: &TokenUsage, model: &str) -> f64 {
    let (input_rate, output_rate) = GEMINI_PRICING
        .iter()
        .find(|(fragment, _, _)| model.contains(fragment))
        .map(|&(_, input, output)| (input, output))
        .unwrap_or((0.10, 0.40));

    (f64::from(usage.prompt_tokens) * input_rate + f64::from(usage.completion_tokens) * output_rate)
        / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(prompt_tokens: u32, completion_tokens: u32) -> TokenUsage {
        TokenUsage {
            prompt_tokens,
            completion_tokens,
        }
    }

    #[test]
    fn test_three_stage_run_accumulates() {
        let mut usage = LlmUsage::default();
        usage.add(&tokens(400, 60), "gemini-2.0-flash");
        usage.add(&tokens(300, 180), "gemini-2.0-flash");
        usage.add(&tokens(250, 90), "gemini-2.0-flash-001");

        assert_eq!(usage.llm_calls, 3);
        assert_eq!(usage.prompt_tokens, 950);
        assert_eq!(usage.completion_tokens, 330);
        assert_eq!(usage.total_tokens, 1280);
    }

    #[test]
    fn test_flash_pricing() {
        let mut usage = LlmUsage::default();
        usage.add(&tokens(1_000_000, 1_000_000), "gemini-2.0-flash");
        assert!((usage.estimated_cost - 0.50).abs() < 1e-9);
    }

    #[test]
    fn test_pricing_picks_most_specific_row() {
        assert!((call_cost(&tokens(1_000_000, 0), "gemini-2.0-flash-lite") - 0.075).abs() < 1e-9);
        assert!((call_cost(&tokens(0, 1_000_000), "gemini-2.5-pro") - 10.0).abs() < 1e-9);
        assert!((call_cost(&tokens(1_000_000, 0), "some-other-model") - 0.10).abs() < 1e-9);
    }
}
