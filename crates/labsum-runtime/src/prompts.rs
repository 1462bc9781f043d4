//! Prompts for the three model-backed stages.
//!
//! Each stage sends a fixed system prompt (role, rules, output format) and a
//! user message carrying the data. Inputs that are lists are embedded as JSON.

use labsum_core::{NormalizedTest, ResponseKind};

/// Structured extraction: pull raw test lines out of report text.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You are a highly accurate medical data extraction assistant.
Analyze the text of a medical lab report provided by the user.

## Tasks
1. Identify and pull out every line that contains a medical test, its value, unit, and status.
2. Correct obvious OCR typos in test names (e.g. 'Hemglobin' becomes 'Hemoglobin', 'Hgh' becomes 'High').

## Output Format (JSON)
Return ONLY a JSON object with two keys:
{
  "tests_raw": ["one corrected string per test line"],
  "confidence": 0.0-1.0
}
"#;

/// Normalization: turn raw test lines into structured records.
pub const NORMALIZATION_SYSTEM_PROMPT: &str = r#"
You are a medical data normalization expert.
Convert the list of raw test strings provided by the user into structured JSON.

For each string, create a JSON object with these keys:
- "name": the test name
- "value": the numeric value
- "unit": the unit of measure
- "status": "low", "high", or "normal"
- "ref_range": an object with numeric "low" and "high" values

## Important Rule
For every test, you MUST provide a standard reference range based on common
medical knowledge for an adult. IGNORE any reference ranges that may be present
in the input strings and use your own standard values instead.

## Output Format (JSON)
Return ONLY a JSON object with two keys:
{
  "tests": [ ...structured test objects... ],
  "normalization_confidence": 0.0-1.0
}
"#;

/// Summary: explain normalized results to a patient.
pub const SUMMARY_SYSTEM_PROMPT: &str = r#"
You are a helpful medical assistant.
Do not provide a diagnosis or medical advice.

Based on the JSON lab results provided by the user, generate a simple summary and
one-sentence explanations for any results marked "low" or "high".

## Output Format (JSON)
Return ONLY a valid JSON object with two keys:
1. "summary": a single string summarizing the main findings.
2. "explanations": a JSON array containing ONLY simple strings. Each string is a
   one-sentence explanation for an abnormal test. Do not use objects or
   key-value pairs within this array.
"#;

/// System prompt for a stage.
pub fn get_stage_prompt(kind: ResponseKind) -> &'static str {
    match kind {
        ResponseKind::Extraction => EXTRACTION_SYSTEM_PROMPT,
        ResponseKind::Normalization => NORMALIZATION_SYSTEM_PROMPT,
        ResponseKind::Summary => SUMMARY_SYSTEM_PROMPT,
    }
}

/// User message for structured extraction.
pub fn extraction_prompt(text: &str) -> String {
    format!("Report Text: --- {} ---", text)
}

/// User message for normalization.
pub fn normalization_prompt(raw_tests: &[String]) -> Result<String, serde_json::Error> {
    Ok(format!("Input: {}", serde_json::to_string(raw_tests)?))
}

/// User message for the patient summary.
pub fn summary_prompt(tests: &[NormalizedTest]) -> Result<String, serde_json::Error> {
    Ok(format!("Input: {}", serde_json::to_string(tests)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use labsum_core::TestStatus;

    #[test]
    fn test_prompt_retrieval() {
        assert!(get_stage_prompt(ResponseKind::Extraction).contains("tests_raw"));
        assert!(get_stage_prompt(ResponseKind::Normalization).contains("normalization_confidence"));
        assert!(get_stage_prompt(ResponseKind::Summary).contains("explanations"));
    }

    #[test]
    fn test_normalization_prompt_overrides_ranges() {
        assert!(NORMALIZATION_SYSTEM_PROMPT.contains("IGNORE any reference ranges"));
        assert!(NORMALIZATION_SYSTEM_PROMPT.contains("adult"));
    }

    #[test]
    fn test_summary_prompt_forbids_advice() {
        assert!(SUMMARY_SYSTEM_PROMPT.contains("Do not provide a diagnosis or medical advice"));
        assert!(SUMMARY_SYSTEM_PROMPT.contains("ONLY simple strings"));
    }

    #[test]
    fn test_extraction_prompt_embeds_text() {
        let prompt = extraction_prompt("Hemoglobin 10.2 g/dL (Low)");
        assert_eq!(prompt, "Report Text: --- Hemoglobin 10.2 g/dL (Low) ---");
    }

    #[test]
    fn test_normalization_prompt_embeds_json() {
        let raw = vec!["WBC 11200 /uL (High)".to_string()];
        let prompt = normalization_prompt(&raw).unwrap();
        assert_eq!(prompt, r#"Input: ["WBC 11200 /uL (High)"]"#);
    }

    #[test]
    fn test_summary_prompt_embeds_tests() {
        let tests = vec![NormalizedTest::new("Hemoglobin", 10.2, "g/dL", TestStatus::Low)];
        let prompt = summary_prompt(&tests).unwrap();
        assert!(prompt.starts_with("Input: ["));
        assert!(prompt.contains(r#""status":"low""#));
    }
}
