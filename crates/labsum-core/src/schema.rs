//! JSON Schema validation for model responses.
//!
//! Every structured answer from the language model is validated against an
//! embedded schema before it is deserialized. A response that does not match
//! is a collaborator failure, never a silently defaulted value.

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::CoreError;

const EXTRACTION_SCHEMA_JSON: &str = include_str!("../schema/extraction.schema.json");
const NORMALIZATION_SCHEMA_JSON: &str = include_str!("../schema/normalization.schema.json");
const SUMMARY_SCHEMA_JSON: &str = include_str!("../schema/summary.schema.json");

static EXTRACTION_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();
static NORMALIZATION_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();
static SUMMARY_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Which pipeline stage produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Extraction,
    Normalization,
    Summary,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseKind::Extraction => write!(f, "extraction"),
            ResponseKind::Normalization => write!(f, "normalization"),
            ResponseKind::Summary => write!(f, "summary"),
        }
    }
}

impl ResponseKind {
    fn schema_source(&self) -> &'static str {
        match self {
            ResponseKind::Extraction => EXTRACTION_SCHEMA_JSON,
            ResponseKind::Normalization => NORMALIZATION_SCHEMA_JSON,
            ResponseKind::Summary => SUMMARY_SCHEMA_JSON,
        }
    }

    fn cell(&self) -> &'static OnceLock<Result<jsonschema::Validator, String>> {
        match self {
            ResponseKind::Extraction => &EXTRACTION_SCHEMA,
            ResponseKind::Normalization => &NORMALIZATION_SCHEMA,
            ResponseKind::Summary => &SUMMARY_SCHEMA,
        }
    }
}

/// Get or compile the validator for a response kind.
fn get_validator(kind: ResponseKind) -> Result<&'static jsonschema::Validator, CoreError> {
    let result = kind.cell().get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(kind.schema_source()) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid {} schema JSON: {}", kind, e)),
        };

        match jsonschema::options().build(&schema_value) {
            Ok(v) => Ok(v),
            Err(e) => Err(format!("Failed to compile {} schema: {}", kind, e)),
        }
    });

    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(CoreError::Schema(e.clone())),
    }
}

/// Validate a model response against the schema for its stage.
///
/// Returns every violation, each with its JSON pointer.
pub fn validate_response(kind: ResponseKind, value: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator(kind).map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
