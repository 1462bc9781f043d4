//! Raw test-name extraction.
//!
//! A raw test line usually reads `<name> <value> <unit> (<status>)`. The
//! probable name is the longest leading run of word characters, whitespace,
//! hyphens, slashes and parentheses. Decimal points, colons, percent signs and
//! other punctuation end the run, which in practice cuts the line inside or
//! just after the value.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Leading test-name prefix.
    pub static ref NAME_PREFIX_PATTERN: Regex = Regex::new(r"^[\w\s\-\(\)/]+").unwrap();
}

/// Extract the probable test-name prefix of a single raw line.
///
/// Returns `None` when the line does not start with a name character.
/// The result is trimmed and lowercased; it may be empty when the prefix is
/// only whitespace.
pub fn extract_raw_name(raw: &str) -> Option<String> {
    NAME_PREFIX_PATTERN
        .find(raw)
        .map(|m| m.as_str().trim().to_lowercase())
}

/// Extract candidate names from raw test lines, in input order.
///
/// Lines without a name prefix are dropped, not padded.
pub fn extract_raw_names(raw_tests: &[String]) -> Vec<String> {
    raw_tests
        .iter()
        .filter_map(|line| extract_raw_name(line))
        .collect()
}
