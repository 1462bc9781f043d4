//! Fuzzy string similarity on a 0-100 scale.
//!
//! The guardrail only depends on the [`Similarity`] trait. The default
//! implementation, [`WeightedRatio`], combines several edit-distance based
//! ratios so that a single OCR typo, a trailing value fragment or a reordered
//! token does not push a genuine test name below the match threshold, while an
//! unrelated name stays far below it.
//!
//! ## Scoring
//!
//! 1. Both strings are preprocessed: non-ASCII characters are dropped, every
//!    character other than `[A-Za-z0-9_]` becomes a space, the result is
//!    lowercased and trimmed. An empty side scores 0.
//! 2. `ratio` is `100 * 2 * LCS / (len_a + len_b)`, the indel-normalized
//!    similarity.
//! 3. When the lengths are close (ratio of lengths below 1.5) the score is the
//!    best of `ratio`, `0.95 * token_sort_ratio` and `0.95 * token_set_ratio`.
//! 4. Otherwise the partial variants are used instead, scaled by 0.9 (0.6 when
//!    one side is more than eight times longer).
//!
//! All intermediate and final scores round half to even.

use std::collections::BTreeSet;

/// A string similarity measure returning a score in `[0, 100]`.
pub trait Similarity: Send + Sync {
    /// Score how similar `a` and `b` are. 100 means identical.
    fn score(&self, a: &str, b: &str) -> u8;
}

/// Default token-aware similarity. See the module docs for the algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedRatio;

impl Similarity for WeightedRatio {
    fn score(&self, a: &str, b: &str) -> u8 {
        weighted_ratio(a, b)
    }
}

const UNBASE_SCALE: f64 = 0.95;
const PARTIAL_SCALE: f64 = 0.90;
const LONG_PARTIAL_SCALE: f64 = 0.60;

/// Normalize a string before scoring.
pub fn preprocess(s: &str) -> String {
    let replaced: String = s
        .chars()
        .filter(|c| c.is_ascii())
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    replaced.trim().to_string()
}

/// Weighted combination of the ratios below, on preprocessed input.
pub fn weighted_ratio(a: &str, b: &str) -> u8 {
    let p1 = preprocess(a);
    let p2 = preprocess(b);
    if p1.is_empty() || p2.is_empty() {
        return 0;
    }

    let base = f64::from(ratio(&p1, &p2));

    let len1 = p1.chars().count() as f64;
    let len2 = p2.chars().count() as f64;
    let len_ratio = len1.max(len2) / len1.min(len2);

    if len_ratio < 1.5 {
        let tsor = f64::from(token_sort_ratio(&p1, &p2)) * UNBASE_SCALE;
        let tser = f64::from(token_set_ratio(&p1, &p2)) * UNBASE_SCALE;
        return round_score(base.max(tsor).max(tser));
    }

    let partial_scale = if len_ratio > 8.0 {
        LONG_PARTIAL_SCALE
    } else {
        PARTIAL_SCALE
    };

    let partial = f64::from(partial_ratio(&p1, &p2)) * partial_scale;
    let ptsor = f64::from(partial_token_sort_ratio(&p1, &p2)) * UNBASE_SCALE * partial_scale;
    let ptser = f64::from(partial_token_set_ratio(&p1, &p2)) * UNBASE_SCALE * partial_scale;

    round_score(base.max(partial).max(ptsor).max(ptser))
}

/// Indel-normalized similarity of two strings.
pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    round_score(100.0 * char_ratio(&a, &b))
}

/// Best `ratio` of the shorter string against equally long windows of the
/// longer one.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    let mut best = 0.0_f64;
    for window in longer.windows(shorter.len()) {
        let r = char_ratio(shorter, window);
        if r > 0.995 {
            return 100;
        }
        best = best.max(r);
    }

    round_score(100.0 * best)
}

/// `ratio` after sorting whitespace-separated tokens.
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    ratio(&sort_tokens(a), &sort_tokens(b))
}

/// `ratio` over the shared and differing token sets.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    token_set(a, b, ratio)
}

fn partial_token_sort_ratio(a: &str, b: &str) -> u8 {
    partial_ratio(&sort_tokens(a), &sort_tokens(b))
}

fn partial_token_set_ratio(a: &str, b: &str) -> u8 {
    token_set(a, b, partial_ratio)
}

fn token_set(a: &str, b: &str, scorer: fn(&str, &str) -> u8) -> u8 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0;
    }

    let tokens1: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens2: BTreeSet<&str> = b.split_whitespace().collect();

    let sect = join_tokens(tokens1.intersection(&tokens2));
    let diff1to2 = join_tokens(tokens1.difference(&tokens2));
    let diff2to1 = join_tokens(tokens2.difference(&tokens1));

    let combined1to2 = format!("{} {}", sect, diff1to2).trim().to_string();
    let combined2to1 = format!("{} {}", sect, diff2to1).trim().to_string();

    [
        scorer(&sect, &combined1to2),
        scorer(&sect, &combined2to1),
        scorer(&combined1to2, &combined2to1),
    ]
    .into_iter()
    .max()
    .unwrap_or(0)
}

/// Find the highest-scoring candidate. Ties keep the earliest candidate.
pub fn best_match<'a, S: Similarity + ?Sized>(
    query: &str,
    candidates: &'a [String],
    similarity: &S,
) -> Option<(&'a str, u8)> {
    let mut best: Option<(&'a str, u8)> = None;
    for candidate in candidates {
        let score = similarity.score(query, candidate);
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((candidate.as_str(), score)),
        }
    }
    best
}

fn sort_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn join_tokens<'a, 'b: 'a>(tokens: impl Iterator<Item = &'a &'b str>) -> String {
    tokens.copied().collect::<Vec<_>>().join(" ")
}

/// `2 * LCS / (len_a + len_b)` in `[0, 1]`; 0 when either side is empty.
fn char_ratio(a: &[char], b: &[char]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let lcs = lcs_len(a, b);
    (2 * lcs) as f64 / (a.len() + b.len()) as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for &a_ch in a {
        for (j, &b_ch) in b.iter().enumerate() {
            curr[j + 1] = if a_ch == b_ch {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

fn round_score(value: f64) -> u8 {
    value.round_ties_even().clamp(0.0, 100.0) as u8
}
