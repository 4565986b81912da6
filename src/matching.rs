//! Text normalizer and fuzzy matcher.
//!
//! Pure functions scoring how well OCR text supports a claimed name and
//! date of birth, independent of any LLM. All scores live in `[0,1]`; a
//! score of exactly `0.0` means "signal absent", not "confirmed mismatch".

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::clamp_score;

/// ISO-like date layouts: a 19xx/20xx year, then a 1-2 digit month (1-12)
/// and a 1-2 digit day (1-31), separated by `-`, `/`, or `.`. Alternatives
/// are ordered longest-first so two-digit components match in full.
static DOB_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:19|20)\d{2}[-/.](?:1[0-2]|0?[1-9])[-/.](?:3[01]|[12]\d|0?[1-9])")
        .expect("DOB pattern is valid")
});

/// Deterministic fuzzy-match outcome for one document's OCR lines.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatchResult {
    /// Mean over the strictly-positive sub-scores; `0.0` when both are absent.
    pub match_score: f64,
    pub name_score: f64,
    pub dob_score: f64,
    /// OCR line that best matched the claimed name.
    pub best_name_line: Option<String>,
    /// Date candidate that best matched the claimed date of birth.
    pub best_dob_value: Option<String>,
}

/// Lowercase, collapse whitespace runs to single spaces, trim. No other
/// semantic changes.
pub fn normalize(value: &str) -> String {
    value
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Token-set similarity in `[0,1]`, insensitive to word order and tolerant
/// of extra or missing tokens (honorifics, middle names). Each token of the
/// smaller token set is matched against its best Jaro-Winkler counterpart in
/// the other set; the score is the mean of those best matches. Returns `0.0`
/// when either input normalizes to empty.
pub fn score_strings(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut tokens_a: Vec<&str> = a.split(' ').collect();
    let mut tokens_b: Vec<&str> = b.split(' ').collect();
    tokens_a.sort_unstable();
    tokens_a.dedup();
    tokens_b.sort_unstable();
    tokens_b.dedup();

    let (small, large) = if tokens_a.len() <= tokens_b.len() {
        (tokens_a, tokens_b)
    } else {
        (tokens_b, tokens_a)
    };

    let total: f64 = small
        .iter()
        .map(|token| {
            large
                .iter()
                .map(|candidate| strsim::jaro_winkler(token, candidate))
                .fold(0.0, f64::max)
        })
        .sum();

    clamp_score(total / small.len() as f64)
}

/// Digit-only date similarity: `1.0` iff the digit strings are identical,
/// `0.0` when either side carries no digits, otherwise the best
/// normalized-Levenshtein similarity of the shorter digit string against
/// every equal-length window of the longer (partial-overlap ratio).
pub fn score_dates(ocr_candidate: &str, expected: &str) -> f64 {
    let candidate_digits: String = ocr_candidate.chars().filter(char::is_ascii_digit).collect();
    let expected_digits: String = expected.chars().filter(char::is_ascii_digit).collect();
    if candidate_digits.is_empty() || expected_digits.is_empty() {
        return 0.0;
    }
    if candidate_digits == expected_digits {
        return 1.0;
    }

    let (short, long) = if candidate_digits.len() <= expected_digits.len() {
        (candidate_digits.as_str(), expected_digits.as_str())
    } else {
        (expected_digits.as_str(), candidate_digits.as_str())
    };

    let window = short.len();
    let best = (0..=long.len() - window)
        .map(|start| strsim::normalized_levenshtein(short, &long[start..start + window]))
        .fold(0.0, f64::max);
    clamp_score(best)
}

/// Every ISO-like date substring found in a line.
pub fn date_candidates(line: &str) -> Vec<&str> {
    DOB_PATTERN.find_iter(line).map(|m| m.as_str()).collect()
}

/// Score every OCR line against the claimed name and every date candidate
/// against the claimed date of birth, keeping the single best of each.
pub fn evaluate(lines: &[String], expected_name: &str, expected_dob: &str) -> FuzzyMatchResult {
    let mut best_name_score = 0.0;
    let mut best_name_line: Option<String> = None;
    let mut best_dob_score = 0.0;
    let mut best_dob_value: Option<String> = None;

    for line in lines.iter().filter(|line| !line.trim().is_empty()) {
        let name_score = score_strings(line, expected_name);
        if name_score > best_name_score {
            best_name_score = name_score;
            best_name_line = Some(line.clone());
        }

        for candidate in date_candidates(line) {
            let dob_score = score_dates(candidate, expected_dob);
            if dob_score > best_dob_score {
                best_dob_score = dob_score;
                best_dob_value = Some(candidate.to_string());
            }
        }
    }

    // Average only the signals that are present so a document type that
    // structurally lacks one field is not penalized.
    let present: Vec<f64> = [best_name_score, best_dob_score]
        .into_iter()
        .filter(|score| *score > 0.0)
        .collect();
    let match_score = if present.is_empty() {
        0.0
    } else {
        present.iter().sum::<f64>() / present.len() as f64
    };

    FuzzyMatchResult {
        match_score: clamp_score(match_score),
        name_score: best_name_score,
        dob_score: best_dob_score,
        best_name_line,
        best_dob_value,
    }
}
