//! Answer checking for drawing practice

use serde::Serialize;
use strsim::normalized_levenshtein;

/// Outcome of comparing recognized text with the expected answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grade {
    pub expected: String,
    pub recognized: String,
    /// Exact match after trimming
    pub correct: bool,
    /// Normalized Levenshtein similarity (0.0 - 1.0)
    pub similarity: f64,
    /// Wrong, but at least `threshold` similar
    pub close: bool,
}

/// Grade a recognition against the expected answer
pub fn grade(recognized: &str, expected: &str, threshold: f64) -> Grade {
    let recognized = recognized.trim();
    let expected = expected.trim();

    let correct = recognized == expected;
    let similarity = normalized_levenshtein(recognized, expected);

    Grade {
        expected: expected.to_string(),
        recognized: recognized.to_string(),
        correct,
        similarity,
        close: !correct && similarity >= threshold,
    }
}
