//! Algorithm parsing, normalization, and classification
//!
//! Composes the notation normalizer, the classifier, and the n-gram
//! extractor into the line-oriented parser the import orchestrator runs
//! over raw import text.

pub mod classify;
pub mod ngrams;
pub mod normalize;

pub use classify::classify;
pub use ngrams::extract_ngrams;
pub use normalize::{normalize, NormalizedMoves};

use cubetriggers_common::AlgType;

/// One successfully parsed algorithm line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAlgorithm {
    /// Pre-normalization move text (after the label was stripped)
    pub original_moves: String,
    /// Canonical move text; the dedup key for Algorithm rows
    pub normalized_moves: String,
    pub move_count: usize,
    pub alg_type: AlgType,
    /// Text before the `:` separator, when present
    pub case_name: Option<String>,
}

/// Parse a text block containing multiple algorithms
///
/// Lines are independent: blank lines and `#`/`//` comment lines are
/// skipped, and a line that fails normalization is silently dropped
/// rather than failing the batch.
pub fn parse_algorithms_text(text: &str) -> Vec<ParsedAlgorithm> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("//"))
        .filter_map(parse_algorithm_line)
        .collect()
}

/// Parse a single algorithm line
///
/// Supported shapes:
/// - `R U R' U'`
/// - `T-Perm: R U R' F' R U R' U' R' F R2 U' R'`
/// - `F2L #1: R U' R'`
pub fn parse_algorithm_line(line: &str) -> Option<ParsedAlgorithm> {
    let (case_name, moves_text) = match line.find(':') {
        Some(colon) => {
            let label = line[..colon].trim();
            let label = (!label.is_empty()).then(|| label.to_string());
            (label, line[colon + 1..].trim())
        }
        None => (None, line.trim()),
    };

    let normalized = normalize(moves_text)?;
    let alg_type = classify(case_name.as_deref());

    Some(ParsedAlgorithm {
        original_moves: moves_text.to_string(),
        normalized_moves: normalized.moves,
        move_count: normalized.move_count,
        alg_type,
        case_name,
    })
}
