//! N-gram (trigger) extraction
//!
//! Pure function: canonical move text to every contiguous sub-sequence
//! within a length range. Deduplication is not done here; identical
//! windows at different offsets are all returned, and canonical-upsert at
//! the storage layer collapses them.

/// Extract all n-grams of lengths `min_length..=max_length`
///
/// Output is length-major, then position-major. Empty when the input has
/// fewer than `min_length` tokens.
pub fn extract_ngrams(normalized_moves: &str, min_length: usize, max_length: usize) -> Vec<String> {
    let moves: Vec<&str> = normalized_moves.split_whitespace().collect();
    let mut ngrams = Vec::new();

    for length in min_length..=max_length {
        if length == 0 || length > moves.len() {
            continue;
        }
        for window in moves.windows(length) {
            ngrams.push(window.join(" "));
        }
    }

    ngrams
}
