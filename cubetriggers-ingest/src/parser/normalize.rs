//! Move notation normalizer
//!
//! Pure function from a raw notation fragment to canonical move text plus
//! a move count. Canonical form: whitespace-separated tokens, faces
//! uppercase, wide moves as `<FACE>w`, slices (M/E/S) uppercase, `2`/`'`
//! suffixes attached to their token, whole-cube rotations removed.

use once_cell::sync::Lazy;
use regex::Regex;

/// Move token grammar: face or slice letter, optional wide marker,
/// optional double/prime suffix. Case-insensitive on the leading letter.
static MOVE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([RLUDFBMESrludfbmes])([wW])?([2'])?$").expect("valid regex"));

/// Whole-cube rotation: x/y/z with optional double/prime suffix
static ROTATION_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[xyzXYZ][2']?$").expect("valid regex"));

/// Canonical move text and its move count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMoves {
    pub moves: String,
    pub move_count: usize,
}

/// Normalize a notation fragment
///
/// Returns None when the fragment contains no token matching the move
/// grammar at all (a rejected line, silently dropped by the parser).
/// Tokens that match neither the move grammar nor the rotation grammar
/// pass through verbatim and still count as moves; rejection is only
/// about the complete absence of recognizable moves.
pub fn normalize(fragment: &str) -> Option<NormalizedMoves> {
    // Parentheses are grouping sugar only
    let stripped: String = fragment.chars().filter(|c| *c != '(' && *c != ')').collect();

    let mut saw_move = false;
    let mut canonical: Vec<String> = Vec::new();

    for token in stripped.split_whitespace() {
        if let Some(caps) = MOVE_TOKEN.captures(token) {
            saw_move = true;
            canonical.push(canonicalize_move(&caps));
        } else if ROTATION_TOKEN.is_match(token) {
            // Rotations reorient the whole cube; they are not moves
            continue;
        } else {
            canonical.push(token.to_string());
        }
    }

    if !saw_move {
        return None;
    }

    let move_count = canonical.len();
    Some(NormalizedMoves {
        moves: canonical.join(" "),
        move_count,
    })
}

/// Count moves in already-canonical text
pub fn count_moves(normalized: &str) -> usize {
    normalized.split_whitespace().count()
}

fn canonicalize_move(caps: &regex::Captures<'_>) -> String {
    let letter = caps
        .get(1)
        .map(|m| m.as_str().chars().next().expect("single letter"))
        .expect("capture 1 always present");
    let was_lowercase = letter.is_ascii_lowercase();
    let letter = letter.to_ascii_uppercase();
    let has_wide = caps.get(2).is_some();
    let suffix = caps.get(3).map(|m| m.as_str()).unwrap_or("");

    let is_slice = matches!(letter, 'M' | 'E' | 'S');

    // A bare lowercase face letter is shorthand for the wide move; slices
    // are upper-cased but never widened.
    let wide = if is_slice { has_wide } else { has_wide || was_lowercase };

    let mut out = String::with_capacity(4);
    out.push(letter);
    if wide {
        out.push('w');
    }
    out.push_str(suffix);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moves(fragment: &str) -> String {
        normalize(fragment).expect("fragment has moves").moves
    }

    #[test]
    fn collapses_whitespace_and_strips_parens() {
        assert_eq!(moves("(R  U)   R'\tU'"), "R U R' U'");
    }

    #[test]
    fn rotations_are_removed_and_not_counted() {
        let result = normalize("x R U R' x'").unwrap();
        assert_eq!(result.moves, "R U R'");
        assert_eq!(result.move_count, 3);
    }

    #[test]
    fn lowercase_faces_become_wide_moves() {
        assert_eq!(moves("r u' f2"), "Rw Uw' Fw2");
        assert_eq!(moves("Rw U"), "Rw U");
    }

    #[test]
    fn slices_are_uppercased_but_not_widened() {
        assert_eq!(moves("m' U m2 e s"), "M' U M2 E S");
    }

    #[test]
    fn suffixes_stay_attached() {
        assert_eq!(moves("R2 U' Bw2"), "R2 U' Bw2");
    }

    #[test]
    fn fragment_without_any_move_token_is_rejected() {
        assert!(normalize("").is_none());
        assert!(normalize("   ").is_none());
        assert!(normalize("hello world").is_none());
        // Only rotations is still not a single move
        assert!(normalize("x y2 z'").is_none());
    }

    #[test]
    fn normalization_is_idempotent() {
        for fragment in ["x R U R' x'", "r u r'", "(R U R' U')", "M2 U M2 U2 M2 U M2"] {
            let once = normalize(fragment).unwrap();
            let twice = normalize(&once.moves).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn move_count_matches_token_count() {
        let result = normalize("R U R' F' R U R' U' R' F R2 U' R'").unwrap();
        assert_eq!(result.move_count, 13);
        assert_eq!(count_moves(&result.moves), 13);
    }
}
