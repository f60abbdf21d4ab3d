//! Algorithm classifier
//!
//! Maps an optional case label onto the closed AlgType set by
//! case-insensitive substring matching against keyword groups. Labels are
//! untrusted free text that can match several groups, so the evaluation
//! order below is a contract: F2L, then COLL (before OLL, since "coll"
//! contains "oll"), then OLL, PLL, CMLL, LSE, ZBLL.

use cubetriggers_common::AlgType;

/// Classify an algorithm from its case label; no label means OTHER
pub fn classify(case_name: Option<&str>) -> AlgType {
    let Some(case_name) = case_name else {
        return AlgType::Other;
    };
    let name = case_name.to_lowercase();

    let groups: [(AlgType, &[&str]); 7] = [
        (AlgType::F2l, &["f2l", "first two layers"]),
        (AlgType::Coll, &["coll"]),
        (AlgType::Oll, &["oll", "orientation"]),
        (
            AlgType::Pll,
            &["pll", "permutation", "perm", "t-perm", "a-perm", "u-perm"],
        ),
        (AlgType::Cmll, &["cmll", "corners"]),
        (AlgType::Lse, &["lse", "last six edges"]),
        (AlgType::Zbll, &["zbll"]),
    ];

    for (alg_type, keywords) in groups {
        if keywords.iter().any(|kw| name.contains(kw)) {
            return alg_type;
        }
    }

    AlgType::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_label_is_other() {
        assert_eq!(classify(None), AlgType::Other);
    }

    #[test]
    fn unrecognized_label_is_other() {
        assert_eq!(classify(Some("Setup move")), AlgType::Other);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(classify(Some("F2L #23")), AlgType::F2l);
        assert_eq!(classify(Some("f2l pair")), AlgType::F2l);
        assert_eq!(classify(Some("OLL 21")), AlgType::Oll);
    }

    #[test]
    fn coll_wins_over_oll() {
        // "COLL T" contains both "coll" and "oll"; precedence says COLL
        assert_eq!(classify(Some("COLL T")), AlgType::Coll);
        assert_eq!(classify(Some("coll case 5")), AlgType::Coll);
    }

    #[test]
    fn perm_keywords_are_pll() {
        assert_eq!(classify(Some("T-Perm")), AlgType::Pll);
        assert_eq!(classify(Some("Ua permutation")), AlgType::Pll);
    }

    #[test]
    fn remaining_groups_match() {
        assert_eq!(classify(Some("CMLL Sune")), AlgType::Cmll);
        assert_eq!(classify(Some("LSE 4c")), AlgType::Lse);
        assert_eq!(classify(Some("last six edges")), AlgType::Lse);
        assert_eq!(classify(Some("ZBLL T")), AlgType::Zbll);
        assert_eq!(classify(Some("orientation case")), AlgType::Oll);
    }

    #[test]
    fn f2l_outranks_everything() {
        // Free text can hit several groups at once
        assert_eq!(classify(Some("F2L corners perm")), AlgType::F2l);
    }
}
