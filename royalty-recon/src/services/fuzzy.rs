//! Text normalization and fuzzy comparison for catalog matching
//!
//! Distributor titles differ from catalog titles in punctuation, quoting
//! style and the occasional typo. Comparison happens on normalized text.

/// Strings at or above this length (in chars) are only compared by containment
const MAX_EDIT_COMPARE_LEN: usize = 20;

/// Share of the longer string's length that may differ
const MAX_EDIT_RATIO: f64 = 0.2;

/// Lower-case, collapse whitespace, then keep letters/digits/whitespace only
///
/// Whitespace is collapsed before punctuation is dropped, so `"a - b"`
/// becomes `"a  b"` with the double space kept.
pub fn normalize(value: &str) -> String {
    let collapsed = value.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned: String = collapsed
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    cleaned.trim().to_string()
}

/// Loose equality of two normalized strings
///
/// Empty never matches. Identical or containing strings match. Short strings
/// (both under 20 chars) match within an edit distance of 20% of the longer.
pub fn fuzzy_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b || a.contains(b) || b.contains(a) {
        return true;
    }

    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len < MAX_EDIT_COMPARE_LEN && b_len < MAX_EDIT_COMPARE_LEN {
        let allowed = (a_len.max(b_len) as f64 * MAX_EDIT_RATIO).ceil() as usize;
        return strsim::levenshtein(a, b) <= allowed;
    }

    false
}

/// Similarity in [0, 1] used to rank candidates of the fuzzy tiers
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  «Ночь»  Драйв! "), "ночь драйв");
        assert_eq!(normalize("Don't Stop (Remix)"), "dont stop remix");
        assert_eq!(normalize("\"Quoted\"\tTitle"), "quoted title");
        assert_eq!(normalize("!!!"), "");
        assert_eq!(normalize("Night - Drive"), "night  drive");
        assert_eq!(normalize("- Intro"), "intro");
    }

    #[test]
    fn test_edit_distance_applies_below_twenty_chars() {
        // 19 chars each, distance 4 <= ceil(19 * 0.2)
        let a = "abcdefghijklmnopqrs";
        let b = "abcdefghijklmnowxyz";
        assert_eq!(a.chars().count(), 19);
        assert!(fuzzy_match(a, b));
    }

    #[test]
    fn test_twenty_chars_need_containment() {
        // 20 chars each, distance 1 but no containment
        let a = "abcdefghijklmnopqrst";
        let b = "abcdefghijklmnopqrsx";
        assert_eq!(a.chars().count(), 20);
        assert!(!fuzzy_match(a, b));
        assert!(fuzzy_match(a, "fghijklmno"));
    }

    #[test]
    fn test_empty_never_matches() {
        assert!(!fuzzy_match("", ""));
        assert!(!fuzzy_match("night", ""));
    }

    #[test]
    fn test_typo_within_threshold() {
        assert!(fuzzy_match("nght drive", "night drive"));
    }

    #[test]
    fn test_different_scripts_do_not_match() {
        assert!(!fuzzy_match("night drive", "ночь драйв"));
    }

    #[test]
    fn test_containment_matches() {
        assert!(fuzzy_match("night drive extended version", "night drive"));
    }

    #[test]
    fn test_long_strings_need_containment() {
        // One substitution, but both strings are long
        assert!(!fuzzy_match("a very long title number one", "a very long title number two"));
    }

    #[test]
    fn test_distance_counts_chars_not_bytes() {
        // One Cyrillic substitution in a 5-char word: allowed = ceil(5 * 0.2) = 1
        assert!(fuzzy_match("драйв", "драйф"));
    }

    #[test]
    fn test_similarity_range() {
        assert_eq!(similarity("same", "same"), 1.0);
        assert!(similarity("nght drive", "night drive") > 0.8);
    }
}
