//! Deterministic slug derivation for podcast/episode names (§3 `ArtifactKey`).

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

const MAX_SLUG_LEN: usize = 100;

fn non_alphanumeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static regex is valid"))
}

/// Lowercase, Unicode-normalize, collapse non-alphanumerics to `-`, trim, cap
/// at 100 chars, and fall back to `"untitled"` when the result is empty.
///
/// Idempotent: `slugify(&slugify(s)) == slugify(s)` for any `s`.
pub fn slugify(input: &str) -> String {
    let normalized: String = input.nfkd().filter(char::is_ascii).collect();
    let lowered = normalized.to_lowercase();
    let collapsed = non_alphanumeric().replace_all(&lowered, "-");
    let trimmed = collapsed.trim_matches('-');

    let truncated: String = trimmed.chars().take(MAX_SLUG_LEN).collect();
    let truncated = truncated.trim_end_matches('-');

    if truncated.is_empty() {
        "untitled".to_string()
    } else {
        truncated.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_collapses_punctuation() {
        assert_eq!(slugify("The Joe Show! #42"), "the-joe-show-42");
    }

    #[test]
    fn empty_input_falls_back_to_untitled() {
        assert_eq!(slugify(""), "untitled");
        assert_eq!(slugify("!!!"), "untitled");
    }

    #[test]
    fn truncates_to_max_length() {
        let long = "a".repeat(150);
        assert_eq!(slugify(&long).len(), MAX_SLUG_LEN);
    }

    #[test]
    fn is_idempotent() {
        let once = slugify("Café de Paris — Episode 7");
        let twice = slugify(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn unicode_is_normalized_to_ascii() {
        assert_eq!(slugify("Café"), "cafe");
    }

    proptest::proptest! {
        #[test]
        fn slugify_is_idempotent_for_any_input(input in ".*") {
            let once = slugify(&input);
            let twice = slugify(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn slugify_never_exceeds_max_length(input in ".*") {
            prop_assert!(slugify(&input).len() <= MAX_SLUG_LEN);
        }

        #[test]
        fn slugify_is_never_empty(input in ".*") {
            prop_assert!(!slugify(&input).is_empty());
        }
    }
}
