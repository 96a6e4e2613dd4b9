//! Headword normalization.
//!
//! `normalize_lemma` produces the comparison key used to join records within
//! and across the two dictionaries: two headwords name the same term iff their
//! keys are equal.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Decompose, lower-case, strip combining marks, collapse whitespace.
pub fn normalize_lemma(raw: &str) -> String {
    // Compatibility forms like "ℌ" only become lower-caseable once decomposed
    let lowered = raw.nfkd().collect::<String>().to_lowercase();
    let stripped: String = lowered.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    collapse_whitespace(&stripped)
}

/// Join the whitespace-separated words of `text` with single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Indexing letter of a headword: the upper-cased base form of its first
/// alphabetic character. Leading digits and punctuation are skipped.
pub fn index_letter(lemma: &str) -> Option<String> {
    let first = lemma.chars().find(|c| c.is_alphabetic())?;
    // Fold diacritics and ligatures so "Ätna" files under A and "ﬁlum" under F
    let base = first.to_string().nfkd().find(|c| !is_combining_mark(*c)).unwrap_or(first);
    // Single character even where upper-casing expands ("ß" -> "SS")
    let upper = base.to_uppercase().next().unwrap_or(base);
    Some(upper.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_keeps_inner_space() {
        assert_eq!(normalize_lemma("Aqua Fortis"), "aqua fortis");
    }

    #[test]
    fn strips_diacritics() {
        assert_eq!(normalize_lemma("Äther"), "ather");
        assert_eq!(normalize_lemma("Alchymía"), "alchymia");
        assert_eq!(normalize_lemma("Cǣsius"), "cæsius");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize_lemma("  Argentum \n\t vivum "), "argentum vivum");
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "Aqua Fortis",
            "Äther",
            "  Sal   ammoniacum ",
            "İsis",
            "ﬁlum",
            "Œlixir",
            "Ꝑ rubrum",
            "ℌermes",
            "𝐀qua",
            "",
        ];
        for s in samples {
            let once = normalize_lemma(s);
            assert_eq!(normalize_lemma(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn compatibility_forms_are_decomposed() {
        assert_eq!(normalize_lemma("ﬁlum"), "filum");
    }

    #[test]
    fn uncased_compatibility_letters_are_lowercased() {
        assert_eq!(normalize_lemma("ℌermes"), "hermes");
        assert_eq!(normalize_lemma("𝐀qua"), "aqua");
    }

    #[test]
    fn letter_of_plain_headword() {
        assert_eq!(index_letter("Aqua Fortis").as_deref(), Some("A"));
        assert_eq!(index_letter("vitriolum").as_deref(), Some("V"));
    }

    #[test]
    fn letter_skips_leading_punctuation_and_digits() {
        assert_eq!(index_letter("(12) Sulphur").as_deref(), Some("S"));
        assert_eq!(index_letter("«Borax»").as_deref(), Some("B"));
    }

    #[test]
    fn letter_folds_diacritics() {
        assert_eq!(index_letter("Ätna").as_deref(), Some("A"));
        assert_eq!(index_letter("éther").as_deref(), Some("E"));
    }

    #[test]
    fn letter_is_one_character_when_uppercase_expands() {
        assert_eq!(index_letter("ßal").as_deref(), Some("S"));
        assert_eq!(index_letter("ﬁlum").as_deref(), Some("F"));
        assert_eq!(index_letter("ℌermes").as_deref(), Some("H"));
    }

    #[test]
    fn letter_absent_without_alphabetic_characters() {
        assert_eq!(index_letter("☿ 42"), None);
        assert_eq!(index_letter(""), None);
    }
}
