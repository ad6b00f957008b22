//! Term tokenization: lowercase, diacritic-fold, split on non-alphanumeric
//! boundaries (§4.5).

use unicode_normalization::UnicodeNormalization;

/// Splits `term` into lowercase, diacritic-folded tokens.
///
/// Folding goes through NFKD (compatibility decomposition splits an accented
/// letter into its base letter plus a combining mark) and then drops the
/// combining marks, so `"Naïve"` and `"naive"` tokenize identically.
pub fn tokenize(term: &str) -> Vec<String> {
    let folded: String = term
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32,
        0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_splits_on_punctuation() {
        assert_eq!(
            tokenize("Clinical finding (finding)"),
            vec!["clinical", "finding", "finding"]
        );
    }

    #[test]
    fn test_tokenize_folds_diacritics() {
        assert_eq!(tokenize("Naïve approach"), vec!["naive", "approach"]);
    }

    #[test]
    fn test_tokenize_empty_string_yields_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_tokenize_preserves_alphanumeric_runs() {
        assert_eq!(tokenize("COVID-19 disease"), vec!["covid", "19", "disease"]);
    }
}
