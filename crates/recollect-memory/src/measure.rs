//! Character and token measurement for budget checks.
//!
//! Token counts come from a fixed local scheme: text is split into word,
//! number, punctuation, and whitespace pieces, and each piece costs one token
//! per started run of four characters. The count is deterministic and close
//! enough to BPE tokenizers for budgeting; it is not meant to match any one
//! vendor exactly.

use regex::Regex;
use std::sync::LazyLock;

/// Characters covered by a single token inside one piece.
const CHARS_PER_TOKEN: usize = 4;

static PIECES: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"'(?:s|t|re|ve|m|ll|d)| ?\p{L}+| ?\p{N}{1,3}| ?[^\s\p{L}\p{N}]+|\s+").ok()
});

/// Text measurement used by history budgets and search overflow checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextMeasure;

impl TextMeasure {
    /// Number of Unicode scalar values in `text`.
    pub fn characters(text: &str) -> usize {
        text.chars().count()
    }

    /// Number of tokens in `text` under the local scheme.
    pub fn tokens(text: &str) -> usize {
        let Some(pieces) = PIECES.as_ref() else {
            return Self::characters(text).div_ceil(CHARS_PER_TOKEN);
        };
        pieces
            .find_iter(text)
            .map(|piece| Self::characters(piece.as_str()).div_ceil(CHARS_PER_TOKEN))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::TextMeasure;
    use pretty_assertions::assert_eq;

    #[test]
    fn characters_count_scalars_not_bytes() {
        assert_eq!(TextMeasure::characters(""), 0);
        assert_eq!(TextMeasure::characters("héllo"), 5);
        assert_eq!(TextMeasure::characters("日本"), 2);
    }

    #[test]
    fn empty_text_has_no_tokens() {
        assert_eq!(TextMeasure::tokens(""), 0);
    }

    #[test]
    fn short_words_cost_one_token_each() {
        assert_eq!(TextMeasure::tokens("hi"), 1);
        assert_eq!(TextMeasure::tokens("the cat sat"), 3);
        assert_eq!(TextMeasure::tokens("it's"), 2);
    }

    #[test]
    fn long_pieces_cost_more() {
        assert_eq!(TextMeasure::tokens("internationalization"), 5);
        assert_eq!(TextMeasure::tokens("12345"), 2);
    }

    #[test]
    fn counts_are_deterministic_and_monotonic_in_repetition() {
        let once = TextMeasure::tokens("Hello, world! ");
        let twice = TextMeasure::tokens("Hello, world! Hello, world! ");
        assert_eq!(once, TextMeasure::tokens("Hello, world! "));
        assert!(twice >= once * 2 - 1);
    }
}
