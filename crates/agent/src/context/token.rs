//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token over the
//! whitespace-normalized text, plus a small surcharge for punctuation
//! (BPE tokenizers tend to spend extra tokens on it). Accurate within
//! ~10% on English chat text, which is all the budget math needs.

/// Estimate the token count for a string.
///
/// Normalized length counts whitespace runs as a single character;
/// the surcharge adds one token per four punctuation marks.
pub fn estimate_tokens(text: &str) -> usize {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }

    let mut length = 0usize;
    let mut punctuation = 0usize;
    let mut in_whitespace = false;

    for ch in trimmed.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                length += 1;
                in_whitespace = true;
            }
        } else {
            in_whitespace = false;
            length += 1;
            if matches!(ch, '.' | ',' | '!' | '?' | ';' | ':') {
                punctuation += 1;
            }
        }
    }

    length.div_ceil(4) + punctuation / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("   \n\t "), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        let text = "a".repeat(100);
        assert_eq!(estimate_tokens(&text), 25);
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(
            estimate_tokens("hello   world"),
            estimate_tokens("hello world")
        );
        assert_eq!(
            estimate_tokens("hello\n\n  world"),
            estimate_tokens("hello world")
        );
    }

    #[test]
    fn punctuation_surcharge() {
        // 16 plain chars = 4 tokens
        let plain = "aaaaaaaaaaaaaaaa";
        assert_eq!(estimate_tokens(plain), 4);
        // Same length but 8 punctuation marks adds 2 tokens
        let punchy = "aaaaaaaa.,!?;:.,";
        assert_eq!(estimate_tokens(punchy), 6);
    }

    #[test]
    fn surrounding_whitespace_ignored() {
        assert_eq!(estimate_tokens("  test  "), estimate_tokens("test"));
    }
}
