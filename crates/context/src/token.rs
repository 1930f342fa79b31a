//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 bytes per token. Close enough for
//! BPE tokenizers on English text to report how much of a context window
//! the memory block takes.

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 bytes. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::{BLOCK_HEADER, empty_block};

    #[test]
    fn empty_text_costs_nothing() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn partial_tokens_round_up() {
        assert_eq!(estimate_tokens("lang"), 1);
        assert_eq!(estimate_tokens("python"), 2);
    }

    #[test]
    fn header_only_block_has_fixed_cost() {
        let block = empty_block();
        assert_eq!(
            estimate_tokens(block.as_str()),
            BLOCK_HEADER.len().div_ceil(4)
        );
    }
}
