//! Token estimation for session budgets and prompt history.
//!
//! Uses the ~chars/4 heuristic. Characters, not bytes, are counted: Vietnamese
//! diacritics take two or three UTF-8 bytes each and would inflate a byte count.

/// Divisor for estimating tokens from character count.
pub const CHARS_PER_TOKEN_ESTIMATE: usize = 4;

/// Estimate the token count of a text, rounding up.
///
/// ```
/// use laodong_core::tokens::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 0);
/// assert_eq!(estimate_tokens("abcd"), 1);
/// assert_eq!(estimate_tokens("abcde"), 2);
/// ```
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN_ESTIMATE)
}

/// Clip a text to at most `max_chars` characters, appending `...` when cut.
pub fn clip_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
