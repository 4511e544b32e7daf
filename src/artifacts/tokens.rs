//! Token estimation for mixed Korean/English text.

/// Estimate the model token count of `text`.
///
/// Hangul syllables cost about 1.2 tokens, ASCII letters and digits about a
/// quarter token, and everything else (spaces, punctuation, other scripts)
/// half a token.
pub fn estimate_tokens(text: &str) -> usize {
    let mut korean = 0usize;
    let mut ascii = 0usize;
    let mut other = 0usize;
    for c in text.chars() {
        if ('\u{ac00}'..='\u{d7a3}').contains(&c) {
            korean += 1;
        } else if c.is_ascii_alphanumeric() {
            ascii += 1;
        } else {
            other += 1;
        }
    }
    (korean as f64 * 1.2 + ascii as f64 * 0.25 + other as f64 * 0.5) as usize
}

/// Estimate the token cost of a value's compact JSON encoding.
pub fn estimate_json_tokens<T: serde::Serialize>(value: &T) -> usize {
    serde_json::to_string(value)
        .map(|s| estimate_tokens(&s))
        .unwrap_or(usize::MAX)
}

/// Truncate to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
