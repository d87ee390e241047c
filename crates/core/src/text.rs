//! Small text helpers shared by the keyword-driven detectors.

pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
}

/// Splits on anything that is not alphanumeric (apostrophes and underscores stay inside tokens).
pub fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_alphanumeric() || matches!(character, '\'' | '_') {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(|token| token.trim_matches('\'').to_string()).collect()
}

/// True when `phrase` occurs in `tokens` as a contiguous run of words, each token starting with
/// the matching phrase word ("max" matches "maximum", "most recent" matches "most recently").
pub fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
    let words = phrase.split_whitespace().collect::<Vec<_>>();
    if words.is_empty() || words.len() > tokens.len() {
        return false;
    }

    tokens
        .windows(words.len())
        .any(|window| window.iter().zip(&words).all(|(token, word)| token.starts_with(word)))
}

pub fn contains_any_phrase(tokens: &[String], phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| contains_phrase(tokens, phrase))
}

/// Truncates on a char boundary and marks the cut with an ellipsis.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated = value.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}
