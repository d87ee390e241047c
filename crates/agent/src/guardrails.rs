//! Direct-answer policy for generated replies: no questions back to the user, no offers of
//! further help.

use regex::Regex;

/// Applied in this order; each match extends to the nearest terminal punctuation.
const SUGGESTION_PHRASES: &[&str] = &[
    r"would you like",
    r"do you want",
    r"if you(?:'d| would) like",
    r"let me know if",
    r"i can help you",
    r"feel free to",
    r"shall i",
    r"should i",
    r"you (?:might|may) want to",
    r"i'd be happy to",
    r"is there anything else",
];

pub struct ResponseSanitizer {
    suggestion_patterns: Vec<Regex>,
}

impl Default for ResponseSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSanitizer {
    pub fn new() -> Self {
        let suggestion_patterns = SUGGESTION_PHRASES
            .iter()
            .filter_map(|phrase| Regex::new(&format!(r"(?i)\b{phrase}\b[^.!?]*[.!?]?")).ok())
            .collect();
        Self { suggestion_patterns }
    }

    /// Output never contains a question and, unless empty, ends in terminal punctuation.
    pub fn sanitize(&self, text: &str) -> String {
        let direct = split_sentences(text)
            .into_iter()
            .filter_map(strip_questions)
            .collect::<Vec<_>>()
            .join(" ");

        let without_suggestions =
            self.suggestion_patterns.iter().fold(direct, |current, pattern| {
                pattern.replace_all(&current, "").into_owned()
            });

        let mut collapsed = without_suggestions.split_whitespace().collect::<Vec<_>>().join(" ");
        let trimmed_len = collapsed.trim_end_matches([',', ';', ':', ' ']).len();
        collapsed.truncate(trimmed_len);

        if !collapsed.is_empty() && !collapsed.ends_with(['.', '!', '?']) {
            collapsed.push('.');
        }
        collapsed
    }
}

/// Splits after `.` or `!` followed by whitespace. `?` is not a boundary.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut previous: Option<char> = None;

    for (index, ch) in text.char_indices() {
        if ch.is_whitespace() && matches!(previous, Some('.') | Some('!')) {
            sentences.push(&text[start..index]);
            start = index;
        }
        previous = Some(ch);
    }
    sentences.push(&text[start..]);

    sentences.into_iter().map(str::trim).filter(|sentence| !sentence.is_empty()).collect()
}

/// Drops every clause that ends in `?`; `None` when nothing declarative is left.
fn strip_questions(sentence: &str) -> Option<String> {
    let kept = sentence
        .split_inclusive('?')
        .filter(|clause| !clause.trim_end().ends_with('?'))
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    (!kept.is_empty()).then_some(kept)
}

#[cfg(test)]
mod tests {
    use super::ResponseSanitizer;

    #[test]
    fn question_and_suggestion_are_removed() {
        let sanitizer = ResponseSanitizer::new();
        assert_eq!(
            sanitizer.sanitize("Here is the result. Would you like more details? Thanks"),
            "Here is the result. Thanks."
        );
    }

    #[test]
    fn suggestion_sentences_are_dropped_in_order() {
        let sanitizer = ResponseSanitizer::new();
        let answer = "There are 42 orders. Let me know if you need a breakdown. \
                      Feel free to ask about users! The largest order is #17.";
        assert_eq!(sanitizer.sanitize(answer), "There are 42 orders. The largest order is #17.");
    }

    #[test]
    fn mid_sentence_offer_is_cut_to_punctuation() {
        let sanitizer = ResponseSanitizer::new();
        assert_eq!(
            sanitizer.sanitize("The average price is 12.5, if you'd like a chart I can draw one."),
            "The average price is 12.5."
        );
    }

    #[test]
    fn whitespace_is_collapsed_and_period_appended() {
        let sanitizer = ResponseSanitizer::new();
        assert_eq!(sanitizer.sanitize("  Three   users   signed up  "), "Three users signed up.");
        assert_eq!(sanitizer.sanitize("Done!"), "Done!");
    }

    #[test]
    fn all_questions_yield_empty_output() {
        let sanitizer = ResponseSanitizer::new();
        assert_eq!(sanitizer.sanitize("What else? Anything?"), "");
        assert_eq!(sanitizer.sanitize(""), "");
    }

    #[test]
    fn output_never_contains_question_marks() {
        let sanitizer = ResponseSanitizer::new();
        let inputs = [
            "Result: 5. Is there anything else I can do?",
            "Why? Because the data says so.",
            "Shall I continue. The total is 9!",
        ];
        for input in inputs {
            assert!(!sanitizer.sanitize(input).contains('?'), "input: {input}");
        }
    }
}
