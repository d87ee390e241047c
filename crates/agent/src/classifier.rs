//! Intent classification with layered recovery of the generator's structured answer.
//!
//! The cascade never fails: a parsed object wins, then individually recovered `"key": value`
//! pairs, then a keyword heuristic over the raw message.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{info, warn};

use datachat_core::domain::intent::{IntentDecision, QueryType, Recovery};
use datachat_core::errors::ClassificationRecoveryFailure;

use crate::llm::LlmClient;
use crate::prompts::PromptLibrary;

const DATABASE_KEYWORDS: &[&str] =
    &["database", "collection", "data", "query", "find", "search", "list", "mongodb"];

const COLLECTION_STOPWORDS: &[&str] = &[
    "from", "where", "what", "when", "how", "show", "get", "find", "query", "list", "which",
    "many", "much", "there", "these", "those", "with", "about", "please", "give", "tell", "does",
    "have", "into", "that", "this", "some", "every", "each", "data", "database",
];

const EXACT_DATABASE_KEY: &str = "is_database_question";
const EXACT_COLLECTION_KEY: &str = "collection";
const EXACT_QUERY_TYPE_KEY: &str = "query_type";

pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLibrary>) -> Self {
        Self { llm, prompts }
    }

    pub async fn classify(&self, message: &str, correlation_id: &str) -> Recovery<IntentDecision> {
        let completion = match self.prompts.classification(message) {
            Ok(prompt) => self.llm.complete(&prompt).await.map_err(|error| error.to_string()),
            Err(error) => Err(error.to_string()),
        };

        let decision = match completion {
            Ok(raw) => recover_decision(&raw, message),
            Err(error) => {
                let failure = ClassificationRecoveryFailure(error);
                warn!(
                    event_name = "pipeline.classification_recovery_failure",
                    correlation_id,
                    error = %failure,
                    "classifier generation failed, using keyword heuristic"
                );
                Recovery::Defaulted(heuristic_decision(message))
            }
        };

        info!(
            event_name = "pipeline.classified",
            correlation_id,
            layer = ?decision.layer(),
            is_database_question = decision.value().is_database_question(),
            collection = decision.value().collection().unwrap_or(""),
            query_type = decision.value().query_type().as_str(),
            "message classified"
        );
        decision
    }
}

/// Runs the parse → recover → default cascade over a raw generator response.
pub fn recover_decision(raw: &str, message: &str) -> Recovery<IntentDecision> {
    let Some(span) = extract_json_span(raw) else {
        return Recovery::Defaulted(heuristic_decision(message));
    };

    let normalized = normalize_json_text(span);
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(&normalized) {
        return Recovery::Parsed(decision_from_object(&object));
    }

    match recover_pairs(&normalized) {
        Some(object) => Recovery::Recovered(decision_from_object(&object)),
        None => Recovery::Defaulted(heuristic_decision(message)),
    }
}

/// First balanced `{...}` span, skipping braces inside quoted strings. An unbalanced span
/// falls back to the last closing brace.
pub fn extract_json_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' => quote = Some(ch),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Repairs the usual generator slips: single-quoted strings, Python literals, comments and
/// trailing commas. Text inside double-quoted strings is left untouched.
pub fn normalize_json_text(span: &str) -> String {
    let chars = span.chars().collect::<Vec<_>>();
    let mut output = String::with_capacity(span.len());
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        match ch {
            '"' | '\'' => {
                index = copy_string(&chars, index, &mut output);
                continue;
            }
            '/' if chars.get(index + 1) == Some(&'/') => {
                while index < chars.len() && chars[index] != '\n' {
                    index += 1;
                }
                continue;
            }
            '/' if chars.get(index + 1) == Some(&'*') => {
                index += 2;
                while index < chars.len()
                    && !(chars[index] == '*' && chars.get(index + 1) == Some(&'/'))
                {
                    index += 1;
                }
                index += 2;
                continue;
            }
            ',' => {
                let next = chars[index + 1..].iter().find(|next| !next.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    output.push(ch);
                }
            }
            _ if ch.is_ascii_alphabetic() => {
                let start = index;
                while index < chars.len() && (chars[index].is_ascii_alphanumeric() || chars[index] == '_')
                {
                    index += 1;
                }
                let word = chars[start..index].iter().collect::<String>();
                output.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
                continue;
            }
            _ => output.push(ch),
        }
        index += 1;
    }

    output
}

/// Copies one quoted string starting at `start`, re-quoting single-quoted strings with double
/// quotes. Returns the index after the closing quote.
fn copy_string(chars: &[char], start: usize, output: &mut String) -> usize {
    let open = chars[start];
    output.push('"');
    let mut index = start + 1;

    while index < chars.len() {
        let ch = chars[index];
        if ch == '\\' {
            output.push(ch);
            if let Some(next) = chars.get(index + 1) {
                output.push(*next);
            }
            index += 2;
            continue;
        }
        if ch == open {
            output.push('"');
            return index + 1;
        }
        if ch == '"' && open == '\'' {
            output.push_str("\\\"");
        } else {
            output.push(ch);
        }
        index += 1;
    }

    index
}

fn pair_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r#""([^"\\]+)"\s*:\s*("(?:[^"\\]|\\.)*"|true|false|null|-?\d+(?:\.\d+)?)"#,
            )
            .ok()
        })
        .as_ref()
}

/// Pulls `"key": scalar` pairs out of text that does not parse as a whole.
pub fn recover_pairs(text: &str) -> Option<Map<String, Value>> {
    let pattern = pair_pattern()?;
    let mut object = Map::new();

    for captures in pattern.captures_iter(text) {
        let (Some(key), Some(raw_value)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        let value = serde_json::from_str::<Value>(raw_value.as_str())
            .unwrap_or_else(|_| Value::String(raw_value.as_str().trim_matches('"').to_string()));
        object.entry(key.as_str().to_string()).or_insert(value);
    }

    (!object.is_empty()).then_some(object)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DecisionField {
    Database,
    Collection,
    QueryType,
}

fn field_for_variant_key(key: &str) -> Option<DecisionField> {
    let key = key.to_ascii_lowercase();
    if key.contains("database") || key.contains("db") || key.starts_with("is_") {
        Some(DecisionField::Database)
    } else if key.contains("collection") || key.contains("coll") || key.contains("table") {
        Some(DecisionField::Collection)
    } else if key.contains("query") || key.contains("type") {
        Some(DecisionField::QueryType)
    } else {
        None
    }
}

/// Maps exact and variant keys onto the decision. Exact keys are never overwritten.
pub fn decision_from_object(object: &Map<String, Value>) -> IntentDecision {
    let mut database = object.get(EXACT_DATABASE_KEY).cloned();
    let mut collection = object.get(EXACT_COLLECTION_KEY).cloned();
    let mut query_type = object.get(EXACT_QUERY_TYPE_KEY).cloned();

    for (key, value) in object {
        if [EXACT_DATABASE_KEY, EXACT_COLLECTION_KEY, EXACT_QUERY_TYPE_KEY].contains(&key.as_str())
        {
            continue;
        }
        let slot = match field_for_variant_key(key) {
            Some(DecisionField::Database) => &mut database,
            Some(DecisionField::Collection) => &mut collection,
            Some(DecisionField::QueryType) => &mut query_type,
            None => continue,
        };
        if slot.is_none() {
            *slot = Some(value.clone());
        }
    }

    let collection = collection.as_ref().and_then(coerce_collection);
    IntentDecision::new(
        database.as_ref().map(coerce_bool).unwrap_or(false),
        collection.as_deref(),
        query_type.as_ref().and_then(Value::as_str).map(QueryType::from_loose).unwrap_or_default(),
    )
}

fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|number| number != 0.0).unwrap_or(false),
        Value::String(text) => {
            matches!(text.trim().to_ascii_lowercase().as_str(), "yes" | "y" | "true" | "1")
        }
        _ => false,
    }
}

fn coerce_collection(value: &Value) -> Option<String> {
    let text = value.as_str()?.trim();
    match text.to_ascii_lowercase().as_str() {
        "" | "null" | "none" | "collection_name_or_null" => None,
        _ => Some(text.to_string()),
    }
}

/// Keyword heuristic used when nothing structured can be recovered.
pub fn heuristic_decision(message: &str) -> IntentDecision {
    let lowered = message.to_lowercase();
    let is_database_question = DATABASE_KEYWORDS.iter().any(|keyword| lowered.contains(keyword));

    let candidate = lowered
        .split_whitespace()
        .skip(1)
        .map(|word| word.trim_matches(|ch: char| !ch.is_alphanumeric() && ch != '_'))
        .find(|word| word.chars().count() > 3 && !COLLECTION_STOPWORDS.contains(word));

    let query_type = if lowered.contains("list") {
        QueryType::ListCollections
    } else {
        QueryType::QueryDocuments
    };

    IntentDecision::new(is_database_question, candidate, query_type)
}
