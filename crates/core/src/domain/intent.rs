use serde::{Deserialize, Serialize};

use crate::catalog::pluralize_collection;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    ListCollections,
    #[default]
    QueryDocuments,
    GetDocument,
    TextSearch,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListCollections => "list_collections",
            Self::QueryDocuments => "query_documents",
            Self::GetDocument => "get_document",
            Self::TextSearch => "text_search",
        }
    }

    /// Lenient mapping for free-form generator output ("list collections", "get document by id", ...).
    pub fn from_loose(value: &str) -> Self {
        let normalized = value
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|character| if character.is_ascii_alphanumeric() { character } else { '_' })
            .collect::<String>();

        if normalized.contains("list") || normalized.contains("collections") {
            Self::ListCollections
        } else if normalized.contains("get") || normalized.contains("by_id") {
            Self::GetDocument
        } else if normalized.contains("search") || normalized.contains("text") {
            Self::TextSearch
        } else {
            Self::QueryDocuments
        }
    }
}

/// Classification of one user message. Built once and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IntentDecision {
    is_database_question: bool,
    collection: Option<String>,
    query_type: QueryType,
}

impl IntentDecision {
    /// The collection is pluralized here so every downstream consumer sees a normalized name.
    pub fn new(is_database_question: bool, collection: Option<&str>, query_type: QueryType) -> Self {
        let collection = collection.map(pluralize_collection).filter(|name| !name.is_empty());
        Self { is_database_question, collection, query_type }
    }

    pub fn general() -> Self {
        Self::new(false, None, QueryType::QueryDocuments)
    }

    pub fn is_database_question(&self) -> bool {
        self.is_database_question
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryLayer {
    Parsed,
    Recovered,
    Defaulted,
}

/// A value tagged with the cascade layer that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recovery<T> {
    /// The generator's output parsed as JSON after normalization.
    Parsed(T),
    /// JSON parsing failed but individual key/value pairs were salvaged.
    Recovered(T),
    /// Nothing usable came back; the value was synthesized from heuristics.
    Defaulted(T),
}

impl<T> Recovery<T> {
    pub fn layer(&self) -> RecoveryLayer {
        match self {
            Self::Parsed(_) => RecoveryLayer::Parsed,
            Self::Recovered(_) => RecoveryLayer::Recovered,
            Self::Defaulted(_) => RecoveryLayer::Defaulted,
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Parsed(value) | Self::Recovered(value) | Self::Defaulted(value) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Parsed(value) | Self::Recovered(value) | Self::Defaulted(value) => value,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Recovery<U> {
        match self {
            Self::Parsed(value) => Recovery::Parsed(f(value)),
            Self::Recovered(value) => Recovery::Recovered(f(value)),
            Self::Defaulted(value) => Recovery::Defaulted(f(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IntentDecision, QueryType, Recovery, RecoveryLayer};

    #[test]
    fn decision_pluralizes_collection() {
        let decision = IntentDecision::new(true, Some("order"), QueryType::QueryDocuments);
        assert_eq!(decision.collection(), Some("orders"));

        let already_plural = IntentDecision::new(true, Some("orders"), QueryType::QueryDocuments);
        assert_eq!(already_plural.collection(), Some("orders"));
    }

    #[test]
    fn blank_collection_becomes_none() {
        let decision = IntentDecision::new(true, Some(" "), QueryType::ListCollections);
        assert_eq!(decision.collection(), None);
    }

    #[test]
    fn loose_query_types_map_onto_enum() {
        assert_eq!(QueryType::from_loose("list collections"), QueryType::ListCollections);
        assert_eq!(QueryType::from_loose("get document by id"), QueryType::GetDocument);
        assert_eq!(QueryType::from_loose("Text-Search"), QueryType::TextSearch);
        assert_eq!(QueryType::from_loose("query_documents"), QueryType::QueryDocuments);
        assert_eq!(QueryType::from_loose("???"), QueryType::QueryDocuments);
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let decision = IntentDecision::new(true, Some("user"), QueryType::TextSearch);
        let value = serde_json::to_value(&decision).expect("serialize decision");
        assert_eq!(
            value,
            serde_json::json!({
                "is_database_question": true,
                "collection": "users",
                "query_type": "text_search"
            })
        );
    }

    #[test]
    fn recovery_reports_layer() {
        let recovered = Recovery::Recovered(3).map(|value| value * 2);
        assert_eq!(recovered.layer(), RecoveryLayer::Recovered);
        assert_eq!(*recovered.value(), 6);
        assert_eq!(Recovery::Defaulted("x").into_inner(), "x");
    }
}
