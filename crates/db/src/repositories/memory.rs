use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tokio::sync::RwLock;

use datachat_core::domain::conversation::{ChatMessage, SessionId};
use datachat_core::domain::document::{Document, DocumentFilter};
use datachat_core::CollectionCatalog;

use super::{
    ensure_document_id, filter_segments, search_terms, DocumentStore, RepositoryError,
    SessionStore, ID_FIELD,
};

#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<BTreeMap<String, Vec<Document>>>,
}

impl InMemoryDocumentStore {
    pub fn with_collections<I>(collections: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<Document>)>,
    {
        let collections = collections
            .into_iter()
            .map(|(name, documents)| {
                let documents = documents
                    .into_iter()
                    .map(|mut document| {
                        ensure_document_id(&mut document);
                        document
                    })
                    .collect();
                (name, documents)
            })
            .collect();
        Self { collections: RwLock::new(collections) }
    }
}

fn lookup<'a>(document: &'a Document, segments: &[&str]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    rest.iter().try_fold(document.get(*first)?, |value, segment| value.get(*segment))
}

fn values_equal(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None, Value::Null) => true,
        (Some(Value::Number(left)), Value::Number(right)) => left.as_f64() == right.as_f64(),
        (Some(actual), expected) => actual == expected,
        (None, _) => false,
    }
}

fn matches_filter(document: &Document, filter: &[(Vec<&str>, &Value)]) -> bool {
    filter.iter().all(|(segments, expected)| values_equal(lookup(document, segments), expected))
}

fn contains_term(value: &Value, terms: &[String]) -> bool {
    match value {
        Value::String(text) => {
            let text = text.to_lowercase();
            terms.iter().any(|term| text.contains(term.as_str()))
        }
        Value::Array(items) => items.iter().any(|item| contains_term(item, terms)),
        Value::Object(map) => map.values().any(|item| contains_term(item, terms)),
        _ => false,
    }
}

fn id_matches(document: &Document, id: &str) -> bool {
    match document.get(ID_FIELD) {
        Some(Value::String(value)) => value == id,
        Some(other) => other.to_string() == id,
        None => false,
    }
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_collections(&self) -> Result<CollectionCatalog, RepositoryError> {
        let collections = self.collections.read().await;
        Ok(CollectionCatalog::new(collections.keys().cloned()))
    }

    async fn query_collection(
        &self,
        collection: &str,
        filter: Option<&DocumentFilter>,
        limit: u32,
        skip: u32,
    ) -> Result<Vec<Document>, RepositoryError> {
        let filter = filter
            .map(|filter| {
                filter
                    .iter()
                    .map(|(key, value)| Ok((filter_segments(key)?, value)))
                    .collect::<Result<Vec<_>, RepositoryError>>()
            })
            .transpose()?
            .unwrap_or_default();

        let collections = self.collections.read().await;
        let documents = collections.get(collection).map(Vec::as_slice).unwrap_or_default();
        Ok(documents
            .iter()
            .filter(|document| matches_filter(document, &filter))
            .skip(skip as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get_document_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, RepositoryError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.iter().find(|document| id_matches(document, id)))
            .cloned())
    }

    async fn search_text(
        &self,
        collection: &str,
        text: &str,
        limit: u32,
    ) -> Result<Vec<Document>, RepositoryError> {
        let terms = search_terms(text);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let collections = self.collections.read().await;
        let documents = collections.get(collection).map(Vec::as_slice).unwrap_or_default();
        Ok(documents
            .iter()
            .filter(|document| document.values().any(|value| contains_term(value, &terms)))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn create_collection(&self, collection: &str) -> Result<(), RepositoryError> {
        let mut collections = self.collections.write().await;
        collections.entry(collection.to_string()).or_default();
        Ok(())
    }

    async fn insert_documents(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<usize, RepositoryError> {
        let mut collections = self.collections.write().await;
        let stored = collections.entry(collection.to_string()).or_default();

        let mut written = 0;
        for mut document in documents {
            let id = ensure_document_id(&mut document);
            match stored.iter_mut().find(|existing| id_matches(existing, &id)) {
                Some(existing) => *existing = document,
                None => stored.push(document),
            }
            written += 1;
        }
        Ok(written)
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn append(
        &self,
        session: &SessionId,
        message: ChatMessage,
    ) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.entry(session.as_str().to_string()).or_default().push(message);
        Ok(())
    }

    async fn append_turn(
        &self,
        session: &SessionId,
        human: ChatMessage,
        ai: ChatMessage,
    ) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.entry(session.as_str().to_string()).or_default().extend([human, ai]);
        Ok(())
    }

    async fn history(&self, session: &SessionId) -> Result<Vec<ChatMessage>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session.as_str()).cloned().unwrap_or_default())
    }

    async fn clear(&self, session: &SessionId) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use datachat_core::domain::conversation::{ChatMessage, SessionId};
    use datachat_core::domain::document::{Document, DocumentFilter};

    use crate::repositories::{
        DocumentStore, InMemoryDocumentStore, InMemorySessionStore, SessionStore,
    };

    fn document(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    fn store() -> InMemoryDocumentStore {
        InMemoryDocumentStore::with_collections([
            (
                "users".to_string(),
                vec![
                    document(json!({"_id": "u1", "name": "Ada", "age": 36, "address": {"city": "London"}})),
                    document(json!({"_id": "u2", "name": "Grace", "age": 45.0, "tags": ["navy"]})),
                ],
            ),
            ("logs".to_string(), Vec::new()),
        ])
    }

    #[tokio::test]
    async fn in_memory_catalog_lists_every_collection() {
        let catalog = store().get_collections().await.expect("catalog");
        assert_eq!(catalog.to_vec(), vec!["logs".to_string(), "users".to_string()]);
    }

    #[tokio::test]
    async fn in_memory_filter_compares_numbers_by_value() {
        let store = store();
        let mut filter = DocumentFilter::new();
        filter.insert("age".to_string(), json!(45));

        let matched = store.query_collection("users", Some(&filter), 10, 0).await.expect("query");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].get("name"), Some(&json!("Grace")));

        let mut nested = DocumentFilter::new();
        nested.insert("address.city".to_string(), json!("London"));
        let matched = store.query_collection("users", Some(&nested), 10, 0).await.expect("query");
        assert_eq!(matched[0].get("_id"), Some(&json!("u1")));
    }

    #[tokio::test]
    async fn in_memory_search_walks_nested_values() {
        let store = store();
        let matched = store.search_text("users", "NAVY london", 10).await.expect("search");
        assert_eq!(matched.len(), 2);

        let missing = store.search_text("missing", "ada", 10).await.expect("search");
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn in_memory_insert_assigns_ids_and_replaces_duplicates() {
        let store = InMemoryDocumentStore::default();
        let written = store
            .insert_documents(
                "orders",
                vec![document(json!({"item": "pen"})), document(json!({"_id": "o2", "item": "ink"}))],
            )
            .await
            .expect("insert");
        assert_eq!(written, 2);

        store
            .insert_documents("orders", vec![document(json!({"_id": "o2", "item": "paper"}))])
            .await
            .expect("replace");

        let all = store.query_collection("orders", None, 10, 0).await.expect("query");
        assert_eq!(all.len(), 2);
        assert!(all[0].get("_id").and_then(Value::as_str).is_some());
        let replaced = store.get_document_by_id("orders", "o2").await.expect("get");
        assert_eq!(replaced.and_then(|doc| doc.get("item").cloned()), Some(json!("paper")));
    }

    #[tokio::test]
    async fn concurrent_appends_are_all_kept() {
        let store = Arc::new(InMemorySessionStore::default());
        let session = SessionId::default();

        let handles = (0..16)
            .map(|index| {
                let store = Arc::clone(&store);
                let session = session.clone();
                tokio::spawn(async move {
                    store.append(&session, ChatMessage::human(format!("message {index}"))).await
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.await.expect("join").expect("append");
        }

        assert_eq!(store.history(&session).await.expect("history").len(), 16);
        store.clear(&session).await.expect("clear");
        assert!(store.history(&session).await.expect("history").is_empty());
    }

    #[tokio::test]
    async fn concurrent_turns_never_interleave() {
        let store = Arc::new(InMemorySessionStore::default());
        let session = SessionId::default();

        let handles = (0..8)
            .map(|index| {
                let store = Arc::clone(&store);
                let session = session.clone();
                tokio::spawn(async move {
                    store
                        .append_turn(
                            &session,
                            ChatMessage::human(format!("question {index}")),
                            ChatMessage::ai(format!("answer {index}")),
                        )
                        .await
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.await.expect("join").expect("append turn");
        }

        let history = store.history(&session).await.expect("history");
        assert_eq!(history.len(), 16);
        for pair in history.chunks(2) {
            let question = pair[0].content.trim_start_matches("question ");
            let answer = pair[1].content.trim_start_matches("answer ");
            assert_eq!(question, answer);
        }
    }
}
