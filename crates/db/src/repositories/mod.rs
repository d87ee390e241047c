use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use datachat_core::domain::conversation::{ChatMessage, SessionId};
use datachat_core::domain::document::{Document, DocumentFilter};
use datachat_core::CollectionCatalog;

pub mod document;
pub mod memory;
pub mod session;

pub use document::SqlDocumentStore;
pub use memory::{InMemoryDocumentStore, InMemorySessionStore};
pub use session::SqlSessionStore;

/// Field holding the document identifier inside every stored body.
pub const ID_FIELD: &str = "_id";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read and import access to named collections of schemaless documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_collections(&self) -> Result<CollectionCatalog, RepositoryError>;

    /// Documents in insertion order. `filter` is an equality match over (dotted) field paths.
    async fn query_collection(
        &self,
        collection: &str,
        filter: Option<&DocumentFilter>,
        limit: u32,
        skip: u32,
    ) -> Result<Vec<Document>, RepositoryError>;

    async fn get_document_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, RepositoryError>;

    /// Matches documents where any string value contains any whitespace-separated term.
    async fn search_text(
        &self,
        collection: &str,
        text: &str,
        limit: u32,
    ) -> Result<Vec<Document>, RepositoryError>;

    async fn create_collection(&self, collection: &str) -> Result<(), RepositoryError>;

    /// Creates the collection if needed; documents sharing an `_id` are replaced in place.
    async fn insert_documents(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<usize, RepositoryError>;
}

/// Per-session conversation history. Appends for one session are applied in call order.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn append(&self, session: &SessionId, message: ChatMessage)
        -> Result<(), RepositoryError>;
    /// Records a question and its reply as one adjacent pair: both are stored or neither is,
    /// and no other append on the session lands between them.
    async fn append_turn(
        &self,
        session: &SessionId,
        human: ChatMessage,
        ai: ChatMessage,
    ) -> Result<(), RepositoryError>;
    async fn history(&self, session: &SessionId) -> Result<Vec<ChatMessage>, RepositoryError>;
    async fn clear(&self, session: &SessionId) -> Result<(), RepositoryError>;
}

/// Returns the document's `_id` as text, assigning a fresh 24-hex id when it has none.
pub(crate) fn ensure_document_id(document: &mut Document) -> String {
    match document.get(ID_FIELD) {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Null) | None => {
            let id = new_document_id();
            document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            id
        }
        Some(other) => other.to_string(),
    }
}

fn new_document_id() -> String {
    let mut id = sqlx::types::Uuid::new_v4().simple().to_string();
    id.truncate(24);
    id
}

pub(crate) fn filter_segments(key: &str) -> Result<Vec<&str>, RepositoryError> {
    let segments = key.split('.').collect::<Vec<_>>();
    let valid = segments.iter().all(|segment| {
        !segment.is_empty()
            && segment.chars().all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '-' || ch == '$')
    });
    if valid {
        Ok(segments)
    } else {
        Err(RepositoryError::InvalidFilter(format!("unsupported field path `{key}`")))
    }
}

pub(crate) fn search_terms(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}
