use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use datachat_core::domain::document::DocumentFilter;
use datachat_db::{DocumentStore, RepositoryError};

pub const LIST_COLLECTIONS: &str = "list_collections";
pub const QUERY_COLLECTION: &str = "query_collection";
pub const GET_DOCUMENT: &str = "get_document";
pub const SEARCH_TEXT: &str = "search_text";

const DEFAULT_TOOL_LIMIT: u32 = 10;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid input for `{tool}`: {message}")]
    InvalidInput { tool: &'static str, message: String },
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn execute(&self, input: Value) -> Result<Value, ToolError>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// The four read tools over one document store.
    pub fn for_store(store: Arc<dyn DocumentStore>) -> Self {
        let mut registry = Self::default();
        registry.register(ListCollectionsTool { store: Arc::clone(&store) });
        registry.register(QueryCollectionTool { store: Arc::clone(&store) });
        registry.register(GetDocumentTool { store: Arc::clone(&store) });
        registry.register(SearchTextTool { store });
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub async fn execute(&self, name: &str, input: Value) -> Result<Value, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(input).await
    }

    pub fn describe(&self) -> Vec<(&'static str, &'static str)> {
        let mut descriptions =
            self.tools.values().map(|tool| (tool.name(), tool.description())).collect::<Vec<_>>();
        descriptions.sort();
        descriptions
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn parse_input<T>(tool: &'static str, input: Value) -> Result<T, ToolError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(input)
        .map_err(|error| ToolError::InvalidInput { tool, message: error.to_string() })
}

struct ListCollectionsTool {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl Tool for ListCollectionsTool {
    fn name(&self) -> &'static str {
        LIST_COLLECTIONS
    }

    fn description(&self) -> &'static str {
        "Lists every collection in the database."
    }

    async fn execute(&self, _input: Value) -> Result<Value, ToolError> {
        let catalog = self.store.get_collections().await?;
        Ok(json!({ "collections": catalog.to_vec() }))
    }
}

#[derive(Deserialize)]
struct QueryCollectionInput {
    collection: String,
    #[serde(default)]
    filter: Option<DocumentFilter>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    skip: Option<u32>,
}

struct QueryCollectionTool {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl Tool for QueryCollectionTool {
    fn name(&self) -> &'static str {
        QUERY_COLLECTION
    }

    fn description(&self) -> &'static str {
        "Queries a collection with an optional equality filter. Args: collection, filter, limit (default 10), skip (default 0)."
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let input: QueryCollectionInput = parse_input(QUERY_COLLECTION, input)?;
        let documents = self
            .store
            .query_collection(
                &input.collection,
                input.filter.as_ref(),
                input.limit.unwrap_or(DEFAULT_TOOL_LIMIT),
                input.skip.unwrap_or(0),
            )
            .await?;
        Ok(json!({ "collection": input.collection, "documents": documents }))
    }
}

#[derive(Deserialize)]
struct GetDocumentInput {
    collection: String,
    id: String,
}

struct GetDocumentTool {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl Tool for GetDocumentTool {
    fn name(&self) -> &'static str {
        GET_DOCUMENT
    }

    fn description(&self) -> &'static str {
        "Fetches one document by its `_id`. Args: collection, id."
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let input: GetDocumentInput = parse_input(GET_DOCUMENT, input)?;
        let document = self.store.get_document_by_id(&input.collection, &input.id).await?;
        Ok(json!({ "collection": input.collection, "document": document }))
    }
}

#[derive(Deserialize)]
struct SearchTextInput {
    collection: String,
    text: String,
    #[serde(default)]
    limit: Option<u32>,
}

struct SearchTextTool {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl Tool for SearchTextTool {
    fn name(&self) -> &'static str {
        SEARCH_TEXT
    }

    fn description(&self) -> &'static str {
        "Finds documents whose text values contain any of the given words. Args: collection, text, limit (default 10)."
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let input: SearchTextInput = parse_input(SEARCH_TEXT, input)?;
        let documents = self
            .store
            .search_text(&input.collection, &input.text, input.limit.unwrap_or(DEFAULT_TOOL_LIMIT))
            .await?;
        Ok(json!({ "collection": input.collection, "documents": documents }))
    }
}
