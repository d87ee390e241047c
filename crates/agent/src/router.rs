use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use datachat_core::analysis::AnalysisType;
use datachat_core::catalog::{resolve_collection, CollectionCatalog};
use datachat_core::domain::document::{Document, QueryResult, RouteOutcome};
use datachat_core::domain::intent::{IntentDecision, QueryType};
use datachat_core::errors::PipelineError;
use datachat_core::sampling::adapt_documents;
use datachat_core::schema::infer_schema;
use datachat_core::text::{normalize_text, tokenize};

use crate::tools::{ToolRegistry, GET_DOCUMENT, LIST_COLLECTIONS, QUERY_COLLECTION, SEARCH_TEXT};

const DOCUMENT_ID_LEN: usize = 24;

const SEARCH_STOPWORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "by", "called", "collection", "contain",
    "containing", "contains", "documents", "find", "for", "from", "get", "give", "have", "in",
    "is", "list", "look", "me", "mention", "mentioning", "mentions", "named", "of", "on", "or",
    "please", "records", "search", "show", "text", "that", "the", "there", "to", "up", "where",
    "which", "with", "word", "words",
];

/// Decides what to fetch for a classified message and packages it for analysis.
pub struct QueryRouter {
    tools: Arc<ToolRegistry>,
    fetch_limit: u32,
    query_timeout: Duration,
}

impl QueryRouter {
    pub fn new(tools: Arc<ToolRegistry>, fetch_limit: u32, query_timeout: Duration) -> Self {
        Self { tools, fetch_limit, query_timeout }
    }

    pub async fn route(
        &self,
        decision: &IntentDecision,
        message: &str,
        analysis_type: AnalysisType,
        correlation_id: &str,
    ) -> Result<RouteOutcome, PipelineError> {
        let catalog = self.fetch_catalog().await?;

        if decision.query_type() == QueryType::ListCollections || decision.collection().is_none() {
            return Ok(RouteOutcome::Collections(catalog));
        }

        let collection = match resolve_collection(decision.collection(), &catalog) {
            Ok(collection) => collection,
            Err(not_found) => return Ok(RouteOutcome::NotFound(not_found)),
        };

        let documents = match decision.query_type() {
            QueryType::GetDocument => match extract_document_id(message) {
                Some(id) => self.fetch_by_id(&collection, &id).await?,
                None => self.fetch_documents(&collection).await?,
            },
            QueryType::TextSearch => match extract_search_terms(message, &collection) {
                Some(text) => self.search(&collection, &text).await?,
                None => self.fetch_documents(&collection).await?,
            },
            QueryType::QueryDocuments | QueryType::ListCollections => {
                self.fetch_documents(&collection).await?
            }
        };

        debug!(
            event_name = "pipeline.routed",
            correlation_id,
            collection = %collection,
            query_type = decision.query_type().as_str(),
            fetched = documents.len(),
            "documents fetched"
        );

        // Schema describes everything fetched, not only the sampled window.
        let schema = infer_schema(&documents).ok();
        let batch = adapt_documents(documents, message, analysis_type);
        Ok(RouteOutcome::Data(QueryResult::from_batch(collection, batch, schema)))
    }

    async fn fetch_catalog(&self) -> Result<CollectionCatalog, PipelineError> {
        let output = self.call(LIST_COLLECTIONS, json!({})).await?;
        serde_json::from_value::<CollectionCatalog>(output["collections"].clone())
            .map_err(|error| PipelineError::DatabaseUnavailable(error.to_string()))
    }

    async fn fetch_documents(&self, collection: &str) -> Result<Vec<Document>, PipelineError> {
        let output = self
            .call(
                QUERY_COLLECTION,
                json!({"collection": collection, "limit": self.fetch_limit, "skip": 0}),
            )
            .await?;
        documents_from(output)
    }

    async fn fetch_by_id(&self, collection: &str, id: &str) -> Result<Vec<Document>, PipelineError> {
        let output = self.call(GET_DOCUMENT, json!({"collection": collection, "id": id})).await?;
        match output.get("document") {
            Some(Value::Object(document)) => Ok(vec![document.clone()]),
            _ => Ok(Vec::new()),
        }
    }

    async fn search(&self, collection: &str, text: &str) -> Result<Vec<Document>, PipelineError> {
        let output = self
            .call(
                SEARCH_TEXT,
                json!({"collection": collection, "text": text, "limit": self.fetch_limit}),
            )
            .await?;
        documents_from(output)
    }

    /// Every store access is bounded; a timeout or store error discards any partial result.
    async fn call(&self, tool: &str, input: Value) -> Result<Value, PipelineError> {
        match tokio::time::timeout(self.query_timeout, self.tools.execute(tool, input)).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(error)) => {
                warn!(event_name = "pipeline.tool_failed", tool, error = %error, "database tool failed");
                Err(PipelineError::DatabaseUnavailable(error.to_string()))
            }
            Err(_) => {
                warn!(
                    event_name = "pipeline.tool_timeout",
                    tool,
                    timeout_ms = self.query_timeout.as_millis() as u64,
                    "database tool timed out"
                );
                Err(PipelineError::DatabaseUnavailable(format!(
                    "`{tool}` timed out after {:?}",
                    self.query_timeout
                )))
            }
        }
    }
}

fn documents_from(mut output: Value) -> Result<Vec<Document>, PipelineError> {
    serde_json::from_value::<Vec<Document>>(output["documents"].take())
        .map_err(|error| PipelineError::DatabaseUnavailable(error.to_string()))
}

/// A 24-character hex token, otherwise the token following the word `id`.
pub fn extract_document_id(message: &str) -> Option<String> {
    let tokens = message
        .split_whitespace()
        .map(|token| {
            token.trim_matches(|ch: char| !ch.is_alphanumeric() && ch != '_' && ch != '-')
        })
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>();

    if let Some(hex) = tokens
        .iter()
        .find(|token| token.len() == DOCUMENT_ID_LEN && token.chars().all(|ch| ch.is_ascii_hexdigit()))
    {
        return Some((*hex).to_string());
    }

    tokens
        .windows(2)
        .find(|pair| matches!(pair[0].to_ascii_lowercase().as_str(), "id" | "_id"))
        .map(|pair| pair[1].to_string())
}

/// Content words of the message with the collection name (singular or plural) removed.
pub fn extract_search_terms(message: &str, collection: &str) -> Option<String> {
    let collection = collection.to_lowercase();
    let singular = collection.strip_suffix('s').unwrap_or(&collection).to_string();

    let terms = tokenize(&normalize_text(message))
        .into_iter()
        .filter(|token| token.chars().count() > 1)
        .filter(|token| !SEARCH_STOPWORDS.contains(&token.as_str()))
        .filter(|token| *token != collection && *token != singular)
        .collect::<Vec<_>>();

    (!terms.is_empty()).then(|| terms.join(" "))
}
