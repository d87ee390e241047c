use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::CollectionCatalog;
use crate::errors::CollectionNotFound;
use crate::sampling::{AdaptedBatch, AdapterMetadata};
use crate::schema::DocumentSchema;

/// A single schemaless record as returned by the database.
pub type Document = Map<String, Value>;

/// Equality filter over top-level fields.
pub type DocumentFilter = Map<String, Value>;

/// Fetched, shaped and described data for one collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub collection: String,
    pub documents: Vec<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<DocumentSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_note: Option<String>,
    pub metadata: AdapterMetadata,
}

impl QueryResult {
    pub fn from_batch(
        collection: impl Into<String>,
        batch: AdaptedBatch,
        schema: Option<DocumentSchema>,
    ) -> Self {
        Self {
            collection: collection.into(),
            documents: batch.documents,
            schema,
            sampling_note: batch.sampling_note,
            metadata: batch.metadata,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// What the router produced for a database question.
#[derive(Clone, Debug, PartialEq)]
pub enum RouteOutcome {
    Collections(CollectionCatalog),
    Data(QueryResult),
    NotFound(CollectionNotFound),
}
