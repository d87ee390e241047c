pub mod analysis;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod sampling;
pub mod schema;
pub mod text;

pub use analysis::{detect_analysis_type, AnalysisType};
pub use catalog::{pluralize_collection, resolve_collection, CollectionCatalog};
pub use domain::conversation::{ChatMessage, Role, SessionContext, SessionId};
pub use domain::document::{Document, DocumentFilter, QueryResult, RouteOutcome};
pub use domain::intent::{IntentDecision, QueryType, Recovery, RecoveryLayer};
pub use errors::{
    ClassificationRecoveryFailure, CollectionNotFound, EmptySchemaInput, InterfaceError,
    PipelineError,
};
pub use sampling::{adapt_documents, AdaptedBatch, AdapterMetadata};
pub use schema::{infer_schema, schema_report, DocumentSchema, SchemaField, SchemaMetadata};
