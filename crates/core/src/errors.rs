use thiserror::Error;

pub const NO_DOCUMENTS_MESSAGE: &str = "No documents available to extract schema";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("collection `{}` not found", .requested.as_deref().unwrap_or("<none>"))]
pub struct CollectionNotFound {
    pub requested: Option<String>,
    pub available: Vec<String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{}", NO_DOCUMENTS_MESSAGE)]
pub struct EmptySchemaInput;

/// Every parsing layer failed; only ever logged, the classifier falls back to heuristics.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("classification recovery failed: {0}")]
pub struct ClassificationRecoveryFailure(pub String);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    CollectionNotFound(#[from] CollectionNotFound),
    #[error("database unavailable: {0}")]
    DatabaseUnavailable(String),
    #[error("generation failed: {0}")]
    GenerationFailure(String),
    #[error(transparent)]
    EmptySchemaInput(#[from] EmptySchemaInput),
}

impl PipelineError {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::CollectionNotFound(_) => "pipeline.collection_not_found",
            Self::DatabaseUnavailable(_) => "pipeline.database_unavailable",
            Self::GenerationFailure(_) => "pipeline.generation_failure",
            Self::EmptySchemaInput(_) => "pipeline.empty_schema_input",
        }
    }

    /// Natural-language reply shown at the chat endpoint instead of the raw error.
    pub fn user_message(&self) -> String {
        match self {
            Self::CollectionNotFound(CollectionNotFound { requested, available }) => {
                let requested = requested.as_deref().unwrap_or("that");
                if available.is_empty() {
                    format!(
                        "I couldn't find a collection named '{requested}'. The database doesn't have any collections yet."
                    )
                } else {
                    format!(
                        "I couldn't find a collection named '{requested}'. Available collections: {}.",
                        available.join(", ")
                    )
                }
            }
            Self::DatabaseUnavailable(_) => {
                "I'm sorry, I couldn't access the database right now. Please try again later."
                    .to_string()
            }
            Self::GenerationFailure(_) => {
                "I'm sorry, I encountered an error processing your request. Please try again with a different question."
                    .to_string()
            }
            Self::EmptySchemaInput(error) => format!("{error}."),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested resource does not exist.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl PipelineError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<PipelineError> for InterfaceError {
    fn from(value: PipelineError) -> Self {
        let message = value.to_string();
        match value {
            PipelineError::CollectionNotFound(_) => {
                Self::NotFound { message, correlation_id: "unassigned".to_owned() }
            }
            PipelineError::EmptySchemaInput(_) => {
                Self::BadRequest { message, correlation_id: "unassigned".to_owned() }
            }
            PipelineError::DatabaseUnavailable(_) | PipelineError::GenerationFailure(_) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
