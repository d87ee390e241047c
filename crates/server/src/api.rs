//! Chat and data routes.
//!
//! - `GET    /`                        welcome message
//! - `POST   /chat`                    run one message through the agent pipeline
//! - `GET    /history?session_id`      conversation turns for a session
//! - `DELETE /history?session_id`      forget a session
//! - `GET    /collections`             collection catalog
//! - `GET    /collection/{name}`       page through raw documents (`limit`, `skip`)
//! - `GET    /collection/{name}/schema` inferred schema of a collection

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use datachat_agent::{AgentRuntime, ChatReply};
use datachat_core::domain::conversation::{Role, SessionId};
use datachat_core::domain::document::Document;
use datachat_core::errors::InterfaceError;
use datachat_core::schema::schema_report;
use datachat_db::{DocumentStore, RepositoryError, SessionStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;
use uuid::Uuid;

use crate::bootstrap::Application;

pub const WELCOME_MESSAGE: &str = "Welcome to the Datachat API";
pub const HISTORY_CLEARED_MESSAGE: &str = "Conversation history cleared successfully";

const DEFAULT_PAGE_LIMIT: u32 = 10;

#[derive(Clone)]
pub struct ApiState {
    runtime: Arc<AgentRuntime>,
    documents: Arc<dyn DocumentStore>,
    sessions: Arc<dyn SessionStore>,
    schema_sample_limit: u32,
}

impl ApiState {
    pub fn new(
        runtime: Arc<AgentRuntime>,
        documents: Arc<dyn DocumentStore>,
        sessions: Arc<dyn SessionStore>,
        schema_sample_limit: u32,
    ) -> Self {
        Self { runtime, documents, sessions, schema_sample_limit }
    }

    pub fn from_application(app: &Application) -> Self {
        Self::new(
            Arc::clone(&app.agent_runtime),
            Arc::clone(&app.documents),
            Arc::clone(&app.sessions),
            app.config.pipeline.fetch_limit,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub skip: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct CollectionsResponse {
    pub collections: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CollectionDataResponse {
    pub data: Vec<Document>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    correlation_id: String,
}

/// HTTP face of [`InterfaceError`].
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl ApiError {
    fn from_repository(error: RepositoryError) -> Self {
        let correlation_id = Uuid::new_v4().to_string();
        let message = error.to_string();
        let mapped = match error {
            RepositoryError::InvalidFilter(_) => InterfaceError::BadRequest { message, correlation_id },
            RepositoryError::Decode(_) => InterfaceError::Internal { message, correlation_id },
            RepositoryError::Database(_) | RepositoryError::Unavailable(_) => {
                InterfaceError::ServiceUnavailable { message, correlation_id }
            }
        };
        Self(mapped)
    }

    fn status(&self) -> StatusCode {
        match self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(
            event_name = "system.api.request_failed",
            correlation_id = self.0.correlation_id(),
            status = status.as_u16(),
            error = %self.0,
            "data endpoint failed"
        );
        let body =
            ErrorBody { error: self.0.user_message(), correlation_id: self.0.correlation_id().to_string() };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: ApiState, cors_allow_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/chat", post(chat))
        .route("/history", get(history).delete(clear_history))
        .route("/collections", get(collections))
        .route("/collection/{name}", get(collection_data))
        .route("/collection/{name}/schema", get(collection_schema))
        .layer(cors_layer(cors_allow_origins))
        .with_state(state)
}

/// `*` anywhere in the list allows every origin; otherwise only the listed ones.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|origin| origin.trim() == "*") {
        return layer.allow_origin(Any);
    }

    let allowed = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(
                    event_name = "system.api.cors_origin_invalid",
                    origin = %origin,
                    error = %error,
                    "ignoring invalid CORS origin"
                );
                None
            }
        })
        .collect::<Vec<_>>();
    layer.allow_origin(AllowOrigin::list(allowed))
}

fn session_from(raw: Option<String>) -> SessionId {
    raw.map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .map(SessionId)
        .unwrap_or_default()
}

async fn root() -> Json<MessageResponse> {
    Json(MessageResponse { message: WELCOME_MESSAGE.to_string() })
}

/// Failures inside the pipeline come back as a reply sentence, never as an error status.
async fn chat(State(state): State<ApiState>, Json(request): Json<ChatRequest>) -> Json<ChatReply> {
    let session = session_from(request.session_id);
    Json(state.runtime.handle_message(&session, &request.message).await)
}

async fn history(
    State(state): State<ApiState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let session = session_from(query.session_id);
    let messages = state.sessions.history(&session).await.map_err(ApiError::from_repository)?;
    let history = messages
        .into_iter()
        .map(|message| HistoryEntry { role: message.role, content: message.content })
        .collect();
    Ok(Json(HistoryResponse { history }))
}

async fn clear_history(
    State(state): State<ApiState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let session = session_from(query.session_id);
    state.sessions.clear(&session).await.map_err(ApiError::from_repository)?;
    Ok(Json(MessageResponse { message: HISTORY_CLEARED_MESSAGE.to_string() }))
}

async fn collections(State(state): State<ApiState>) -> Result<Json<CollectionsResponse>, ApiError> {
    let catalog = state.documents.get_collections().await.map_err(ApiError::from_repository)?;
    Ok(Json(CollectionsResponse { collections: catalog.to_vec() }))
}

async fn collection_data(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<CollectionDataResponse>, ApiError> {
    let data = state
        .documents
        .query_collection(
            &name,
            None,
            page.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
            page.skip.unwrap_or(0),
        )
        .await
        .map_err(ApiError::from_repository)?;
    Ok(Json(CollectionDataResponse { data }))
}

async fn collection_schema(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let documents = state
        .documents
        .query_collection(&name, None, state.schema_sample_limit, 0)
        .await
        .map_err(ApiError::from_repository)?;
    Ok(Json(schema_report(&documents)))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use datachat_agent::{AgentRuntime, LlmClient, LlmError, RuntimeSettings};
    use datachat_core::domain::document::{Document, DocumentFilter};
    use datachat_core::CollectionCatalog;
    use datachat_db::{
        DocumentStore, InMemoryDocumentStore, InMemorySessionStore, RepositoryError,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, ApiState, HISTORY_CLEARED_MESSAGE, WELCOME_MESSAGE};

    struct QueuedLlm(Mutex<VecDeque<&'static str>>);

    #[async_trait]
    impl LlmClient for QueuedLlm {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            self.0
                .lock()
                .ok()
                .and_then(|mut queue| queue.pop_front())
                .map(str::to_string)
                .ok_or_else(|| LlmError::Request("queue empty".to_string()))
        }
    }

    struct OfflineStore;

    #[async_trait]
    impl DocumentStore for OfflineStore {
        async fn get_collections(&self) -> Result<CollectionCatalog, RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }

        async fn query_collection(
            &self,
            _collection: &str,
            _filter: Option<&DocumentFilter>,
            _limit: u32,
            _skip: u32,
        ) -> Result<Vec<Document>, RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }

        async fn get_document_by_id(
            &self,
            _collection: &str,
            _id: &str,
        ) -> Result<Option<Document>, RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }

        async fn search_text(
            &self,
            _collection: &str,
            _text: &str,
            _limit: u32,
        ) -> Result<Vec<Document>, RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }

        async fn create_collection(&self, _collection: &str) -> Result<(), RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }

        async fn insert_documents(
            &self,
            _collection: &str,
            _documents: Vec<Document>,
        ) -> Result<usize, RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }
    }

    fn document(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    fn seeded_store() -> Arc<dyn DocumentStore> {
        Arc::new(InMemoryDocumentStore::with_collections([
            (
                "orders".to_string(),
                vec![
                    document(json!({"_id": "o1", "item": "pen", "price": 2})),
                    document(json!({"_id": "o2", "item": "ink", "price": 3})),
                ],
            ),
            ("users".to_string(), vec![document(json!({"_id": "u1", "name": "Ada"}))]),
            ("logs".to_string(), Vec::new()),
        ]))
    }

    fn app_with(
        documents: Arc<dyn DocumentStore>,
        replies: &[&'static str],
        origins: &[&str],
    ) -> Router {
        let llm = Arc::new(QueuedLlm(Mutex::new(replies.iter().copied().collect())));
        let sessions = Arc::new(InMemorySessionStore::default());
        let runtime = AgentRuntime::new(
            llm,
            Arc::clone(&documents),
            sessions.clone(),
            RuntimeSettings {
                fetch_limit: 500,
                request_timeout: Duration::from_secs(5),
                query_timeout: Duration::from_secs(1),
            },
        )
        .expect("runtime");
        let origins = origins.iter().map(|origin| origin.to_string()).collect::<Vec<_>>();
        router(ApiState::new(Arc::new(runtime), documents, sessions, 500), &origins)
    }

    fn app() -> Router {
        app_with(seeded_store(), &[], &["*"])
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response =
            app.clone().oneshot(builder.body(body).expect("request")).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn root_returns_welcome_message() {
        let (status, body) = send(&app(), Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": WELCOME_MESSAGE}));
    }

    #[tokio::test]
    async fn chat_turns_are_listed_and_cleared_per_session() {
        let app = app_with(
            seeded_store(),
            &[r#"{"is_database_question": false}"#, "Hi there. How can I help?"],
            &["*"],
        );

        let (status, reply) =
            send(&app, Method::POST, "/chat", Some(json!({"message": "hello", "session_id": "s1"})))
                .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["response"], "Hi there.");
        assert_eq!(reply["session_id"], "s1");

        let (_, history) = send(&app, Method::GET, "/history?session_id=s1", None).await;
        assert_eq!(
            history,
            json!({"history": [
                {"role": "human", "content": "hello"},
                {"role": "ai", "content": "Hi there."}
            ]})
        );

        let (_, other) = send(&app, Method::GET, "/history", None).await;
        assert_eq!(other, json!({"history": []}));

        let (status, cleared) = send(&app, Method::DELETE, "/history?session_id=s1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cleared["message"], HISTORY_CLEARED_MESSAGE);

        let (_, history) = send(&app, Method::GET, "/history?session_id=s1", None).await;
        assert_eq!(history, json!({"history": []}));
    }

    #[tokio::test]
    async fn chat_reports_engine_failure_as_a_reply() {
        let (status, reply) =
            send(&app(), Method::POST, "/chat", Some(json!({"message": "tell me a joke"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            reply["response"],
            "I'm sorry, I encountered an error processing your request. Please try again with a different question."
        );
        assert_eq!(reply["session_id"], "default");
    }

    #[tokio::test]
    async fn collections_and_paged_documents() {
        let app = app();
        let (_, collections) = send(&app, Method::GET, "/collections", None).await;
        assert_eq!(collections, json!({"collections": ["logs", "orders", "users"]}));

        let (status, page) = send(&app, Method::GET, "/collection/orders?limit=1&skip=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["data"].as_array().map(Vec::len), Some(1));
        assert_eq!(page["data"][0]["_id"], "o2");

        let (_, missing) = send(&app, Method::GET, "/collection/invoices", None).await;
        assert_eq!(missing, json!({"data": []}));
    }

    #[tokio::test]
    async fn schema_endpoint_describes_fields_or_explains_absence() {
        let app = app();
        let (status, schema) = send(&app, Method::GET, "/collection/orders/schema", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(schema["fields"]["price"]["type"], "integer");
        assert_eq!(schema["metadata"]["total_documents"], 2);

        let (status, empty) = send(&app, Method::GET, "/collection/logs/schema", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(empty, json!({"message": "No documents available to extract schema"}));

        let (_, missing) = send(&app, Method::GET, "/collection/invoices/schema", None).await;
        assert_eq!(missing, json!({"message": "No documents available to extract schema"}));
    }

    #[tokio::test]
    async fn store_outage_maps_to_service_unavailable() {
        let app = app_with(Arc::new(OfflineStore), &[], &["*"]);
        let (status, body) = send(&app, Method::GET, "/collections", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "The service is temporarily unavailable. Please retry shortly.");
        assert!(body["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn cors_allows_configured_origins() {
        let request = |origin: &str| {
            Request::builder()
                .uri("/")
                .header(header::ORIGIN, origin)
                .body(Body::empty())
                .expect("request")
        };

        let open = app().oneshot(request("http://example.com")).await.expect("response");
        assert_eq!(
            open.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).and_then(|v| v.to_str().ok()),
            Some("*")
        );

        let restricted = app_with(seeded_store(), &[], &["http://localhost:3000"]);
        let allowed =
            restricted.clone().oneshot(request("http://localhost:3000")).await.expect("response");
        assert_eq!(
            allowed.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).and_then(|v| v.to_str().ok()),
            Some("http://localhost:3000")
        );
        let denied = restricted.oneshot(request("http://evil.test")).await.expect("response");
        assert!(denied.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
