use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use datachat_core::analysis::detect_analysis_type;
use datachat_core::config::PipelineConfig;
use datachat_core::domain::conversation::{ChatMessage, SessionContext, SessionId};
use datachat_core::domain::document::{QueryResult, RouteOutcome};
use datachat_core::domain::intent::{QueryType, RecoveryLayer};
use datachat_core::errors::PipelineError;
use datachat_db::{DocumentStore, SessionStore};

use crate::classifier::IntentClassifier;
use crate::guardrails::ResponseSanitizer;
use crate::llm::LlmClient;
use crate::prompts::{AnalysisPrompt, PromptError, PromptLibrary};
use crate::router::QueryRouter;
use crate::tools::ToolRegistry;

pub const EMPTY_CATALOG_REPLY: &str = "The database doesn't have any collections yet.";

#[derive(Clone, Debug)]
pub struct RuntimeSettings {
    pub fetch_limit: u32,
    pub request_timeout: Duration,
    pub query_timeout: Duration,
}

impl From<&PipelineConfig> for RuntimeSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            fetch_limit: config.fetch_limit,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            query_timeout: Duration::from_secs(config.query_timeout_secs),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub session_id: String,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_layer: Option<RecoveryLayer>,
}

/// Classify → route → analyze → sanitize, once per chat message.
pub struct AgentRuntime {
    classifier: IntentClassifier,
    router: QueryRouter,
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    sanitizer: ResponseSanitizer,
    sessions: Arc<dyn SessionStore>,
    request_timeout: Duration,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        documents: Arc<dyn DocumentStore>,
        sessions: Arc<dyn SessionStore>,
        settings: RuntimeSettings,
    ) -> Result<Self, PromptError> {
        let prompts = Arc::new(PromptLibrary::new()?);
        let tools = Arc::new(ToolRegistry::for_store(documents));

        Ok(Self {
            classifier: IntentClassifier::new(Arc::clone(&llm), Arc::clone(&prompts)),
            router: QueryRouter::new(tools, settings.fetch_limit, settings.query_timeout),
            llm,
            prompts,
            sanitizer: ResponseSanitizer::new(),
            sessions,
            request_timeout: settings.request_timeout,
        })
    }

    /// Always produces a reply; failures become a user-facing sentence.
    pub async fn handle_message(&self, session: &SessionId, message: &str) -> ChatReply {
        let started = Instant::now();
        let history = match self.sessions.history(session).await {
            Ok(history) => history,
            Err(error) => {
                warn!(
                    event_name = "pipeline.history_unavailable",
                    session_id = session.as_str(),
                    error = %error,
                    "could not load conversation history"
                );
                Vec::new()
            }
        };
        let context = SessionContext::new(session.clone(), history);

        let outcome = tokio::time::timeout(self.request_timeout, self.answer(&context, message))
            .await
            .unwrap_or_else(|_| {
                Err(PipelineError::GenerationFailure(format!(
                    "request exceeded {:?}",
                    self.request_timeout
                )))
            });

        let (response, recovery_layer) = match outcome {
            Ok(answer) => (answer.text, answer.recovery_layer),
            Err(error) => {
                warn!(
                    event_name = error.event_name(),
                    correlation_id = %context.correlation_id,
                    session_id = session.as_str(),
                    error = %error,
                    "chat request degraded to fallback reply"
                );
                (error.user_message(), None)
            }
        };

        self.remember(session, message, &response).await;

        info!(
            event_name = "pipeline.request.completed",
            correlation_id = %context.correlation_id,
            session_id = session.as_str(),
            duration_ms = started.elapsed().as_millis() as u64,
            "chat request completed"
        );

        ChatReply {
            response,
            session_id: session.as_str().to_string(),
            correlation_id: context.correlation_id,
            recovery_layer,
        }
    }

    async fn remember(&self, session: &SessionId, message: &str, response: &str) {
        let turn = self
            .sessions
            .append_turn(session, ChatMessage::human(message), ChatMessage::ai(response))
            .await;
        if let Err(error) = turn {
            warn!(
                event_name = "pipeline.history_append_failed",
                session_id = session.as_str(),
                error = %error,
                "could not record conversation turn"
            );
        }
    }

    async fn answer(&self, context: &SessionContext, message: &str) -> Result<Answer, PipelineError> {
        let correlation_id = context.correlation_id.as_str();
        let classification = self.classifier.classify(message, correlation_id).await;
        let recovery_layer = Some(classification.layer());
        let decision = classification.into_inner();

        if !decision.is_database_question() {
            let prompt = self
                .prompts
                .general(&context.transcript(), message)
                .map_err(|error| PipelineError::GenerationFailure(error.to_string()))?;
            let text = self.generate(&prompt).await?;
            return Ok(Answer { text, recovery_layer });
        }

        let analysis_type = detect_analysis_type(message);
        let text = match self.router.route(&decision, message, analysis_type, correlation_id).await? {
            RouteOutcome::Collections(catalog) if catalog.is_empty() => EMPTY_CATALOG_REPLY.to_string(),
            RouteOutcome::Collections(catalog) => format!(
                "The database contains the following collections: {}. You can ask questions about any of these collections.",
                catalog.display_list()
            ),
            RouteOutcome::NotFound(not_found) => return Err(not_found.into()),
            RouteOutcome::Data(result) if result.is_empty() => match decision.query_type() {
                QueryType::GetDocument | QueryType::TextSearch => format!(
                    "I couldn't find any matching documents in the collection '{}'.",
                    result.collection
                ),
                QueryType::QueryDocuments | QueryType::ListCollections => format!(
                    "The collection '{}' doesn't have any documents yet.",
                    result.collection
                ),
            },
            RouteOutcome::Data(result) => {
                let data_json = analysis_payload(&result)?;
                let prompt = self
                    .prompts
                    .analysis(&AnalysisPrompt {
                        question: message,
                        instruction: analysis_type.instruction(),
                        sampling_note: result.sampling_note.as_deref(),
                        data_json: &data_json,
                    })
                    .map_err(|error| PipelineError::GenerationFailure(error.to_string()))?;
                self.generate(&prompt).await?
            }
        };

        Ok(Answer { text, recovery_layer })
    }

    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        let completion = self
            .llm
            .complete(prompt)
            .await
            .map_err(|error| PipelineError::GenerationFailure(error.to_string()))?;

        let sanitized = self.sanitizer.sanitize(&completion);
        if sanitized.is_empty() {
            return Err(PipelineError::GenerationFailure(
                "completion was empty after sanitizing".to_string(),
            ));
        }
        Ok(sanitized)
    }
}

struct Answer {
    text: String,
    recovery_layer: Option<RecoveryLayer>,
}

fn analysis_payload(result: &QueryResult) -> Result<String, PipelineError> {
    serde_json::to_string_pretty(&json!({
        "collection": result.collection,
        "documents": result.documents,
        "schema": result.schema,
        "metadata": result.metadata,
        "sampling_note": result.sampling_note,
    }))
    .map_err(|error| PipelineError::GenerationFailure(error.to_string()))
}
