use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use datachat_core::config::{LlmConfig, LlmProvider};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("could not build http client: {0}")]
    Client(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode provider response: {0}")]
    Decode(String),
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),
}

/// Prompt in, completion out. No structural guarantees are made about the completion.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[async_trait]
impl<T> LlmClient for Arc<T>
where
    T: LlmClient + ?Sized,
{
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        (**self).complete(prompt).await
    }
}

fn http_client(timeout: Duration) -> Result<Client, LlmError> {
    Client::builder().timeout(timeout).build().map_err(|error| LlmError::Client(error.to_string()))
}

async fn send_json<B, R>(request: reqwest::RequestBuilder, body: &B) -> Result<R, LlmError>
where
    B: Serialize + ?Sized,
    R: for<'de> Deserialize<'de>,
{
    let response =
        request.json(body).send().await.map_err(|error| LlmError::Request(error.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Status { status: status.as_u16(), body });
    }

    response.json::<R>().await.map_err(|error| LlmError::Decode(error.to_string()))
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ollama `/api/generate` client.
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client: http_client(timeout)?, base_url, model: model.into() })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GenerateRequest { model: &self.model, prompt, stream: false };
        let response: GenerateResponse =
            send_json(self.client.post(format!("{}/api/generate", self.base_url)), &request)
                .await?;

        debug!(
            event_name = "system.llm.completed",
            provider = "ollama",
            response_len = response.response.len(),
            "completion received"
        );
        Ok(response.response)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatCompletionMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionContent,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionContent {
    #[serde(default)]
    content: Option<String>,
}

/// Any server speaking the OpenAI `/v1/chat/completions` protocol.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client: http_client(timeout)?, base_url, model: model.into(), api_key })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatCompletionMessage { role: "user", content: prompt }],
        };

        let mut builder = self.client.post(format!("{}/v1/chat/completions", self.base_url));
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response: ChatCompletionResponse = send_json(builder, &request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Decode("response contained no choices".to_string()))?;

        debug!(
            event_name = "system.llm.completed",
            provider = "openai",
            response_len = content.len(),
            "completion received"
        );
        Ok(content)
    }
}

/// Bounds every attempt with a timeout and retries failures with linear backoff.
pub struct RetryingLlm<C> {
    inner: C,
    attempt_timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl<C> RetryingLlm<C> {
    pub fn new(inner: C, attempt_timeout: Duration, max_retries: u32) -> Self {
        Self { inner, attempt_timeout, max_retries, backoff: RETRY_BACKOFF }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

#[async_trait]
impl<C> LlmClient for RetryingLlm<C>
where
    C: LlmClient,
{
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            let outcome =
                match tokio::time::timeout(self.attempt_timeout, self.inner.complete(prompt)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(LlmError::Timeout(self.attempt_timeout)),
                };

            match outcome {
                Ok(completion) => return Ok(completion),
                Err(error) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "system.llm.retry",
                        attempt,
                        max_retries = self.max_retries,
                        error = %error,
                        "completion attempt failed, retrying"
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Builds the configured provider wrapped in the retry/timeout budget.
pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::Ollama => {
            let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
            Arc::new(RetryingLlm::new(
                OllamaClient::new(base_url, &config.model, timeout)?,
                timeout,
                config.max_retries,
            ))
        }
        LlmProvider::OpenAi => {
            let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_OPENAI_URL);
            Arc::new(RetryingLlm::new(
                OpenAiClient::new(base_url, &config.model, config.api_key.clone(), timeout)?,
                timeout,
                config.max_retries,
            ))
        }
    };
    Ok(client)
}
