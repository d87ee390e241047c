use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_SESSION_ID: &str = "default";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self(DEFAULT_SESSION_ID.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Ai,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Ai => "ai",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "human" => Ok(Self::Human),
            "ai" => Ok(Self::Ai),
            other => Err(format!("unknown conversation role `{other}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn human(content: impl Into<String>) -> Self {
        Self { role: Role::Human, content: content.into(), created_at: Utc::now() }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self { role: Role::Ai, content: content.into(), created_at: Utc::now() }
    }
}

/// Per-request context threaded through the pipeline in place of shared global memory.
#[derive(Clone, Debug)]
pub struct SessionContext {
    pub session_id: SessionId,
    pub correlation_id: String,
    /// Snapshot taken when the request started; later writes by other requests are not visible.
    pub history: Vec<ChatMessage>,
}

impl SessionContext {
    pub fn new(session_id: SessionId, history: Vec<ChatMessage>) -> Self {
        Self { session_id, correlation_id: Uuid::new_v4().to_string(), history }
    }

    /// Renders the snapshot as `Human: ...` / `AI: ...` lines for prompt assembly.
    pub fn transcript(&self) -> String {
        self.history
            .iter()
            .map(|message| match message.role {
                Role::Human => format!("Human: {}", message.content),
                Role::Ai => format!("AI: {}", message.content),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
