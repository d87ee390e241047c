//! Agent runtime: turns a chat message into a direct answer.
//!
//! The pipeline is a fixed sequence rather than a free-running agent loop:
//! 1. **Classification** (`classifier`) - generator output → `IntentDecision`, with recovery
//! 2. **Routing** (`router`) - resolve the collection and fetch through `tools`
//! 3. **Analysis** (`prompts`, `llm`) - shaped data + analysis instruction → completion
//! 4. **Sanitizing** (`guardrails`) - enforce the direct-answer policy
//!
//! The generator only ever phrases answers. Which collection is read, how much data is
//! fetched and what is sampled are decided deterministically.

pub mod classifier;
pub mod guardrails;
pub mod llm;
pub mod prompts;
pub mod router;
pub mod runtime;
pub mod tools;

pub use classifier::IntentClassifier;
pub use guardrails::ResponseSanitizer;
pub use llm::{build_llm_client, LlmClient, LlmError, OllamaClient, OpenAiClient, RetryingLlm};
pub use router::QueryRouter;
pub use runtime::{AgentRuntime, ChatReply, RuntimeSettings};
pub use tools::{Tool, ToolError, ToolRegistry};
