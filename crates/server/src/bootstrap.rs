use std::sync::Arc;

use datachat_agent::prompts::PromptError;
use datachat_agent::{build_llm_client, AgentRuntime, LlmError, RuntimeSettings};
use datachat_core::config::{AppConfig, ConfigError, LoadOptions, MemoryBackend};
use datachat_db::{
    connect_from_config, migrations, DbPool, DocumentStore, InMemorySessionStore, SessionStore,
    SqlDocumentStore, SqlSessionStore,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub documents: Arc<dyn DocumentStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub agent_runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client setup failed: {0}")]
    Llm(#[from] LlmError),
    #[error("prompt templates failed to load: {0}")]
    Prompts(#[from] PromptError),
}

#[cfg(test)]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let documents: Arc<dyn DocumentStore> = Arc::new(SqlDocumentStore::new(db_pool.clone()));
    let sessions: Arc<dyn SessionStore> = match config.memory.backend {
        MemoryBackend::Memory => Arc::new(InMemorySessionStore::default()),
        MemoryBackend::Sqlite => Arc::new(SqlSessionStore::new(db_pool.clone())),
    };

    let llm = build_llm_client(&config.llm)?;
    let agent_runtime = Arc::new(AgentRuntime::new(
        llm,
        Arc::clone(&documents),
        Arc::clone(&sessions),
        RuntimeSettings::from(&config.pipeline),
    )?);
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        llm_provider = ?config.llm.provider,
        llm_model = %config.llm.model,
        memory_backend = ?config.memory.backend,
        "agent runtime initialized"
    );

    Ok(Application { config, db_pool, documents, sessions, agent_runtime })
}
