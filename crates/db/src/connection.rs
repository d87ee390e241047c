use std::time::Duration;

use datachat_core::config::DatabaseConfig;
use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect_from_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

/// In-memory URLs are pinned to one connection that is never recycled, so every query sees
/// the same database for the lifetime of the pool.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let mut options = SqlitePoolOptions::new();
    options = if is_memory_url(database_url) {
        options.max_connections(1).idle_timeout(None).max_lifetime(None)
    } else {
        options.max_connections(max_connections.max(1))
    };

    options
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

fn is_memory_url(database_url: &str) -> bool {
    database_url == ":memory:" || database_url.starts_with("sqlite::memory:")
}
