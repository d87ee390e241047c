use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use datachat_core::domain::conversation::{ChatMessage, Role, SessionId};

use super::{RepositoryError, SessionStore};
use crate::DbPool;

pub struct SqlSessionStore {
    pool: DbPool,
}

impl SqlSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn message_from_row(row: &SqliteRow) -> Result<ChatMessage, RepositoryError> {
    let role: String = row.try_get("role")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(ChatMessage {
        role: role.parse::<Role>().map_err(RepositoryError::Decode)?,
        content: row.try_get("content")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .map_err(|error| RepositoryError::Decode(format!("invalid created_at: {error}")))?,
    })
}

const INSERT_MESSAGE: &str = "INSERT INTO conversation_message (session_id, role, content, created_at)
     VALUES (?, ?, ?, ?)";

#[async_trait::async_trait]
impl SessionStore for SqlSessionStore {
    async fn append(
        &self,
        session: &SessionId,
        message: ChatMessage,
    ) -> Result<(), RepositoryError> {
        sqlx::query(INSERT_MESSAGE)
            .bind(session.as_str())
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(message.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn append_turn(
        &self,
        session: &SessionId,
        human: ChatMessage,
        ai: ChatMessage,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for message in [&human, &ai] {
            sqlx::query(INSERT_MESSAGE)
                .bind(session.as_str())
                .bind(message.role.as_str())
                .bind(&message.content)
                .bind(message.created_at.to_rfc3339())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn history(&self, session: &SessionId) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT role, content, created_at FROM conversation_message
             WHERE session_id = ? ORDER BY id",
        )
        .bind(session.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    async fn clear(&self, session: &SessionId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM conversation_message WHERE session_id = ?")
            .bind(session.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use datachat_core::domain::conversation::{ChatMessage, Role, SessionId};

    use super::SqlSessionStore;
    use crate::repositories::SessionStore;
    use crate::{connect_with_settings, migrations};

    type TestResult<T> = Result<T, String>;

    async fn setup_store() -> TestResult<SqlSessionStore> {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .map_err(|error| format!("connect test pool: {error}"))?;
        migrations::run_pending(&pool).await.map_err(|error| format!("run migrations: {error}"))?;
        Ok(SqlSessionStore::new(pool))
    }

    #[tokio::test]
    async fn history_is_ordered_and_isolated_per_session() -> TestResult<()> {
        let store = setup_store().await?;
        let alpha = SessionId("alpha".to_string());
        let beta = SessionId("beta".to_string());

        store.append(&alpha, ChatMessage::human("hi")).await.map_err(|e| e.to_string())?;
        store.append(&beta, ChatMessage::human("other")).await.map_err(|e| e.to_string())?;
        store.append(&alpha, ChatMessage::ai("Hello.")).await.map_err(|e| e.to_string())?;

        let history = store.history(&alpha).await.map_err(|e| e.to_string())?;
        let roles = history.iter().map(|message| message.role).collect::<Vec<_>>();
        assert_eq!(roles, vec![Role::Human, Role::Ai]);
        assert_eq!(history[1].content, "Hello.");

        store.clear(&alpha).await.map_err(|e| e.to_string())?;
        assert!(store.history(&alpha).await.map_err(|e| e.to_string())?.is_empty());
        assert_eq!(store.history(&beta).await.map_err(|e| e.to_string())?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn turns_are_stored_as_adjacent_pairs() -> TestResult<()> {
        let store = setup_store().await?;
        let session = SessionId("turns".to_string());

        store
            .append_turn(&session, ChatMessage::human("count orders"), ChatMessage::ai("There are 2."))
            .await
            .map_err(|e| e.to_string())?;
        store
            .append_turn(&session, ChatMessage::human("and users?"), ChatMessage::ai("There is 1."))
            .await
            .map_err(|e| e.to_string())?;

        let history = store.history(&session).await.map_err(|e| e.to_string())?;
        let turns = history
            .iter()
            .map(|message| (message.role, message.content.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            turns,
            vec![
                (Role::Human, "count orders"),
                (Role::Ai, "There are 2."),
                (Role::Human, "and users?"),
                (Role::Ai, "There is 1."),
            ]
        );
        Ok(())
    }
}
