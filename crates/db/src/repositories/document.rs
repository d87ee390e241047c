use chrono::Utc;
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row};

use datachat_core::domain::document::{Document, DocumentFilter};
use datachat_core::CollectionCatalog;

use super::{ensure_document_id, filter_segments, search_terms, DocumentStore, RepositoryError};
use crate::DbPool;

/// Documents are stored as JSON text; filters and search run through SQLite's JSON1 functions.
pub struct SqlDocumentStore {
    pool: DbPool,
}

impl SqlDocumentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

enum FilterValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Json(String),
}

struct FilterClause {
    path: String,
    value: FilterValue,
}

impl FilterClause {
    fn sql(&self) -> &'static str {
        match self.value {
            FilterValue::Null => " AND json_extract(body, ?) IS NULL",
            FilterValue::Json(_) => " AND json_extract(body, ?) = json(?)",
            _ => " AND json_extract(body, ?) = ?",
        }
    }
}

fn filter_clauses(filter: Option<&DocumentFilter>) -> Result<Vec<FilterClause>, RepositoryError> {
    let Some(filter) = filter else {
        return Ok(Vec::new());
    };

    filter
        .iter()
        .map(|(key, value)| {
            let path = filter_segments(key)?
                .iter()
                .fold(String::from("$"), |path, segment| format!("{path}.\"{segment}\""));
            let value = match value {
                Value::Null => FilterValue::Null,
                Value::Bool(flag) => FilterValue::Integer(i64::from(*flag)),
                Value::Number(number) => match number.as_i64() {
                    Some(integer) => FilterValue::Integer(integer),
                    None => FilterValue::Real(number.as_f64().unwrap_or(f64::NAN)),
                },
                Value::String(text) => FilterValue::Text(text.clone()),
                other => FilterValue::Json(other.to_string()),
            };
            Ok(FilterClause { path, value })
        })
        .collect()
}

fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

fn decode_body(row: &SqliteRow) -> Result<Document, RepositoryError> {
    let body: String = row.try_get("body")?;
    serde_json::from_str::<Document>(&body)
        .map_err(|error| RepositoryError::Decode(format!("invalid document body: {error}")))
}

#[async_trait::async_trait]
impl DocumentStore for SqlDocumentStore {
    async fn get_collections(&self) -> Result<CollectionCatalog, RepositoryError> {
        let rows = sqlx::query("SELECT name FROM collection ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        let names = rows
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CollectionCatalog::new(names))
    }

    async fn query_collection(
        &self,
        collection: &str,
        filter: Option<&DocumentFilter>,
        limit: u32,
        skip: u32,
    ) -> Result<Vec<Document>, RepositoryError> {
        let clauses = filter_clauses(filter)?;

        let mut sql = String::from("SELECT body FROM document WHERE collection = ?");
        for clause in &clauses {
            sql.push_str(clause.sql());
        }
        sql.push_str(" ORDER BY seq LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql).bind(collection);
        for clause in &clauses {
            query = query.bind(clause.path.as_str());
            query = match &clause.value {
                FilterValue::Null => query,
                FilterValue::Integer(value) => query.bind(*value),
                FilterValue::Real(value) => query.bind(*value),
                FilterValue::Text(value) | FilterValue::Json(value) => query.bind(value.as_str()),
            };
        }

        let rows =
            query.bind(i64::from(limit)).bind(i64::from(skip)).fetch_all(&self.pool).await?;
        rows.iter().map(decode_body).collect()
    }

    async fn get_document_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, RepositoryError> {
        let row =
            sqlx::query("SELECT body FROM document WHERE collection = ? AND document_id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref().map(decode_body).transpose()
    }

    async fn search_text(
        &self,
        collection: &str,
        text: &str,
        limit: u32,
    ) -> Result<Vec<Document>, RepositoryError> {
        let terms = search_terms(text);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let matchers = vec![r"lower(t.atom) LIKE ? ESCAPE '\'"; terms.len()].join(" OR ");
        let sql = format!(
            "SELECT d.body FROM document d
             WHERE d.collection = ?
               AND EXISTS (
                   SELECT 1 FROM json_tree(d.body) AS t
                   WHERE t.type = 'text' AND ({matchers})
               )
             ORDER BY d.seq
             LIMIT ?"
        );

        let mut query = sqlx::query(&sql).bind(collection);
        for term in &terms {
            query = query.bind(like_pattern(term));
        }

        let rows = query.bind(i64::from(limit)).fetch_all(&self.pool).await?;
        rows.iter().map(decode_body).collect()
    }

    async fn create_collection(&self, collection: &str) -> Result<(), RepositoryError> {
        sqlx::query("INSERT OR IGNORE INTO collection (name, created_at) VALUES (?, ?)")
            .bind(collection)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_documents(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<usize, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO collection (name, created_at) VALUES (?, ?)")
            .bind(collection)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        let mut written = 0;
        for mut document in documents {
            let id = ensure_document_id(&mut document);
            let body = serde_json::to_string(&document)
                .map_err(|error| RepositoryError::Decode(error.to_string()))?;

            sqlx::query(
                r#"
                INSERT INTO document (collection, document_id, body, created_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(collection, document_id) DO UPDATE SET body = excluded.body
                "#,
            )
            .bind(collection)
            .bind(&id)
            .bind(&body)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            written += 1;
        }

        tx.commit().await?;
        Ok(written)
    }
}
