use datachat_core::schema::schema_report;
use datachat_db::{DocumentStore, SqlDocumentStore};

use crate::commands::{with_database, CommandResult};

/// Infers the schema over at most `limit` documents (default: `pipeline.fetch_limit`).
pub fn run(collection: &str, limit: Option<u32>) -> CommandResult {
    let outcome = with_database("schema", |pool, config| async move {
        let limit = limit.unwrap_or(config.pipeline.fetch_limit);
        SqlDocumentStore::new(pool)
            .query_collection(collection, None, limit, 0)
            .await
            .map_err(|error| ("store", error.to_string(), 7u8))
    });

    match outcome {
        Ok(documents) => CommandResult::success_with_data(
            "schema",
            format!("inspected {} documents in '{collection}'", documents.len()),
            Some(schema_report(&documents)),
        ),
        Err(failure) => failure,
    }
}
