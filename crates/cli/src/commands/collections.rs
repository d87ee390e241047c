use datachat_db::{DocumentStore, SqlDocumentStore};
use serde_json::json;

use crate::commands::{with_database, CommandResult};

pub fn run() -> CommandResult {
    let outcome = with_database("collections", |pool, _config| async move {
        SqlDocumentStore::new(pool)
            .get_collections()
            .await
            .map_err(|error| ("store", error.to_string(), 7u8))
    });

    match outcome {
        Ok(catalog) => CommandResult::success_with_data(
            "collections",
            format!("{} collections", catalog.len()),
            Some(json!({ "collections": catalog.to_vec() })),
        ),
        Err(failure) => failure,
    }
}
