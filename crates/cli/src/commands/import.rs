use std::fs;
use std::path::Path;

use datachat_core::domain::document::Document;
use datachat_db::{DocumentStore, SqlDocumentStore};
use serde_json::Value;

use crate::commands::{with_database, CommandFailure, CommandResult};

/// Accepts a JSON array of objects, or a single object.
pub fn parse_documents(raw: &str) -> Result<Vec<Document>, String> {
    let value: Value = serde_json::from_str(raw).map_err(|error| format!("invalid JSON: {error}"))?;
    let items = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => return Err(format!("expected an array of objects, found {}", kind(&other))),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(document) => Ok(document),
            other => Err(format!("element {index} is {}, expected an object", kind(&other))),
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn run(collection: &str, file: &Path) -> CommandResult {
    let collection = collection.trim();
    if collection.is_empty() {
        return CommandResult::failure("import", "input", "collection name must not be empty", 6);
    }

    let documents = match fs::read_to_string(file)
        .map_err(|error| format!("failed to read {}: {error}", file.display()))
        .and_then(|raw| parse_documents(&raw))
    {
        Ok(documents) => documents,
        Err(message) => return CommandResult::failure("import", "input", message, 6),
    };

    let outcome = with_database("import", |pool, _config| async move {
        let store = SqlDocumentStore::new(pool);
        let store_failure = |error: datachat_db::RepositoryError| -> CommandFailure {
            ("store", error.to_string(), 7)
        };
        if documents.is_empty() {
            store.create_collection(collection).await.map_err(store_failure)?;
            return Ok(0);
        }
        store.insert_documents(collection, documents).await.map_err(store_failure)
    });

    match outcome {
        Ok(count) => CommandResult::success(
            "import",
            format!("imported {count} documents into '{collection}'"),
        ),
        Err(failure) => failure,
    }
}
