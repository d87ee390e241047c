//! Schema inference over a batch of semi-structured documents.
//!
//! Field paths are flattened one level deep: `parent.child` for embedded records and
//! `parent[].child` for arrays whose first element is a record. Only the first element of
//! an array is walked; it is a structural sample, not a validation pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::document::Document;
use crate::errors::EmptySchemaInput;
use crate::text::truncate_chars;

const EXAMPLE_MAX_CHARS: usize = 50;
const TYPE_UNION_SEPARATOR: &str = " | ";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub occurrence_count: usize,
    /// Percentage of documents in the batch that carry this field, in `0.0..=100.0`.
    pub occurrence_rate: f64,
    pub required: bool,
    pub example: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested_of: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub total_documents: usize,
    pub top_level_fields: Vec<String>,
    pub has_nested_fields: bool,
    pub has_array_fields: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentSchema {
    pub fields: BTreeMap<String, SchemaField>,
    pub metadata: SchemaMetadata,
}

impl DocumentSchema {
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.get(name)
    }
}

/// Running per-field state while walking the batch.
#[derive(Debug)]
struct FieldStats {
    types: Vec<String>,
    occurrence_count: usize,
    example: String,
    nested_of: Option<String>,
    first_seen: usize,
}

#[derive(Debug, Default)]
struct SchemaBuilder {
    fields: BTreeMap<String, FieldStats>,
}

impl SchemaBuilder {
    fn observe_document(&mut self, document: &Document) {
        for (key, value) in document {
            self.record(key.clone(), value, None);

            match value {
                Value::Object(nested) => {
                    for (child_key, child_value) in nested {
                        self.record(format!("{key}.{child_key}"), child_value, Some(key.as_str()));
                    }
                }
                Value::Array(items) => {
                    if let Some(Value::Object(sample)) = items.first() {
                        for (child_key, child_value) in sample {
                            self.record(format!("{key}[].{child_key}"), child_value, Some(key.as_str()));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn record(&mut self, path: String, value: &Value, parent: Option<&str>) {
        let type_name = type_name(value);
        let next_order = self.fields.len();
        let stats = self.fields.entry(path).or_insert_with(|| FieldStats {
            types: Vec::new(),
            occurrence_count: 0,
            example: example_text(value),
            nested_of: parent.map(str::to_string),
            first_seen: next_order,
        });

        stats.occurrence_count += 1;
        if !stats.types.contains(&type_name) {
            stats.types.push(type_name);
        }
    }

    fn finish(self, total_documents: usize) -> DocumentSchema {
        let mut ordered = self.fields.iter().collect::<Vec<_>>();
        ordered.sort_by_key(|(_, stats)| stats.first_seen);
        let top_level_fields = ordered
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| !is_flattened_path(name))
            .map(str::to_string)
            .collect::<Vec<_>>();

        let has_nested_fields = self.fields.keys().any(|name| name.contains('.'));
        let has_array_fields = self.fields.keys().any(|name| name.contains("[]"));

        let fields = self
            .fields
            .into_iter()
            .map(|(name, stats)| {
                let field = SchemaField {
                    name: name.clone(),
                    field_type: stats.types.join(TYPE_UNION_SEPARATOR),
                    occurrence_count: stats.occurrence_count,
                    occurrence_rate: occurrence_rate(stats.occurrence_count, total_documents),
                    required: stats.occurrence_count == total_documents,
                    example: stats.example,
                    nested_of: stats.nested_of,
                };
                (name, field)
            })
            .collect();

        DocumentSchema {
            fields,
            metadata: SchemaMetadata {
                total_documents,
                top_level_fields,
                has_nested_fields,
                has_array_fields,
            },
        }
    }
}

pub fn infer_schema(documents: &[Document]) -> Result<DocumentSchema, EmptySchemaInput> {
    if documents.is_empty() {
        return Err(EmptySchemaInput);
    }

    let mut builder = SchemaBuilder::default();
    for document in documents {
        builder.observe_document(document);
    }
    Ok(builder.finish(documents.len()))
}

/// JSON rendering used by the schema endpoint and prompt assembly: the schema itself, or an
/// explicit `{"message": ...}` object when there was nothing to inspect.
pub fn schema_report(documents: &[Document]) -> Value {
    match infer_schema(documents) {
        Ok(schema) => serde_json::to_value(schema)
            .unwrap_or_else(|error| serde_json::json!({ "message": error.to_string() })),
        Err(error) => serde_json::json!({ "message": error.to_string() }),
    }
}

pub fn type_name(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(number) if number.is_i64() || number.is_u64() => "integer".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(items) => match items.first() {
            Some(first) => format!("array<{}>", type_name(first)),
            None => "array".to_string(),
        },
        Value::Object(_) => "object".to_string(),
    }
}

fn example_text(value: &Value) -> String {
    let raw = match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    truncate_chars(&raw, EXAMPLE_MAX_CHARS)
}

fn occurrence_rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = count as f64 * 100.0 / total as f64;
    (rate * 100.0).round() / 100.0
}

fn is_flattened_path(name: &str) -> bool {
    name.contains('.') || name.contains("[]")
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{infer_schema, schema_report, type_name};
    use crate::domain::document::Document;
    use crate::errors::EmptySchemaInput;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("fixture must be an object, got {other}"),
        }
    }

    #[test]
    fn integer_then_fraction_unions_types_in_first_seen_order() {
        let schema = infer_schema(&[doc(json!({"x": 1})), doc(json!({"x": 2.5}))])
            .expect("schema for two documents");

        let field = schema.field("x").expect("x is tracked");
        assert_eq!(field.field_type, "integer | number");
        assert_eq!(field.occurrence_count, 2);
        assert!(field.required);
        assert_eq!(field.occurrence_rate, 100.0);
    }

    #[test]
    fn integer_then_string_unions_types() {
        let schema = infer_schema(&[doc(json!({"x": 1})), doc(json!({"x": "one"}))])
            .expect("schema for two documents");
        assert_eq!(schema.field("x").expect("x").field_type, "integer | string");
    }

    #[test]
    fn union_never_narrows_or_duplicates() {
        let schema = infer_schema(&[
            doc(json!({"x": "a"})),
            doc(json!({"x": null})),
            doc(json!({"x": "b"})),
        ])
        .expect("schema");
        assert_eq!(schema.field("x").expect("x").field_type, "string | null");
    }

    #[test]
    fn optional_fields_report_partial_occurrence() {
        let schema = infer_schema(&[
            doc(json!({"name": "a", "email": "a@example.com"})),
            doc(json!({"name": "b"})),
            doc(json!({"name": "c"})),
        ])
        .expect("schema");

        let email = schema.field("email").expect("email");
        assert_eq!(email.occurrence_count, 1);
        assert!(!email.required);
        assert_eq!(email.occurrence_rate, 33.33);
        assert!(schema.field("name").expect("name").required);
    }

    #[test]
    fn nested_records_flatten_one_level() {
        let schema = infer_schema(&[doc(json!({
            "address": {"city": "Oslo", "geo": {"lat": 59.9}},
        }))])
        .expect("schema");

        let city = schema.field("address.city").expect("dotted path");
        assert_eq!(city.field_type, "string");
        assert_eq!(city.nested_of.as_deref(), Some("address"));
        assert_eq!(schema.field("address.geo").expect("geo").field_type, "object");
        assert!(schema.field("address.geo.lat").is_none());
        assert!(schema.metadata.has_nested_fields);
        assert!(!schema.metadata.has_array_fields);
    }

    #[test]
    fn arrays_of_records_sample_first_element() {
        let schema = infer_schema(&[doc(json!({
            "items": [{"sku": "A1", "qty": 2}, {"sku": "B2", "price": 9.5}],
            "tags": ["x", "y"],
            "notes": [],
        }))])
        .expect("schema");

        assert_eq!(schema.field("items").expect("items").field_type, "array<object>");
        assert!(schema.field("items[].sku").is_some());
        assert!(schema.field("items[].qty").is_some());
        assert!(schema.field("items[].price").is_none());
        assert_eq!(schema.field("tags").expect("tags").field_type, "array<string>");
        assert_eq!(schema.field("notes").expect("notes").field_type, "array");
        assert!(schema.metadata.has_array_fields);
        assert_eq!(schema.metadata.top_level_fields, vec!["items", "notes", "tags"]);
    }

    #[test]
    fn examples_are_truncated() {
        let long = "x".repeat(80);
        let schema = infer_schema(&[doc(json!({ "body": long }))]).expect("schema");
        let example = &schema.field("body").expect("body").example;
        assert_eq!(example.len(), 53);
        assert!(example.ends_with("..."));
    }

    #[test]
    fn type_names_cover_json_values() {
        assert_eq!(type_name(&json!(null)), "null");
        assert_eq!(type_name(&json!(true)), "boolean");
        assert_eq!(type_name(&json!(-4)), "integer");
        assert_eq!(type_name(&json!(0.5)), "number");
        assert_eq!(type_name(&json!("s")), "string");
        assert_eq!(type_name(&json!([])), "array");
        assert_eq!(type_name(&json!([[1]])), "array<array<integer>>");
        assert_eq!(type_name(&json!({})), "object");
    }

    #[test]
    fn empty_batch_is_explicit() {
        assert_eq!(infer_schema(&[]), Err(EmptySchemaInput));
        assert_eq!(
            schema_report(&[]),
            json!({"message": "No documents available to extract schema"})
        );
    }
}
