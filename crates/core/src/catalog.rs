use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::CollectionNotFound;

/// Collection names as reported by the database for the current request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionCatalog {
    names: BTreeSet<String>,
}

impl CollectionCatalog {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: names.into_iter().map(Into::into).collect() }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }

    pub fn display_list(&self) -> String {
        self.to_vec().join(", ")
    }

    fn find_case_insensitive(&self, name: &str) -> Option<&str> {
        self.names().find(|candidate| candidate.eq_ignore_ascii_case(name))
    }
}

/// Collection names are conventionally plural: append `s` unless already present.
/// Idempotent, and blank input stays blank.
pub fn pluralize_collection(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.ends_with('s') || trimmed.ends_with('S') {
        return trimmed.to_string();
    }
    format!("{trimmed}s")
}

pub fn resolve_collection(
    candidate: Option<&str>,
    catalog: &CollectionCatalog,
) -> Result<String, CollectionNotFound> {
    let normalized = candidate.map(pluralize_collection).filter(|name| !name.is_empty());
    let Some(name) = normalized else {
        return Err(CollectionNotFound { requested: None, available: catalog.to_vec() });
    };

    if catalog.contains(&name) {
        return Ok(name);
    }
    if let Some(existing) = catalog.find_case_insensitive(&name) {
        return Ok(existing.to_string());
    }

    Err(CollectionNotFound { requested: Some(name), available: catalog.to_vec() })
}

#[cfg(test)]
mod tests {
    use super::{pluralize_collection, resolve_collection, CollectionCatalog};

    fn catalog() -> CollectionCatalog {
        CollectionCatalog::new(["users", "orders", "userLogins"])
    }

    #[test]
    fn pluralization_is_idempotent() {
        for raw in ["order", "orders", "userLogin", " product ", "", "status"] {
            let once = pluralize_collection(raw);
            assert_eq!(pluralize_collection(&once), once, "not idempotent for {raw:?}");
        }
        assert_eq!(pluralize_collection("order"), "orders");
        assert_eq!(pluralize_collection("orders"), "orders");
    }

    #[test]
    fn singular_candidate_resolves_to_plural_collection() {
        assert_eq!(resolve_collection(Some("order"), &catalog()).as_deref(), Ok("orders"));
        assert_eq!(resolve_collection(Some("userLogin"), &catalog()).as_deref(), Ok("userLogins"));
    }

    #[test]
    fn case_mismatch_resolves_to_catalog_spelling() {
        assert_eq!(resolve_collection(Some("Users"), &catalog()).as_deref(), Ok("users"));
    }

    #[test]
    fn missing_collection_carries_catalog() {
        let error = resolve_collection(Some("invoice"), &catalog()).expect_err("should not resolve");
        assert_eq!(error.requested.as_deref(), Some("invoices"));
        assert_eq!(error.available, vec!["orders", "userLogins", "users"]);
    }

    #[test]
    fn blank_candidate_is_not_found() {
        let error = resolve_collection(Some("  "), &catalog()).expect_err("blank should fail");
        assert!(error.requested.is_none());
        assert!(resolve_collection(None, &catalog()).is_err());
    }
}
