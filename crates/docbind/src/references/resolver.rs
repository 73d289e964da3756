use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use docbind_api::{Document, DocumentRef, DocumentStore, Record, StoreError, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// When false, records are delivered with their reference fields untouched.
    pub enabled: bool,
    /// Upper bound for one point read; exceeding it fails the record.
    pub read_timeout: Option<Duration>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            read_timeout: None,
        }
    }
}

/// Replaces reference-typed fields of snapshot records with the data of the
/// documents they point to.
///
/// - Every reference field of a record is read concurrently; the record is
///   returned only once all reads finished, so partial resolution is never
///   observable.
/// - A target that exists becomes `Object(target fields + its id)`.
/// - A target that does not exist leaves the field's reference untouched.
/// - A failed read fails the whole record. "Missing" and "failed" are
///   deliberately distinct outcomes.
///
/// Only top-level fields are inspected; references nested inside arrays or
/// objects are delivered as-is. Resolution is idempotent since resolved fields
/// no longer hold the `Reference` variant.
pub struct ReferenceResolver {
    store: Arc<dyn DocumentStore>,
    settings: ResolverSettings,
}

impl ReferenceResolver {
    pub fn new(store: Arc<dyn DocumentStore>, settings: ResolverSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Point-read a reference target and shape it as a delivered record.
    pub async fn read_target(&self, reference: &DocumentRef) -> Result<Option<Record>, StoreError> {
        let read = self.store.get_once(reference);
        let document = match self.settings.read_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| StoreError::Timeout {
                    path: reference.path().to_string(),
                })??,
            None => read.await?,
        };
        Ok(document.map(Document::into_record))
    }

    pub async fn resolve_record(&self, mut record: Record) -> Result<Record, StoreError> {
        if !self.settings.enabled {
            return Ok(record);
        }

        let references: Vec<(String, DocumentRef)> = record
            .iter()
            .filter_map(|(field, value)| {
                value
                    .as_reference()
                    .map(|reference| (field.clone(), reference.clone()))
            })
            .collect();
        if references.is_empty() {
            return Ok(record);
        }

        let targets =
            try_join_all(references.iter().map(|(_, reference)| self.read_target(reference)))
                .await?;

        for ((field, reference), target) in references.into_iter().zip(targets) {
            match target {
                Some(data) => {
                    record.insert(field, Value::Object(data));
                }
                None => {
                    tracing::debug!(
                        "[resolver] Target {} of field '{}' does not exist, keeping reference",
                        reference,
                        field
                    );
                }
            }
        }

        Ok(record)
    }

    /// Resolve every record concurrently, preserving input order.
    pub async fn resolve_records(&self, records: Vec<Record>) -> Result<Vec<Record>, StoreError> {
        try_join_all(records.into_iter().map(|record| self.resolve_record(record))).await
    }
}

impl std::fmt::Debug for ReferenceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceResolver")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use docbind_api::record;

    fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.set(
            &DocumentRef::new("users", "u1"),
            record([("name", Value::from("Ana")), ("role", Value::from("Requester"))]),
        );
        store
    }

    #[tokio::test]
    async fn test_existing_target_is_embedded_with_its_id() {
        let store = seeded();
        let resolver = ReferenceResolver::new(store, ResolverSettings::default());

        let input = record([
            ("title", Value::from("Fix sink")),
            ("requester", Value::from(DocumentRef::new("users", "u1"))),
        ]);
        let resolved = resolver.resolve_record(input).await.unwrap();

        let requester = resolved["requester"].as_object().unwrap();
        assert_eq!(requester["id"], Value::from("u1"));
        assert_eq!(requester["name"], Value::from("Ana"));
        assert_eq!(resolved["title"], Value::from("Fix sink"));
    }

    #[tokio::test]
    async fn test_missing_target_keeps_reference() {
        let store = seeded();
        let resolver = ReferenceResolver::new(store, ResolverSettings::default());

        let ghost = DocumentRef::new("users", "ghost");
        let input = record([("requester", Value::from(ghost.clone()))]);
        let resolved = resolver.resolve_record(input).await.unwrap();

        assert_eq!(resolved["requester"], Value::Reference(ghost));
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let store = seeded();
        let resolver = ReferenceResolver::new(store.clone(), ResolverSettings::default());

        let input = record([("requester", Value::from(DocumentRef::new("users", "u1")))]);
        let once = resolver.resolve_record(input).await.unwrap();
        let reads_after_first = store.read_count();
        let twice = resolver.resolve_record(once.clone()).await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(store.read_count(), reads_after_first);
    }

    #[tokio::test]
    async fn test_failed_read_fails_the_record() {
        let store = seeded();
        store.fail_reads("users/u1");
        let resolver = ReferenceResolver::new(store, ResolverSettings::default());

        let input = record([("requester", Value::from(DocumentRef::new("users", "u1")))]);
        let err = resolver.resolve_record(input).await.unwrap_err();
        assert!(matches!(err, StoreError::ReadFailed { .. }));
    }

    #[tokio::test]
    async fn test_slow_read_times_out() {
        let store = seeded();
        store.set_read_delay("users/u1", Duration::from_millis(200));
        let resolver = ReferenceResolver::new(
            store,
            ResolverSettings {
                enabled: true,
                read_timeout: Some(Duration::from_millis(20)),
            },
        );

        let input = record([("requester", Value::from(DocumentRef::new("users", "u1")))]);
        let err = resolver.resolve_record(input).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Timeout {
                path: "users/u1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_disabled_resolver_passes_records_through() {
        let store = seeded();
        let resolver = ReferenceResolver::new(
            store.clone(),
            ResolverSettings {
                enabled: false,
                read_timeout: None,
            },
        );

        let input = record([("requester", Value::from(DocumentRef::new("users", "u1")))]);
        let out = resolver.resolve_record(input.clone()).await.unwrap();
        assert_eq!(out, input);
        assert_eq!(store.read_count(), 0);
    }

    #[tokio::test]
    async fn test_nested_references_are_not_traversed() {
        let store = seeded();
        let resolver = ReferenceResolver::new(store, ResolverSettings::default());

        let nested = Value::Array(vec![Value::from(DocumentRef::new("users", "u1"))]);
        let input = record([("applicants", nested.clone())]);
        let out = resolver.resolve_record(input).await.unwrap();
        assert_eq!(out["applicants"], nested);
    }
}
