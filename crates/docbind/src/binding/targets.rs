use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use docbind_api::{Document, ListenTarget, Record, StoreError, StoreSnapshot};

use crate::query::{CollectionQuery, DocumentQuery};
use crate::references::ReferenceResolver;

/// Something a [`Binding`](super::Binding) can subscribe to.
#[async_trait]
pub trait BindingTarget: Clone + fmt::Debug + Send + Sync + 'static {
    /// Published data shape. `Default` is the value shown before the first
    /// snapshot and for a target that opens no listener.
    type Data: Clone + Default + fmt::Debug + Send + Sync + 'static;

    /// Listener to open, or `None` when the target is a terminal no-op.
    fn listen_target(&self) -> Option<ListenTarget>;

    /// Subscription identity. Two targets with the same identity share a
    /// subscription across re-invocations.
    fn identity(&self) -> String;

    /// Turn one raw snapshot into published data.
    async fn materialize(
        &self,
        snapshot: StoreSnapshot,
        resolver: &ReferenceResolver,
    ) -> Result<Self::Data, StoreError>;
}

fn serialized_identity<T: Serialize + fmt::Debug>(target: &T) -> String {
    serde_json::to_string(target).unwrap_or_else(|_| format!("{:?}", target))
}

fn mismatched(target: &impl fmt::Display, snapshot: &StoreSnapshot) -> StoreError {
    let kind = match snapshot {
        StoreSnapshot::Query(_) => "query",
        StoreSnapshot::Document { .. } => "document",
    };
    StoreError::Internal {
        message: format!("{} snapshot delivered to {}", kind, target),
    }
}

#[async_trait]
impl BindingTarget for CollectionQuery {
    type Data = Vec<Record>;

    fn listen_target(&self) -> Option<ListenTarget> {
        Some(ListenTarget::Query(self.query()))
    }

    fn identity(&self) -> String {
        serialized_identity(self)
    }

    async fn materialize(
        &self,
        snapshot: StoreSnapshot,
        resolver: &ReferenceResolver,
    ) -> Result<Vec<Record>, StoreError> {
        match snapshot {
            StoreSnapshot::Query(documents) => {
                let records = documents.into_iter().map(Document::into_record).collect();
                resolver.resolve_records(records).await
            }
            other => Err(mismatched(&self.query(), &other)),
        }
    }
}

#[async_trait]
impl BindingTarget for DocumentQuery {
    type Data = Option<Record>;

    fn listen_target(&self) -> Option<ListenTarget> {
        self.reference().map(ListenTarget::Document)
    }

    fn identity(&self) -> String {
        serialized_identity(self)
    }

    async fn materialize(
        &self,
        snapshot: StoreSnapshot,
        resolver: &ReferenceResolver,
    ) -> Result<Option<Record>, StoreError> {
        match snapshot {
            StoreSnapshot::Document { document, .. } => match document {
                Some(document) => resolver
                    .resolve_record(document.into_record())
                    .await
                    .map(Some),
                None => Ok(None),
            },
            other => Err(mismatched(&format!("{}/{}", self.path, self.id), &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::CollectionOptions;
    use crate::references::ResolverSettings;
    use crate::store::MemoryStore;
    use docbind_api::{record, Direction, DocumentRef, Value};
    use std::sync::Arc;

    #[test]
    fn test_identity_is_structural() {
        let a = CollectionQuery::new(
            "tasks",
            Some(CollectionOptions::new().order_by("budget", Direction::Desc)),
        );
        let b = CollectionQuery::new(
            "tasks",
            Some(CollectionOptions::new().order_by("budget", Direction::Desc)),
        );
        let c = CollectionQuery::new(
            "tasks",
            Some(CollectionOptions::new().order_by("budget", Direction::Asc)),
        );
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), c.identity());

        assert_eq!(
            CollectionQuery::new("tasks", None).identity(),
            CollectionQuery::new("tasks", Some(CollectionOptions::default())).identity()
        );
    }

    #[test]
    fn test_empty_document_id_opens_nothing() {
        assert!(DocumentQuery::new("tasks", "").listen_target().is_none());
        assert!(DocumentQuery::new("tasks", "t1").listen_target().is_some());
    }

    #[tokio::test]
    async fn test_document_materialize_resolves_references() {
        let store = Arc::new(MemoryStore::new());
        store.set(&DocumentRef::new("users", "u1"), record([("name", "Ana")]));
        let resolver = ReferenceResolver::new(store, ResolverSettings::default());

        let reference = DocumentRef::new("tasks", "t1");
        let snapshot = StoreSnapshot::Document {
            reference: reference.clone(),
            document: Some(Document::new(
                reference,
                record([("requester", DocumentRef::new("users", "u1"))]),
            )),
        };
        let data = DocumentQuery::new("tasks", "t1")
            .materialize(snapshot, &resolver)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(data["id"], Value::from("t1"));
        assert_eq!(data["requester"].as_object().unwrap()["name"], Value::from("Ana"));
    }

    #[tokio::test]
    async fn test_mismatched_snapshot_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        let resolver = ReferenceResolver::new(store, ResolverSettings::default());
        let err = CollectionQuery::new("tasks", None)
            .materialize(
                StoreSnapshot::Document {
                    reference: DocumentRef::new("tasks", "t1"),
                    document: None,
                },
                &resolver,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Internal { .. }));
    }
}
