//! In-memory implementation of [`DocumentStore`].
//!
//! Holds documents in ordered maps and pushes a full snapshot to every
//! affected listener after each mutation. It is the reference store for tests
//! and for the CLI, so it also carries fault injection (denied paths, failing
//! or slow point reads, listener errors) and call accounting.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use docbind_api::{
    Document, DocumentRef, DocumentStore, ListenTarget, Listener, ListenerRegistration, Record,
    StoreError, StoreSnapshot, Value,
};

use super::execute::execute_query;

/// Call counters of a [`MemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Listeners opened
    pub listens: u64,
    /// Listener registrations released
    pub unsubscribes: u64,
    /// Point reads served
    pub reads: u64,
}

/// In-memory document store using ordered maps.
///
/// # Example
///
/// ```rust,no_run
/// use docbind::store::MemoryStore;
/// use docbind_api::{record, DocumentRef, Value};
///
/// let store = MemoryStore::new();
/// store.set(&DocumentRef::new("users", "u1"), record([("name", Value::from("Ana"))]));
/// assert_eq!(store.get(&DocumentRef::new("users", "u1")).unwrap()["name"], Value::from("Ana"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Collection path -> document id -> stored fields
    collections: BTreeMap<String, BTreeMap<String, Record>>,
    /// Active listeners by registration id
    listeners: HashMap<u64, MemoryListener>,
    next_listener_id: u64,
    stats: StoreStats,
    /// Collection or document paths whose access is refused
    denied: HashSet<String>,
    /// Document paths whose point reads fail
    failing_reads: HashSet<String>,
    /// Document paths whose point reads are delayed
    read_delays: HashMap<String, Duration>,
}

type EventSender = mpsc::UnboundedSender<Result<StoreSnapshot, StoreError>>;

#[derive(Debug)]
struct MemoryListener {
    target: ListenTarget,
    sender: EventSender,
}

impl MemoryState {
    fn is_denied(&self, target: &ListenTarget) -> Option<String> {
        let collection = target.collection_path();
        if self.denied.contains(collection) {
            return Some(collection.to_string());
        }
        match target {
            ListenTarget::Document(r) if self.denied.contains(r.path()) => {
                Some(r.path().to_string())
            }
            _ => None,
        }
    }

    fn snapshot(&self, target: &ListenTarget) -> Result<StoreSnapshot, StoreError> {
        if let Some(path) = self.is_denied(target) {
            return Err(StoreError::PermissionDenied { path });
        }
        match target {
            ListenTarget::Query(query) => {
                execute_query(self.collections.get(query.path()), query).map(StoreSnapshot::Query)
            }
            ListenTarget::Document(reference) => Ok(StoreSnapshot::Document {
                reference: reference.clone(),
                document: self.document(reference),
            }),
        }
    }

    fn document(&self, reference: &DocumentRef) -> Option<Document> {
        self.collections
            .get(reference.collection())
            .and_then(|docs| docs.get(reference.id()))
            .map(|data| Document::new(reference.clone(), data.clone()))
    }

    /// Push a fresh snapshot to every listener watching `reference`'s collection
    /// or `reference` itself.
    fn notify(&self, reference: &DocumentRef) {
        for (id, listener) in &self.listeners {
            let affected = match &listener.target {
                ListenTarget::Query(q) => q.path() == reference.collection(),
                ListenTarget::Document(r) => r == reference,
            };
            if affected && listener.sender.send(self.snapshot(&listener.target)).is_err() {
                // Stream dropped while the registration is still held
                tracing::debug!("[memory_store] Listener {} on {} has no receiver", id, listener.target);
            }
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create or overwrite a document.
    pub fn set(&self, reference: &DocumentRef, data: Record) {
        let mut state = self.write();
        state
            .collections
            .entry(reference.collection().to_string())
            .or_default()
            .insert(reference.id().to_string(), data);
        state.notify(reference);
    }

    /// Create a document with a generated id.
    pub fn add(&self, collection: &str, data: Record) -> DocumentRef {
        let reference = DocumentRef::new(collection, &uuid::Uuid::new_v4().to_string());
        self.set(&reference, data);
        reference
    }

    /// Merge `fields` into an existing document.
    pub fn update(&self, reference: &DocumentRef, fields: Record) -> Result<(), StoreError> {
        let mut state = self.write();
        let doc = state
            .collections
            .get_mut(reference.collection())
            .and_then(|docs| docs.get_mut(reference.id()))
            .ok_or_else(|| StoreError::NotFound {
                path: reference.path().to_string(),
            })?;
        doc.extend(fields);
        state.notify(reference);
        Ok(())
    }

    /// Delete a document. Returns whether it existed.
    pub fn delete(&self, reference: &DocumentRef) -> bool {
        let mut state = self.write();
        let removed = state
            .collections
            .get_mut(reference.collection())
            .and_then(|docs| docs.remove(reference.id()))
            .is_some();
        if removed {
            state.notify(reference);
        }
        removed
    }

    /// Stored fields of a document, without counting as a point read.
    pub fn get(&self, reference: &DocumentRef) -> Option<Record> {
        self.read().document(reference).map(|d| d.data)
    }

    /// Load `{"<collection>": {"<id>": {<fields>}}}`. Returns the number of
    /// documents written. Reference fields use the `{"$ref": "coll/id"}` form.
    pub fn seed_json(&self, json: serde_json::Value) -> Result<usize, StoreError> {
        let serde_json::Value::Object(collections) = json else {
            return Err(StoreError::Internal {
                message: "seed data must be an object of collections".to_string(),
            });
        };

        let mut written = 0;
        for (collection, documents) in collections {
            let serde_json::Value::Object(documents) = documents else {
                return Err(StoreError::Internal {
                    message: format!("collection '{}' must map ids to documents", collection),
                });
            };
            for (id, fields) in documents {
                let reference = DocumentRef::parse(&format!("{}/{}", collection, id))?;
                let Value::Object(data) = Value::from_json_value(fields) else {
                    return Err(StoreError::Internal {
                        message: format!("document '{}' must be an object", reference),
                    });
                };
                self.set(&reference, data);
                written += 1;
            }
        }
        Ok(written)
    }

    /// Refuse listeners and reads on a collection or document path.
    pub fn deny(&self, path: &str) {
        self.write().denied.insert(path.to_string());
    }

    pub fn allow(&self, path: &str) {
        self.write().denied.remove(path);
    }

    /// Make point reads of `doc_path` fail.
    pub fn fail_reads(&self, doc_path: &str) {
        self.write().failing_reads.insert(doc_path.to_string());
    }

    /// Delay point reads of `doc_path` by `delay`.
    pub fn set_read_delay(&self, doc_path: &str, delay: Duration) {
        self.write()
            .read_delays
            .insert(doc_path.to_string(), delay);
    }

    /// Deliver `error` to every listener watching `collection_path`, as a
    /// dropped connection would.
    pub fn fail_listeners(&self, collection_path: &str, error: StoreError) -> usize {
        let state = self.read();
        state
            .listeners
            .values()
            .filter(|l| l.target.collection_path() == collection_path)
            .filter(|l| l.sender.send(Err(error.clone())).is_ok())
            .count()
    }

    pub fn stats(&self) -> StoreStats {
        self.read().stats
    }

    pub fn listen_count(&self) -> u64 {
        self.stats().listens
    }

    pub fn unsubscribe_count(&self) -> u64 {
        self.stats().unsubscribes
    }

    pub fn read_count(&self) -> u64 {
        self.stats().reads
    }

    /// Listeners currently registered and not yet released.
    pub fn active_listener_count(&self) -> usize {
        self.read().listeners.len()
    }

    fn release(state: &Weak<RwLock<MemoryState>>, id: u64) {
        if let Some(state) = state.upgrade() {
            let mut state = state.write().unwrap_or_else(PoisonError::into_inner);
            state.stats.unsubscribes += 1;
            state.listeners.remove(&id);
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn listen(&self, target: ListenTarget) -> Listener {
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut state = self.write();
        state.stats.listens += 1;
        let id = state.next_listener_id;
        state.next_listener_id += 1;

        let initial = state.snapshot(&target);
        let failed = initial.is_err();
        // The receiver is alive here, the send cannot fail
        let _ = sender.send(initial);
        if failed {
            tracing::debug!("[memory_store] Listener {} on {} rejected", id, target);
        } else {
            state.listeners.insert(id, MemoryListener { target, sender });
        }
        drop(state);

        let weak = Arc::downgrade(&self.state);
        let registration = ListenerRegistration::new(move || Self::release(&weak, id));
        Listener::new(
            Box::pin(UnboundedReceiverStream::new(receiver)),
            registration,
        )
    }

    async fn get_once(&self, reference: &DocumentRef) -> Result<Option<Document>, StoreError> {
        let (delay, outcome) = {
            let mut state = self.write();
            state.stats.reads += 1;
            let delay = state.read_delays.get(reference.path()).copied();
            let target = ListenTarget::Document(reference.clone());
            let outcome = if state.failing_reads.contains(reference.path()) {
                Err(StoreError::ReadFailed {
                    path: reference.path().to_string(),
                    message: "injected read failure".to_string(),
                })
            } else if let Some(path) = state.is_denied(&target) {
                Err(StoreError::PermissionDenied { path })
            } else {
                Ok(state.document(reference))
            };
            (delay, outcome)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}
