use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use tokio_stream::Stream;

use crate::{Document, DocumentRef, Query, StoreError};

/// What a listener watches: a composed collection query or one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ListenTarget {
    Query(Query),
    Document(DocumentRef),
}

impl ListenTarget {
    /// Path of the watched collection (for a document, its parent collection).
    pub fn collection_path(&self) -> &str {
        match self {
            ListenTarget::Query(q) => q.path(),
            ListenTarget::Document(r) => r.collection(),
        }
    }
}

impl fmt::Display for ListenTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenTarget::Query(q) => write!(f, "query {}", q),
            ListenTarget::Document(r) => write!(f, "doc {}", r),
        }
    }
}

/// Full state pushed by the store each time the watched data changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreSnapshot {
    /// Matching documents, in store-determined order.
    Query(Vec<Document>),
    /// The watched document, `None` when it does not exist.
    Document {
        reference: DocumentRef,
        document: Option<Document>,
    },
}

/// Owned one-shot closure that releases a store listener.
pub type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

/// Stream of snapshot events of one listener.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StoreSnapshot, StoreError>> + Send>>;

/// Release handle of one store listener.
///
/// `remove()` runs the wrapped unsubscribe closure at most once, no matter how
/// often or from how many places it is called. Dropping the registration
/// removes it as well.
pub struct ListenerRegistration {
    unsubscribe: Mutex<Option<Unsubscribe>>,
}

impl ListenerRegistration {
    pub fn new(unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            unsubscribe: Mutex::new(Some(Box::new(unsubscribe))),
        }
    }

    /// Registration with nothing to release.
    pub fn noop() -> Self {
        Self {
            unsubscribe: Mutex::new(None),
        }
    }

    /// Release the listener. Returns `true` if this call performed the release.
    pub fn remove(&self) -> bool {
        // Take under the lock, call outside it
        let unsubscribe = self
            .unsubscribe
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match unsubscribe {
            Some(f) => {
                f();
                true
            }
            None => false,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.unsubscribe
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.remove();
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("removed", &self.is_removed())
            .finish()
    }
}

/// An open listener: its event stream plus the handle that releases it.
pub struct Listener {
    pub events: EventStream,
    pub registration: ListenerRegistration,
}

impl Listener {
    pub fn new(events: EventStream, registration: ListenerRegistration) -> Self {
        Self {
            events,
            registration,
        }
    }

    pub fn into_parts(self) -> (EventStream, ListenerRegistration) {
        (self.events, self.registration)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("registration", &self.registration)
            .finish_non_exhaustive()
    }
}

/// Real-time document store consumed by the binding layer.
///
/// # Contract
///
/// - `listen` opens a live listener synchronously. On success the stream
///   yields at least one initial snapshot; failures (permission denied,
///   rejected query, network loss) are yielded as `Err` items.
/// - Removing the returned registration releases every resource held for the
///   listener. The store never expects more than one release per listener.
/// - `get_once` is a point read; `Ok(None)` means the document does not exist.
///
/// Implementations are shared read-only by every binding, so all methods take
/// `&self`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn listen(&self, target: ListenTarget) -> Listener;

    async fn get_once(&self, reference: &DocumentRef) -> Result<Option<Document>, StoreError>;
}
