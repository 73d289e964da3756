//! Consumer entry points.
//!
//! A [`StoreContext`] carries the store handle explicitly instead of reading a
//! process-wide global, so several stores (one per test, say) can coexist.

use std::sync::Arc;

use docbind_api::DocumentStore;

use crate::binding::Binding;
use crate::config::BindingConfig;
use crate::query::{CollectionOptions, CollectionQuery, DocumentQuery};
use crate::references::ReferenceResolver;

/// Live `{ data: Vec<Record>, loading }` view of a collection query.
pub type CollectionBinding = Binding<CollectionQuery>;

/// Live `{ data: Option<Record>, loading }` view of one document.
pub type DocBinding = Binding<DocumentQuery>;

#[derive(Clone)]
pub struct StoreContext {
    store: Arc<dyn DocumentStore>,
    resolver: Arc<ReferenceResolver>,
}

impl StoreContext {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, &BindingConfig::default())
    }

    pub fn with_config(store: Arc<dyn DocumentStore>, config: &BindingConfig) -> Self {
        let resolver = ReferenceResolver::new(store.clone(), config.resolver_settings());
        Self {
            store,
            resolver: Arc::new(resolver),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn resolver(&self) -> &Arc<ReferenceResolver> {
        &self.resolver
    }

    /// Subscribe to `path` narrowed by `options`.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use docbind::{CollectionOptions, MemoryStore, StoreContext};
    /// use docbind_api::{Direction, FilterOp};
    /// use std::sync::Arc;
    ///
    /// # async fn demo() {
    /// let ctx = StoreContext::new(Arc::new(MemoryStore::new()));
    /// let options = CollectionOptions::new()
    ///     .where_field("category", FilterOp::Eq, "Cleaning")
    ///     .order_by("budget", Direction::Desc)
    ///     .limit(10);
    /// let tasks = ctx.use_collection("tasks", Some(options));
    /// let envelope = tasks.watch().settled().await.unwrap();
    /// println!("{} tasks", envelope.data.len());
    /// # }
    /// ```
    pub fn use_collection(
        &self,
        path: impl Into<String>,
        options: Option<CollectionOptions>,
    ) -> CollectionBinding {
        Binding::start(self, CollectionQuery::new(path, options))
    }

    /// Subscribe to the document `id` of `path`. An empty `id` opens nothing
    /// and settles immediately on `None`.
    pub fn use_doc(&self, path: impl Into<String>, id: impl Into<String>) -> DocBinding {
        Binding::start(self, DocumentQuery::new(path, id))
    }
}

impl std::fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreContext")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl Binding<CollectionQuery> {
    /// Re-invoke with new arguments; see [`Binding::update`].
    pub fn set_query(
        &mut self,
        path: impl Into<String>,
        options: Option<CollectionOptions>,
    ) -> bool {
        self.update(CollectionQuery::new(path, options))
    }
}

impl Binding<DocumentQuery> {
    pub fn set_doc(&mut self, path: impl Into<String>, id: impl Into<String>) -> bool {
        self.update(DocumentQuery::new(path, id))
    }
}
