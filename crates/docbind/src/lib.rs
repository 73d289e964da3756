//! Reactive bindings over a real-time document store.
//!
//! Consumers declare a collection query or a single document through a
//! [`StoreContext`] and get back a [`Binding`] that keeps a
//! `{ data, loading }` envelope current, with reference fields replaced by the
//! documents they point to.

pub mod binding;
pub mod config;
pub mod context;
pub mod logging;
pub mod query;
pub mod references;
pub mod store;

pub use binding::{Binding, BindingClosed, BindingTarget, LiveReceiver, Phase, ResultEnvelope};
pub use config::{BindingConfig, DocbindConfig, LoggingConfig};
pub use context::{CollectionBinding, DocBinding, StoreContext};
pub use query::{build_query, CollectionOptions, CollectionQuery, DocumentQuery};
pub use references::{ReferenceResolver, ResolverSettings};
pub use store::{MemoryStore, StoreStats};
