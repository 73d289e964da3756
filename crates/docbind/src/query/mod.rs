//! Query Builder: declarative collection options → store-native [`Query`].
//!
//! [`Query`]: docbind_api::Query

mod options;

pub use options::{build_query, CollectionOptions, CollectionQuery, DocumentQuery};
