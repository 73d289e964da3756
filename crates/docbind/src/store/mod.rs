//! Document stores and the query engine backing the in-memory one.

pub mod execute;
pub mod memory;

pub use execute::{execute_query, lookup};
pub use memory::{MemoryStore, StoreStats};
