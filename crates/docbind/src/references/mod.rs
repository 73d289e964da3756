pub mod resolver;

pub use resolver::{ReferenceResolver, ResolverSettings};
