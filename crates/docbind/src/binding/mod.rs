//! Live bindings: one store listener per mounted consumer, republished as a
//! [`ResultEnvelope`] after reference resolution.

mod manager;
mod state;
mod targets;

pub use manager::Binding;
pub use state::{BindingClosed, LiveReceiver, Phase, ResultEnvelope};
pub use targets::BindingTarget;
