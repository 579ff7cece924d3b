//! Management of the single dashboard container.
//!
//! - `lifecycle` drives the container through the runtime
//! - `types` holds state classification and operation reports

mod lifecycle;
mod types;

// Re-export types
pub use types::{InstanceState, InstanceStatus, RunReport};

// Re-export lifecycle
pub use lifecycle::Lifecycle;
