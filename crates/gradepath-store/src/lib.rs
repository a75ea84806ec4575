//! gradepath-store — persistence collaborators.
//!
//! Implements the `GradeStore` trait in memory, with optimistic version
//! checks on enrollments and explicit cascading deletes, plus a
//! notification sink that records events.

pub mod memory;
pub mod notifier;

pub use memory::{MemoryStore, Removed};
pub use notifier::RecordingNotifier;
