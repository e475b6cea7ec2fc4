//! Multi-call batches that carry unchanged parameters forward.

/// Batch state machine and parameter inheritance.
pub mod coordinator;

pub use coordinator::BatchHandle;
