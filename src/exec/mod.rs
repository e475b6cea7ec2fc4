//! Inline and pooled execution of validated operations.

/// Exactly-once completion delivery.
pub mod completion;
/// Inline and pooled job execution.
pub mod dispatcher;
