//! Blit requests: flag words, raw parameters and their validation into a [`BltOperation`].
//!
//! [`BltOperation`]: validate::BltOperation

/// Blit flag and batch change words.
pub mod flags;
/// Raw request structures.
pub mod params;
/// Validation into resolved operations.
pub mod validate;
