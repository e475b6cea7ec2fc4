//! Reference-counted registry of client buffer mappings.

/// Mapping handles, leases and the registry itself.
pub mod map;

pub use map::{MapHandle, MapLease, MapRegistry};
