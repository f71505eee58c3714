//! Value types, errors and clocks shared by every other module.

/// Monotonic clocks.
pub mod clock;
/// Bitmap descriptors, frame kinds and identities.
pub mod core;
/// Crate error type.
pub mod error;
