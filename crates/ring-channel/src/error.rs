//! Errors for the ring-channel primitives.

/// Errors that can occur when constructing a ring-buffer-backed primitive.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Capacity must be greater than one: one slot is reserved to
    /// disambiguate empty from full, so a capacity of 1 could never hold
    /// anything.
    #[error("ring buffer capacity must be > 1, got {0}")]
    InvalidCapacity(usize),
}
