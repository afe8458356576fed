//! Errors for the resource manager.

/// Errors surfaced by [`crate::ResourceManager`] operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// `register` was called with no cleanup capability at all (no
    /// handler supplied and the resource exposes no self-cleanup).
    #[error("cannot register a resource with no cleanup handler")]
    InvalidArgument,

    /// The registry has already started (or finished) `cleanup_all`.
    #[error("resource manager is shutting down; registration refused")]
    ShuttingDown,

    /// `unregister(force = false)` was called on a resource with
    /// outstanding references.
    #[error("resource {0:?} is still in use (reference count > 1)")]
    InUse(crate::ResourceId),

    /// No resource is registered under this id.
    #[error("no resource registered with id {0:?}")]
    NotFound(crate::ResourceId),
}
