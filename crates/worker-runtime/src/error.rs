//! Errors surfaced by a worker's own main loop, as opposed to
//! [`worker_protocol::Error`] which covers wire-format violations.

/// A handler-raised failure, turned into an `Error` response and sent back
/// instead of propagating and killing the process.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    /// Human-readable failure detail, sent back verbatim.
    pub message: String,
    /// Numeric error code understood by the supervisor/UI layer.
    pub code: i32,
}

impl HandlerError {
    /// Builds a handler error with the given message and code.
    pub fn new(message: impl Into<String>, code: i32) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }
}
