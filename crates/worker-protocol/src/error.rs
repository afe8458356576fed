//! Errors for the worker wire protocol.

/// Errors surfaced while building or validating protocol envelopes.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A request's payload exceeded the per-worker-kind size cap.
    #[error("payload of {actual} bytes exceeds the {limit} byte cap for {kind:?}")]
    PayloadTooLarge {
        /// The worker kind the cap applies to.
        kind: crate::worker::WorkerKind,
        /// The payload size actually observed.
        actual: usize,
        /// The configured cap.
        limit: usize,
    },

    /// A shared-memory handle failed validation on read-back.
    #[error("stale shared-memory handle {handle:?}: {reason}")]
    StaleHandle {
        /// The handle name that failed validation.
        handle: String,
        /// Human-readable reason (invalid flag unset, or generation mismatch).
        reason: &'static str,
    },

    /// A required field was absent from a dynamic payload map.
    #[error("payload missing required field {0:?}")]
    MissingField(&'static str),
}
