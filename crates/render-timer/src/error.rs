//! Errors for the render timer crate.

/// Errors surfaced by [`crate::AdaptiveRenderTimer`] and
/// [`crate::TransitionBarrier`] operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The timer's background task could not be spawned.
    #[error("failed to spawn render timer task")]
    SpawnFailed(#[from] thread_manager::Error),

    /// `ring_channel` rejected the configured queue capacity.
    #[error(transparent)]
    InvalidQueueCapacity(#[from] ring_channel::Error),
}
