//! Errors for the process supervisor.

use worker_protocol::WorkerKind;

/// Errors surfaced by [`crate::ProcessSupervisor`] operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// `start(kind)` was called without a prior `register_worker_factory`.
    #[error("no factory registered for worker kind {0:?}")]
    NoFactoryRegistered(WorkerKind),

    /// The worker process failed to spawn.
    #[error("failed to spawn {kind:?} worker process")]
    SpawnFailed {
        /// Which worker kind failed to spawn.
        kind: WorkerKind,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// `send_message`/`start` was called for a kind with no running
    /// worker and no factory-driven auto-start in progress.
    #[error("worker {0:?} is not running")]
    NotRunning(WorkerKind),

    /// A request was rejected by the worker's
    /// [`worker_protocol::BackpressurePolicy::DropNewest`] policy, or its
    /// queue is full under `Block` and the caller asked not to block.
    #[error("request queue for {0:?} is full")]
    QueueFull(WorkerKind),

    /// The message exceeded the worker kind's payload size cap.
    #[error(transparent)]
    PayloadTooLarge(#[from] worker_protocol::Error),

    /// The restart budget for this worker was exhausted within the
    /// rolling window; the worker is left in
    /// [`worker_protocol::WorkerState::Error`].
    #[error("worker {0:?} exceeded its restart budget and is now in Error state")]
    RestartBudgetExceeded(WorkerKind),
}
