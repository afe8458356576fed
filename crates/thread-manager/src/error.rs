//! Errors for the thread manager.

/// Errors surfaced by [`crate::ThreadManager`] operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Failed to spawn a pool worker or timer thread.
    #[error("failed to spawn thread {thread_name:?}")]
    ThreadSpawnFailed {
        /// Name given to the thread.
        thread_name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A task was submitted to a pool that has already been shut down.
    #[error("pool {0:?} is shut down; task rejected")]
    PoolShutDown(crate::pool::PoolKind),

    /// A task was submitted to a pool kind the manager was never
    /// constructed with.
    #[error("pool {0:?} was not configured on this thread manager")]
    NoSuchPool(crate::pool::PoolKind),

    /// `shutdown(timeout)` did not observe every worker exit in time.
    #[error("shutdown timed out waiting for {remaining} worker(s) across all pools")]
    ShutdownTimedOut {
        /// Worker threads still outstanding when the timeout elapsed.
        remaining: usize,
    },

    /// A job dispatched via `run_in_main_thread` panicked, or the UI thread
    /// dropped its queue before running the job.
    #[error("job submitted to the main thread panicked or was never run")]
    MainThreadJobPanicked,
}
