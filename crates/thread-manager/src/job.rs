//! Task identity and the cooperative cancellation flag a submitted job can
//! observe (spec.md §4.D).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a task submitted to a pool, valid for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Shared flag a running job can poll to notice a cancellation request.
/// Rust closures cannot be pre-empted mid-execution, so cancellation is
/// cooperative: a job that never checks [`CancelFlag::is_cancelled`] simply
/// runs to completion.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Returns whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// A unit of work submitted to a pool.
pub type Job = Box<dyn FnOnce(&CancelFlag) + Send + 'static>;
