//! Shared main-loop skeleton for the image/RSS/FFT/transition worker
//! binaries (spec.md §4.I).

mod error;
mod handler;
mod runtime;

pub use error::HandlerError;
pub use handler::{HandledResponse, WorkerHandler};
pub use runtime::{process_message, run_loop, run_worker_main, LoopAction, WorkerStats, POLL_TIMEOUT};
