//! Process supervision for the image/RSS/FFT/transition worker processes
//! (spec.md §4.H): spawning, stdio transport, heartbeat/restart
//! supervision, and per-worker-kind latency tracking.

mod entrypoint;
mod error;
mod latency;
mod supervisor;
mod transport;

pub use entrypoint::WorkerFactory;
pub use error::Error;
pub use latency::{AlertCallback, LatencyMetrics, LatencyMonitor};
pub use supervisor::ProcessSupervisor;
