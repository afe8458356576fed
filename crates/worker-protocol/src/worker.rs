//! Worker identity and lifecycle state (spec.md §3 "Worker identity" / "Worker state").

use serde::{Deserialize, Serialize};

/// The closed set of worker process kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    /// Decodes and prescales images.
    Image,
    /// Fetches and parses RSS/Atom feeds for slideshow images.
    Rss,
    /// Runs FFT-based audio visualisation analysis.
    Fft,
    /// Precomputes CPU-side transition geometry.
    Transition,
}

impl WorkerKind {
    /// All worker kinds, in the order the supervisor starts them.
    pub const ALL: [WorkerKind; 4] = [
        WorkerKind::Image,
        WorkerKind::Rss,
        WorkerKind::Fft,
        WorkerKind::Transition,
    ];

    /// Short lowercase name used in log lines and shared-memory handle names.
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerKind::Image => "image",
            WorkerKind::Rss => "rss",
            WorkerKind::Fft => "fft",
            WorkerKind::Transition => "transition",
        }
    }

    /// Per-worker payload size cap in bytes, per spec.md §3.
    pub fn max_payload_bytes(self) -> usize {
        match self {
            WorkerKind::Image => 50 * 1024 * 1024,
            WorkerKind::Transition => 1024 * 1024,
            WorkerKind::Rss => 1024 * 1024,
            WorkerKind::Fft => 64 * 1024,
        }
    }
}

/// Worker process lifecycle state. `Starting`/`Stopping`/`Restarting` are
/// transient and always progress to a stable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// No process running.
    Stopped,
    /// Process spawned, awaiting `WorkerReady`/first `HeartbeatAck`.
    Starting,
    /// Process healthy and processing messages.
    Running,
    /// Graceful shutdown requested.
    Stopping,
    /// Restart budget exhausted or unrecoverable fault observed.
    Error,
    /// A restart is in flight.
    Restarting,
}

impl WorkerState {
    /// Whether this state is one of the transient in-between states.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            WorkerState::Starting | WorkerState::Stopping | WorkerState::Restarting
        )
    }
}
