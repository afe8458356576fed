//! Per-worker-kind tuning configuration (spec.md §3 "WorkerTuningConfig").

use crate::worker::WorkerKind;
use std::time::Duration;

/// Backpressure handling policy for a full bounded worker queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Block the sender until space is available.
    Block,
    /// Drop the oldest queued message to make room.
    DropOldest,
    /// Reject the new message, keeping the queue as-is.
    DropNewest,
}

/// Tuning configuration for a single worker kind.
#[derive(Debug, Clone, Copy)]
pub struct WorkerTuningConfig {
    /// Capacity of the request queue toward the worker.
    pub request_queue_size: usize,
    /// Capacity of the response queue from the worker.
    pub response_queue_size: usize,
    /// Policy applied when a queue is full.
    pub backpressure_policy: BackpressurePolicy,
    /// How long the worker's `get(timeout)` blocks waiting for a request.
    pub poll_timeout: Duration,
    /// Interval between supervisor heartbeat probes.
    pub heartbeat_interval: Duration,
    /// How long to wait for a `HeartbeatAck` before counting it missed.
    pub heartbeat_timeout: Duration,
    /// Maximum restarts allowed within the rolling restart window.
    pub max_restart_attempts: u32,
    /// Base restart backoff delay.
    pub restart_backoff_base: Duration,
    /// Maximum restart backoff delay.
    pub restart_backoff_max: Duration,
    /// Target response latency.
    pub target_latency: Duration,
    /// Maximum acceptable response latency before alerting.
    pub max_latency: Duration,
}

/// Missed-heartbeat count that triggers a restart, per spec.md §3.
pub const MISSED_HEARTBEAT_RESTART_THRESHOLD: u32 = 5;
/// Rolling window over which restarts are budgeted, per spec.md §3.
pub const RESTART_WINDOW: Duration = Duration::from_secs(300);
/// Maximum restarts allowed within [`RESTART_WINDOW`].
pub const MAX_RESTARTS_PER_WINDOW: u32 = 5;
/// Heartbeat cadence used by the supervisor's own probe loop.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);
/// How long a worker may stay busy before it is considered hung.
pub const HUNG_BUSY_THRESHOLD: Duration = Duration::from_secs(30);

/// Returns the canonical tuning configuration for a worker kind
/// (spec.md §3's canonical defaults table).
pub fn default_tuning(kind: WorkerKind) -> WorkerTuningConfig {
    match kind {
        WorkerKind::Image => WorkerTuningConfig {
            request_queue_size: 32,
            response_queue_size: 16,
            backpressure_policy: BackpressurePolicy::DropOldest,
            poll_timeout: Duration::from_millis(100),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            heartbeat_timeout: Duration::from_secs(15),
            max_restart_attempts: MAX_RESTARTS_PER_WINDOW,
            restart_backoff_base: Duration::from_secs(1),
            restart_backoff_max: Duration::from_secs(30),
            target_latency: Duration::from_millis(100),
            max_latency: Duration::from_millis(500),
        },
        WorkerKind::Rss => WorkerTuningConfig {
            request_queue_size: 16,
            response_queue_size: 32,
            backpressure_policy: BackpressurePolicy::DropOldest,
            poll_timeout: Duration::from_millis(100),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            heartbeat_timeout: Duration::from_secs(15),
            max_restart_attempts: MAX_RESTARTS_PER_WINDOW,
            restart_backoff_base: Duration::from_secs(1),
            restart_backoff_max: Duration::from_secs(30),
            target_latency: Duration::from_secs(1),
            max_latency: Duration::from_secs(10),
        },
        WorkerKind::Fft => WorkerTuningConfig {
            request_queue_size: 128,
            response_queue_size: 64,
            backpressure_policy: BackpressurePolicy::DropOldest,
            poll_timeout: Duration::from_millis(5),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            heartbeat_timeout: Duration::from_secs(15),
            max_restart_attempts: MAX_RESTARTS_PER_WINDOW,
            restart_backoff_base: Duration::from_secs(1),
            restart_backoff_max: Duration::from_secs(30),
            target_latency: Duration::from_millis(16),
            max_latency: Duration::from_millis(33),
        },
        WorkerKind::Transition => WorkerTuningConfig {
            request_queue_size: 8,
            response_queue_size: 8,
            backpressure_policy: BackpressurePolicy::DropNewest,
            poll_timeout: Duration::from_millis(100),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            heartbeat_timeout: Duration::from_secs(15),
            max_restart_attempts: MAX_RESTARTS_PER_WINDOW,
            restart_backoff_base: Duration::from_secs(1),
            restart_backoff_max: Duration::from_secs(30),
            target_latency: Duration::from_millis(200),
            max_latency: Duration::from_secs(1),
        },
    }
}

/// Computes the restart backoff for the given 0-based attempt count:
/// `min(base * 2^min(attempt, 5), max)`, per spec.md §4.H step 3.
pub fn restart_backoff(config: &WorkerTuningConfig, attempt: u32) -> Duration {
    let exp = attempt.min(5);
    let scaled = config.restart_backoff_base.saturating_mul(1u32 << exp);
    scaled.min(config.restart_backoff_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn canonical_defaults_match_spec() {
        let image = default_tuning(WorkerKind::Image);
        assert_eq!(image.request_queue_size, 32);
        assert_eq!(image.response_queue_size, 16);
        assert_eq!(image.backpressure_policy, BackpressurePolicy::DropOldest);

        let transition = default_tuning(WorkerKind::Transition);
        assert_eq!(transition.backpressure_policy, BackpressurePolicy::DropNewest);
        assert_eq!(transition.request_queue_size, 8);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = default_tuning(WorkerKind::Image);
        assert_eq!(restart_backoff(&config, 0), Duration::from_secs(1));
        assert_eq!(restart_backoff(&config, 1), Duration::from_secs(2));
        assert_eq!(restart_backoff(&config, 4), Duration::from_secs(16));
        // attempt beyond 5 caps at 2^5 * base, then clamps to restart_backoff_max.
        assert_eq!(restart_backoff(&config, 10), Duration::from_secs(30));
    }
}
