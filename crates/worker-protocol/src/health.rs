//! Per-worker health status (spec.md §3 "HealthStatus").

use crate::worker::{WorkerKind, WorkerState};
use std::collections::HashMap;
use std::time::Instant;

/// Observed health of one worker process.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Which worker kind this status describes.
    pub kind: WorkerKind,
    /// Current lifecycle state.
    pub state: WorkerState,
    /// OS process id, if currently running.
    pub pid: Option<u32>,
    /// Last time a `HeartbeatAck` was observed.
    pub last_heartbeat: Option<Instant>,
    /// Consecutive heartbeats missed since the last acknowledgement.
    pub missed_heartbeats: u32,
    /// Restarts performed within the current rolling window.
    pub restart_count: u32,
    /// Last time a restart was performed.
    pub last_restart: Option<Instant>,
    /// Last error message observed, if any.
    pub last_error: Option<String>,
    /// Free-form numeric metrics reported by the worker (e.g. uptime_s).
    pub metrics: HashMap<String, f64>,
    /// Whether the worker is currently inside a long-running handler.
    pub busy: bool,
    /// When the worker entered the busy state, if `busy`.
    pub busy_since: Option<Instant>,
}

impl HealthStatus {
    /// Creates a fresh, stopped health record for `kind`.
    pub fn new(kind: WorkerKind) -> Self {
        Self {
            kind,
            state: WorkerState::Stopped,
            pid: None,
            last_heartbeat: None,
            missed_heartbeats: 0,
            restart_count: 0,
            last_restart: None,
            last_error: None,
            metrics: HashMap::new(),
            busy: false,
            busy_since: None,
        }
    }

    /// Whether this worker is immediately healthy, i.e. currently running
    /// and not past the missed-heartbeat restart threshold.
    pub fn is_healthy(&self) -> bool {
        self.state == WorkerState::Running
            && self.missed_heartbeats < crate::tuning::MISSED_HEARTBEAT_RESTART_THRESHOLD
    }

    /// Whether a busy worker has been busy long enough to be considered
    /// hung (spec.md §3 invariant ii).
    pub fn is_hung(&self, now: Instant) -> bool {
        self.busy
            && self
                .busy_since
                .is_some_and(|since| now.duration_since(since) > crate::tuning::HUNG_BUSY_THRESHOLD)
    }

    /// Records a `HeartbeatAck`, resetting the missed-heartbeat counter.
    pub fn record_heartbeat_ack(&mut self, now: Instant) {
        self.last_heartbeat = Some(now);
        self.missed_heartbeats = 0;
    }

    /// Records a missed heartbeat, unless the worker is busy and not yet
    /// hung (spec.md §3 invariant ii).
    pub fn record_missed_heartbeat(&mut self, now: Instant) {
        if self.busy && !self.is_hung(now) {
            return;
        }
        self.missed_heartbeats += 1;
    }

    /// Marks the worker as entering a long-running handler.
    pub fn mark_busy(&mut self, now: Instant) {
        self.busy = true;
        self.busy_since = Some(now);
    }

    /// Marks the worker as having exited a long-running handler.
    pub fn mark_idle(&mut self) {
        self.busy = false;
        self.busy_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn recovers_immediately_after_ack_below_threshold() {
        let mut h = HealthStatus::new(WorkerKind::Fft);
        h.state = WorkerState::Running;
        let now = Instant::now();
        h.record_missed_heartbeat(now);
        h.record_missed_heartbeat(now);
        assert!(h.missed_heartbeats < crate::tuning::MISSED_HEARTBEAT_RESTART_THRESHOLD);
        h.record_heartbeat_ack(now);
        assert!(h.is_healthy());
    }

    #[test]
    fn busy_worker_is_exempt_until_hung() {
        let mut h = HealthStatus::new(WorkerKind::Image);
        h.state = WorkerState::Running;
        let t0 = Instant::now();
        h.mark_busy(t0);
        h.record_missed_heartbeat(t0);
        assert_eq!(h.missed_heartbeats, 0, "busy worker exempt from missed count");

        let past_hung_threshold = t0 + Duration::from_secs(31);
        h.record_missed_heartbeat(past_hung_threshold);
        assert_eq!(h.missed_heartbeats, 1, "hung busy worker accrues misses");
    }
}
