//! Frame and state-transition counters for a single [`crate::AdaptiveRenderTimer`].

use parking_lot::Mutex;
use std::time::Duration;

/// Point-in-time counters for a render timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderTimerMetrics {
    /// Frames dispatched since the timer started.
    pub frame_count: u64,
    /// Number of state transitions (Idle/Paused/Running) observed.
    pub transition_count: u64,
    /// Cumulative time spent in [`crate::RenderState::Idle`].
    pub time_in_idle: Duration,
    /// Cumulative time spent in [`crate::RenderState::Paused`].
    pub time_in_paused: Duration,
    /// Cumulative time spent in [`crate::RenderState::Running`].
    pub time_in_running: Duration,
}

pub(crate) struct MetricsTracker {
    inner: Mutex<RenderTimerMetrics>,
}

impl MetricsTracker {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(RenderTimerMetrics::default()),
        }
    }

    pub(crate) fn record_frame(&self) {
        self.inner.lock().frame_count += 1;
    }

    pub(crate) fn record_transition(&self) {
        self.inner.lock().transition_count += 1;
    }

    pub(crate) fn add_idle_time(&self, elapsed: Duration) {
        self.inner.lock().time_in_idle += elapsed;
    }

    pub(crate) fn add_paused_time(&self, elapsed: Duration) {
        self.inner.lock().time_in_paused += elapsed;
    }

    pub(crate) fn add_running_time(&self, elapsed: Duration) {
        self.inner.lock().time_in_running += elapsed;
    }

    pub(crate) fn snapshot(&self) -> RenderTimerMetrics {
        *self.inner.lock()
    }
}
