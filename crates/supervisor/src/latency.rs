//! Per-worker-kind latency tracking and threshold alerting, supplementing
//! the supervisor beyond what spec.md's distillation carried over (see
//! SPEC_FULL.md §10; grounded on the original implementation's
//! `LatencyMonitor`).

use parking_lot::Mutex;
use std::collections::HashMap;
use worker_protocol::{default_tuning, WorkerKind};

/// Running min/max/avg latency for one worker kind.
#[derive(Debug, Clone, Copy)]
pub struct LatencyMetrics {
    /// Worker kind these metrics describe.
    pub worker_kind: WorkerKind,
    /// Samples recorded since the last reset.
    pub sample_count: u64,
    total_latency_ms: f64,
    /// Smallest latency observed.
    pub min_latency_ms: f64,
    /// Largest latency observed.
    pub max_latency_ms: f64,
}

impl LatencyMetrics {
    fn new(worker_kind: WorkerKind) -> Self {
        Self {
            worker_kind,
            sample_count: 0,
            total_latency_ms: 0.0,
            min_latency_ms: f64::INFINITY,
            max_latency_ms: 0.0,
        }
    }

    fn record(&mut self, latency_ms: f64) {
        self.sample_count += 1;
        self.total_latency_ms += latency_ms;
        self.min_latency_ms = self.min_latency_ms.min(latency_ms);
        self.max_latency_ms = self.max_latency_ms.max(latency_ms);
    }

    /// Mean latency across every recorded sample.
    pub fn avg_latency_ms(&self) -> f64 {
        if self.sample_count == 0 {
            0.0
        } else {
            self.total_latency_ms / self.sample_count as f64
        }
    }

    /// Whether the worst observed latency is still within this kind's
    /// configured `max_latency`.
    pub fn is_within_target(&self) -> bool {
        self.max_latency_ms <= default_tuning(self.worker_kind).max_latency.as_secs_f64() * 1000.0
    }

    fn reset(&mut self) {
        *self = Self::new(self.worker_kind);
    }
}

/// Callback invoked when a worker's recorded latency exceeds its
/// configured `max_latency`.
pub type AlertCallback = Box<dyn Fn(WorkerKind, f64, f64) + Send>;

/// Centralized latency tracking across every worker kind, with threshold
/// alerting mirroring the per-worker `max_latency` targets in
/// [`worker_protocol::tuning`].
pub struct LatencyMonitor {
    metrics: Mutex<HashMap<WorkerKind, LatencyMetrics>>,
    alert_callbacks: Mutex<Vec<AlertCallback>>,
}

impl Default for LatencyMonitor {
    fn default() -> Self {
        let metrics = WorkerKind::ALL.iter().map(|&k| (k, LatencyMetrics::new(k))).collect();
        Self {
            metrics: Mutex::new(metrics),
            alert_callbacks: Mutex::new(Vec::new()),
        }
    }
}

impl LatencyMonitor {
    /// Creates an empty monitor with zeroed metrics for every worker kind.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one latency sample for `worker_kind`, firing any registered
    /// alert callbacks if it exceeds the configured maximum.
    pub fn record_latency(&self, worker_kind: WorkerKind, latency_ms: f64) {
        let exceeded = {
            let mut metrics = self.metrics.lock();
            let entry = metrics.entry(worker_kind).or_insert_with(|| LatencyMetrics::new(worker_kind));
            entry.record(latency_ms);
            let threshold = default_tuning(worker_kind).max_latency.as_secs_f64() * 1000.0;
            (latency_ms > threshold).then_some(threshold)
        };
        if let Some(threshold) = exceeded {
            for callback in self.alert_callbacks.lock().iter() {
                callback(worker_kind, latency_ms, threshold);
            }
        }
    }

    /// Registers a callback fired on every threshold violation.
    pub fn register_alert_callback(&self, callback: AlertCallback) {
        self.alert_callbacks.lock().push(callback);
    }

    /// A snapshot of one worker kind's metrics.
    pub fn get_metrics(&self, worker_kind: WorkerKind) -> LatencyMetrics {
        self.metrics
            .lock()
            .get(&worker_kind)
            .copied()
            .unwrap_or_else(|| LatencyMetrics::new(worker_kind))
    }

    /// Resets every worker kind's metrics to zero.
    pub fn reset_all(&self) {
        for metrics in self.metrics.lock().values_mut() {
            metrics.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn records_min_max_avg() {
        let monitor = LatencyMonitor::new();
        monitor.record_latency(WorkerKind::Fft, 10.0);
        monitor.record_latency(WorkerKind::Fft, 20.0);
        monitor.record_latency(WorkerKind::Fft, 30.0);
        let metrics = monitor.get_metrics(WorkerKind::Fft);
        assert_eq!(metrics.sample_count, 3);
        assert_eq!(metrics.min_latency_ms, 10.0);
        assert_eq!(metrics.max_latency_ms, 30.0);
        assert_eq!(metrics.avg_latency_ms(), 20.0);
    }

    #[test]
    fn alert_fires_past_threshold() {
        let monitor = LatencyMonitor::new();
        let fired = Arc::new(AtomicU32::new(0));
        let f = fired.clone();
        monitor.register_alert_callback(Box::new(move |_kind, _latency, _threshold| {
            f.fetch_add(1, Ordering::SeqCst);
        }));
        // Transition worker's max_latency_ms is 1000 per the canonical table.
        monitor.record_latency(WorkerKind::Transition, 5000.0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_all_zeroes_every_kind() {
        let monitor = LatencyMonitor::new();
        monitor.record_latency(WorkerKind::Image, 42.0);
        monitor.reset_all();
        assert_eq!(monitor.get_metrics(WorkerKind::Image).sample_count, 0);
    }
}
