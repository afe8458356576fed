//! One-shot and recurring timers backed by a dedicated sleeper thread each
//! (spec.md §4.D). Not to be confused with the adaptive render timer, which
//! lives in its own crate. Both kinds of timer are UI-thread-affine: the
//! sleeper thread only measures time, and hands the actual callback to
//! [`UiQueue::run_on_ui_thread`] rather than running it itself.

use crate::ui::UiQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// Handle to a running timer; dropping it does not stop the timer, call
/// [`TimerHandle::cancel`] explicitly.
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    /// Stops a recurring timer before its next tick, or a pending one-shot
    /// before it fires. Best-effort: a tick already in flight still runs.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Runs `job` once after `delay`, dispatched onto the UI thread through `ui`.
pub fn single_shot(delay: Duration, ui: UiQueue, job: impl FnOnce() + Send + 'static) -> TimerHandle {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    thread::spawn(move || {
        thread::sleep(delay);
        if !flag.load(Ordering::Acquire) {
            ui.run_on_ui_thread(job);
        }
    });
    TimerHandle { cancelled }
}

/// Runs `job` every `interval` until cancelled, each tick dispatched onto
/// the UI thread through `ui`. Logs a warning when a tick's gap since the
/// previous one exceeds twice `interval` by more than 100ms, i.e. the timer
/// thread itself was starved, not just normal scheduler jitter.
pub fn schedule_recurring(interval: Duration, ui: UiQueue, job: impl FnMut() + Send + 'static) -> TimerHandle {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    let job = Arc::new(Mutex::new(job));
    thread::spawn(move || {
        let mut last_tick = Instant::now();
        while !flag.load(Ordering::Acquire) {
            thread::sleep(interval);
            if flag.load(Ordering::Acquire) {
                break;
            }
            let now = Instant::now();
            let gap = now.duration_since(last_tick);
            last_tick = now;
            let jitter_threshold = interval * 2;
            if gap > jitter_threshold && gap - jitter_threshold > Duration::from_millis(100) {
                warn!(gap_ms = gap.as_millis(), interval_ms = interval.as_millis(), "recurring timer tick running behind schedule");
            }

            let job = job.clone();
            ui.run_on_ui_thread(move || (job.lock())());
        }
    });
    TimerHandle { cancelled }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn single_shot_fires_once_once_the_ui_queue_is_drained() {
        let ui = UiQueue::default();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let _handle = single_shot(Duration::from_millis(1), ui.clone(), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.load(Ordering::SeqCst), 0, "queued for the UI thread, not yet run");
        ui.drain();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_before_fire_prevents_the_job() {
        let ui = UiQueue::default();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let handle = single_shot(Duration::from_millis(20), ui.clone(), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        handle.cancel();
        thread::sleep(Duration::from_millis(40));
        ui.drain();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn recurring_timer_stops_after_cancel() {
        let ui = UiQueue::default();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let handle = schedule_recurring(Duration::from_millis(2), ui.clone(), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(15));
        handle.cancel();
        thread::sleep(Duration::from_millis(5));
        ui.drain();
        let ticks_at_cancel = counter.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(15));
        ui.drain();
        assert_eq!(counter.load(Ordering::SeqCst), ticks_at_cancel);
    }
}
