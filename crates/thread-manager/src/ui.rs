//! UI-thread dispatch and update coalescing (spec.md §4.D).
//!
//! Background threads can't touch UI state directly, so work destined for
//! the UI thread is queued here and drained by the UI event loop. A
//! coalescer additionally collapses bursts of updates arriving faster than
//! the UI can usefully redraw.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// A closure to run on the UI thread.
pub type UiJob = Box<dyn FnOnce() + Send + 'static>;

/// Queue of jobs destined for the UI thread; the UI event loop calls
/// [`UiQueue::drain`] once per tick.
#[derive(Clone)]
pub struct UiQueue {
    sender: Sender<UiJob>,
    receiver: Receiver<UiJob>,
}

impl Default for UiQueue {
    fn default() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }
}

impl UiQueue {
    /// Queues a closure to run on the UI thread.
    pub fn run_on_ui_thread(&self, job: impl FnOnce() + Send + 'static) {
        // An unbounded channel only errors once every receiver is dropped,
        // i.e. the UI thread has already shut down; there is nothing
        // meaningful left to do with the job at that point.
        let _ = self.sender.send(Box::new(job));
    }

    /// Runs every pending job in submission order. Call once per UI tick.
    pub fn drain(&self) {
        while let Ok(job) = self.receiver.try_recv() {
            job();
        }
    }
}

/// How a [`UiCoalescer`] combines updates that arrive within its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalesceMode {
    /// Keep only the most recent update; earlier ones in the window are discarded.
    Latest,
    /// Combine updates with a caller-supplied merge function.
    Merge,
}

struct CoalescerState<T> {
    pending: Option<T>,
    last_flush: Instant,
}

/// Collapses a burst of same-topic updates into at most one per `window`,
/// handing the combined value to the UI thread through a [`UiQueue`].
pub struct UiCoalescer<T> {
    mode: CoalesceMode,
    window: Duration,
    merge: Option<Box<dyn Fn(T, T) -> T + Send>>,
    state: Mutex<CoalescerState<T>>,
}

impl<T: Send + 'static> UiCoalescer<T> {
    /// Creates a coalescer that keeps only the latest update per window.
    pub fn latest(window: Duration) -> Self {
        Self {
            mode: CoalesceMode::Latest,
            window,
            merge: None,
            state: Mutex::new(CoalescerState {
                pending: None,
                last_flush: Instant::now(),
            }),
        }
    }

    /// Creates a coalescer that combines updates within a window via `merge`.
    pub fn merge(window: Duration, merge: impl Fn(T, T) -> T + Send + 'static) -> Self {
        Self {
            mode: CoalesceMode::Merge,
            window,
            merge: Some(Box::new(merge)),
            state: Mutex::new(CoalescerState {
                pending: None,
                last_flush: Instant::now(),
            }),
        }
    }

    /// The coalescing mode this instance was created with.
    pub fn mode(&self) -> CoalesceMode {
        self.mode
    }

    /// Submits a new value. Combines it with any value still pending in
    /// the current window; returns a value ready to publish once the
    /// window has elapsed since the last flush.
    pub fn submit(&self, value: T) -> Option<T> {
        let mut state = self.state.lock();
        state.pending = Some(match (state.pending.take(), &self.merge) {
            (Some(existing), Some(merge)) if self.mode == CoalesceMode::Merge => {
                merge(existing, value)
            }
            _ => value,
        });

        if state.last_flush.elapsed() >= self.window {
            state.last_flush = Instant::now();
            state.pending.take()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ui_queue_runs_jobs_in_order() {
        let queue = UiQueue::default();
        let log = std::sync::Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            queue.run_on_ui_thread(move || log.lock().push(i));
        }
        queue.drain();
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn latest_mode_drops_earlier_updates_within_window() {
        let coalescer: UiCoalescer<u32> = UiCoalescer::latest(Duration::from_secs(3600));
        assert_eq!(coalescer.submit(1), None);
        assert_eq!(coalescer.submit(2), None);
        // Still inside the (huge) window, nothing flushed yet, but the
        // pending value is now 2, not 1.
        let state = coalescer.state.lock();
        assert_eq!(state.pending, Some(2));
    }

    #[test]
    fn merge_mode_combines_pending_updates() {
        let coalescer = UiCoalescer::merge(Duration::from_secs(3600), |a: u32, b: u32| a + b);
        coalescer.submit(1);
        coalescer.submit(2);
        let state = coalescer.state.lock();
        assert_eq!(state.pending, Some(3));
    }

    #[test]
    fn flushes_after_window_elapses() {
        let coalescer: UiCoalescer<u32> = UiCoalescer::latest(Duration::from_millis(1));
        coalescer.submit(1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(coalescer.submit(2), Some(2));
    }
}
