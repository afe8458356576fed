//! Adaptive per-display render timer (spec.md §4.E).

use crate::error::Error;
use crate::metrics::{MetricsTracker, RenderTimerMetrics};
use crate::state::{AtomicRenderState, RenderState};
use parking_lot::{Condvar, Mutex};
use ring_channel::{ring_channel, RingReceiver, RingSender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thread_manager::{ThreadManager, UiQueue};
use tracing::{debug, trace};

/// Canonical target frame rate.
pub const DEFAULT_TARGET_FPS: f64 = 60.0;
/// How long the polling loop waits in [`RenderState::Paused`] before giving
/// up and falling back to [`RenderState::Idle`].
pub const PAUSED_IDLE_TIMEOUT: Duration = Duration::from_secs(5);
/// Poll granularity while paused.
const PAUSED_POLL_INTERVAL: Duration = Duration::from_millis(1);
/// Sleep chunk size while waiting out most of a frame interval.
const SLEEP_CHUNK: Duration = Duration::from_millis(10);
/// Safety margin subtracted from the target interval before busy-waiting
/// the remainder, to absorb scheduler wakeup jitter.
const BUSY_WAIT_MARGIN: Duration = Duration::from_millis(2);
/// Capacity of the frame-request SPSC queue.
const FRAME_REQUEST_QUEUE_CAPACITY: usize = 4;

#[derive(Default)]
struct WakeEvent {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl WakeEvent {
    fn notify(&self) {
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }

    /// Blocks until notified or `timeout` elapses.
    fn wait_timeout(&self, timeout: Duration) {
        let mut guard = self.mutex.lock();
        self.condvar.wait_for(&mut guard, timeout);
    }
}

struct Shared {
    state: AtomicRenderState,
    stop_requested: AtomicBool,
    task_finished: AtomicBool,
    wake: WakeEvent,
    join_wait: WakeEvent,
    paused_at: Mutex<Instant>,
    target_interval: Duration,
    metrics: MetricsTracker,
    frame_requests: Mutex<RingReceiver<()>>,
    ui: UiQueue,
    on_frame: Arc<dyn Fn() + Send + Sync>,
}

/// A single dedicated timing task per display surface, adaptively sleeping
/// between frames and collapsing to near-zero cost while idle or paused.
pub struct AdaptiveRenderTimer {
    shared: Arc<Shared>,
    frame_request_sender: Mutex<RingSender<()>>,
}

impl AdaptiveRenderTimer {
    /// Spawns the timer's background task onto the compute pool. `on_frame`
    /// is invoked on the UI thread once per dispatched frame.
    pub fn new(
        threads: &ThreadManager,
        target_fps: f64,
        on_frame: impl Fn() + Send + Sync + 'static,
    ) -> Result<Self, Error> {
        let (sender, receiver) = ring_channel(FRAME_REQUEST_QUEUE_CAPACITY)?;
        let shared = Arc::new(Shared {
            state: AtomicRenderState::new(RenderState::Idle),
            stop_requested: AtomicBool::new(false),
            task_finished: AtomicBool::new(false),
            wake: WakeEvent::default(),
            join_wait: WakeEvent::default(),
            paused_at: Mutex::new(Instant::now()),
            target_interval: Duration::from_secs_f64(1.0 / target_fps),
            metrics: MetricsTracker::new(),
            frame_requests: Mutex::new(receiver),
            ui: threads.ui_handle(),
            on_frame: Arc::new(on_frame),
        });

        let task_shared = shared.clone();
        threads.submit_compute_task(move |cancel| {
            run_loop(&task_shared, cancel);
        })?;

        Ok(Self {
            shared,
            frame_request_sender: Mutex::new(sender),
        })
    }

    /// Transitions [`RenderState::Idle`] to [`RenderState::Running`] and
    /// wakes the task.
    pub fn start(&self) -> bool {
        let transitioned = self.shared.state.compare_exchange(RenderState::Idle, RenderState::Running);
        if transitioned {
            self.shared.metrics.record_transition();
            self.shared.wake.notify();
        }
        transitioned
    }

    /// Transitions [`RenderState::Running`] to [`RenderState::Paused`] and
    /// records the pause time for the idle-timeout countdown.
    pub fn pause(&self) -> bool {
        let transitioned = self
            .shared
            .state
            .compare_exchange(RenderState::Running, RenderState::Paused);
        if transitioned {
            *self.shared.paused_at.lock() = Instant::now();
            self.shared.metrics.record_transition();
        }
        transitioned
    }

    /// Transitions [`RenderState::Paused`] or [`RenderState::Idle`] to
    /// [`RenderState::Running`] and wakes the task.
    pub fn resume(&self) -> bool {
        let transitioned = self.shared.state.compare_exchange_either(
            RenderState::Paused,
            RenderState::Idle,
            RenderState::Running,
        );
        if transitioned {
            self.shared.metrics.record_transition();
            self.shared.wake.notify();
        }
        transitioned
    }

    /// Requests shutdown. Sets the stop and wake events; unless
    /// `fast_exit` is set, blocks briefly for the task to actually finish
    /// so teardown order stays deterministic.
    pub fn stop(&self, fast_exit: bool) {
        self.shared.stop_requested.store(true, Ordering::Release);
        self.shared.wake.notify();
        if !fast_exit {
            let deadline = Instant::now() + Duration::from_millis(500);
            while !self.shared.task_finished.load(Ordering::Acquire) && Instant::now() < deadline {
                self.shared.join_wait.wait_timeout(Duration::from_millis(5));
            }
        }
    }

    /// Enqueues an out-of-band frame request, coalesced with any other
    /// pending requests (drop-oldest at capacity).
    pub fn request_frame(&self) {
        self.frame_request_sender.lock().push_drop_oldest(());
    }

    /// Whether the timer is currently in [`RenderState::Running`].
    pub fn is_running(&self) -> bool {
        self.shared.state.load() == RenderState::Running
    }

    /// Human-readable current state, matching [`RenderState::as_str`].
    pub fn describe_state(&self) -> &'static str {
        self.shared.state.load().as_str()
    }

    /// A snapshot of frame/transition/time-in-state counters.
    pub fn metrics(&self) -> RenderTimerMetrics {
        self.shared.metrics.snapshot()
    }
}

fn run_loop(shared: &Arc<Shared>, cancel: &thread_manager::CancelFlag) {
    let mut state_entered_at = Instant::now();
    loop {
        if shared.stop_requested.load(Ordering::Acquire) || cancel.is_cancelled() {
            break;
        }
        match shared.state.load() {
            RenderState::Idle => {
                shared.wake.wait_timeout(Duration::from_millis(50));
                let elapsed = state_entered_at.elapsed();
                shared.metrics.add_idle_time(elapsed);
                state_entered_at = Instant::now();
            }
            RenderState::Paused => {
                shared.wake.wait_timeout(PAUSED_POLL_INTERVAL);
                if shared.paused_at.lock().elapsed() >= PAUSED_IDLE_TIMEOUT
                    && shared.state.compare_exchange(RenderState::Paused, RenderState::Idle)
                {
                    shared.metrics.record_transition();
                    debug!("render timer idle timeout elapsed, Paused -> Idle");
                }
                let elapsed = state_entered_at.elapsed();
                shared.metrics.add_paused_time(elapsed);
                state_entered_at = Instant::now();
            }
            RenderState::Running => {
                run_running_iteration(shared, cancel);
                let elapsed = state_entered_at.elapsed();
                shared.metrics.add_running_time(elapsed);
                state_entered_at = Instant::now();
            }
        }
    }
    shared.task_finished.store(true, Ordering::Release);
    shared.join_wait.notify();
}

fn run_running_iteration(shared: &Arc<Shared>, cancel: &thread_manager::CancelFlag) {
    let mut requested = Vec::new();
    shared.frame_requests.lock().drain_into(&mut requested);
    if !requested.is_empty() {
        dispatch_frame(shared);
        return;
    }

    let frame_start = Instant::now();
    let sleep_budget = shared.target_interval.saturating_sub(BUSY_WAIT_MARGIN);
    let mut slept = Duration::ZERO;
    while slept < sleep_budget {
        if shared.stop_requested.load(Ordering::Acquire)
            || cancel.is_cancelled()
            || shared.state.load() != RenderState::Running
        {
            return;
        }
        let chunk = SLEEP_CHUNK.min(sleep_budget - slept);
        shared.wake.wait_timeout(chunk);
        slept += chunk;
    }

    while frame_start.elapsed() < shared.target_interval {
        trace!("busy-waiting to target frame boundary");
        std::hint::spin_loop();
    }

    if shared.state.load() == RenderState::Running {
        dispatch_frame(shared);
    }
}

fn dispatch_frame(shared: &Arc<Shared>) {
    shared.metrics.record_frame();
    let on_frame = shared.on_frame.clone();
    shared.ui.run_on_ui_thread(move || on_frame());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use resource_manager::ResourceManager;
    use std::sync::atomic::AtomicU32;
    use thread_manager::PoolKind;

    fn test_threads() -> ThreadManager {
        let resources = ResourceManager::new();
        ThreadManager::with_pools(&resources, &[PoolKind::Compute]).unwrap()
    }

    #[test]
    fn starts_idle_and_transitions_to_running() {
        let threads = test_threads();
        let timer = AdaptiveRenderTimer::new(&threads, 60.0, || {}).unwrap();
        assert_eq!(timer.describe_state(), "idle");
        assert!(timer.start());
        assert!(timer.is_running());
        timer.stop(true);
    }

    #[test]
    fn dispatches_frames_while_running() {
        let threads = test_threads();
        let frames = Arc::new(AtomicU32::new(0));
        let f = frames.clone();
        let timer = AdaptiveRenderTimer::new(&threads, 240.0, move || {
            f.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        timer.start();
        std::thread::sleep(Duration::from_millis(60));
        threads.drain_ui_queue();
        timer.stop(false);
        assert!(frames.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn pause_then_resume_round_trips() {
        let threads = test_threads();
        let timer = AdaptiveRenderTimer::new(&threads, 60.0, || {}).unwrap();
        timer.start();
        assert!(timer.pause());
        assert_eq!(timer.describe_state(), "paused");
        assert!(timer.resume());
        assert!(timer.is_running());
        timer.stop(true);
    }

    #[test]
    fn request_frame_is_coalesced_at_capacity() {
        let threads = test_threads();
        let timer = AdaptiveRenderTimer::new(&threads, 60.0, || {}).unwrap();
        for _ in 0..20 {
            timer.request_frame();
        }
        // effective capacity is FRAME_REQUEST_QUEUE_CAPACITY - 1; pushing
        // far beyond it must not panic or block.
        timer.stop(true);
    }
}
