//! Central coordinator for typed worker pools, UI dispatch, timers, and
//! lock-free inter-thread primitives (spec.md §4.D).

use crate::error::Error;
use crate::job::{CancelFlag, Job, TaskId};
use crate::pool::{Pool, PoolKind, PoolStats, PoolStatsHandle};
use crate::timer::{self, TimerHandle};
use crate::ui::{UiCoalescer, UiQueue};
use resource_manager::{ResourceGuard, ResourceKind, ResourceManager};
use ring_channel::{ring_channel, triple_buffer, Publisher, RingReceiver, RingSender, Subscriber};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Interval at which pool statistics are republished for
/// [`ThreadManager::read_published_stats`].
pub const STATS_PUBLISH_INTERVAL: Duration = Duration::from_millis(250);

/// A point-in-time view across every pool.
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    /// Per-pool counters, in [`PoolKind`] registration order.
    pub pools: Vec<(PoolKind, PoolStats)>,
}

/// Default bounded queue depth for a pool's job channel.
const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Coordinates every background thread the engine spawns: typed worker
/// pools, the UI-thread dispatch queue, one-shot/recurring timers, and
/// factories for the lock-free primitives pools publish results through.
pub struct ThreadManager {
    pools: HashMap<PoolKind, Pool>,
    ui_queue: UiQueue,
    /// Identity of the thread that constructed this manager, treated as
    /// the UI/main thread for `run_on_ui_thread`'s inline-invoke fast path.
    ui_thread_id: std::thread::ThreadId,
    stats_subscriber: Subscriber<StatsSnapshot>,
    _stats_ticker: TimerHandle,
    _pool_guards: Vec<ResourceGuard>,
}

impl ThreadManager {
    /// Builds a manager with the default [`PoolKind::Io`] and
    /// [`PoolKind::Compute`] pools sized off the host's CPU count, and
    /// starts the 250ms stats-publishing tick.
    pub fn new(resources: &ResourceManager) -> Result<Self, Error> {
        Self::with_pools(resources, &[PoolKind::Io, PoolKind::Compute])
    }

    /// Builds a manager with exactly the requested pool kinds.
    pub fn with_pools(resources: &ResourceManager, kinds: &[PoolKind]) -> Result<Self, Error> {
        let mut pools = HashMap::new();
        let mut guards = Vec::new();
        for &kind in kinds {
            let pool = Pool::start(kind, kind.default_worker_count(), DEFAULT_QUEUE_CAPACITY)?;
            pools.insert(kind, pool);
            if let Ok((_id, guard)) =
                resources.register(ResourceKind::ThreadPool, format!("{kind:?} pool"), Some(Box::new(|| {})))
            {
                guards.push(guard);
            }
        }

        let (mut publisher, subscriber) = triple_buffer(StatsSnapshot::default());
        let ui_queue = UiQueue::default();

        let handles: Vec<(PoolKind, PoolStatsHandle)> =
            pools.iter().map(|(k, p)| (*k, p.stats_handle())).collect();
        let stats_ticker = timer::schedule_recurring(STATS_PUBLISH_INTERVAL, ui_queue.clone(), move || {
            let mut snapshot = StatsSnapshot {
                pools: handles.iter().map(|(k, h)| (*k, h.stats())).collect(),
            };
            snapshot.pools.sort_by_key(|(k, _)| format!("{k:?}"));
            publisher.publish(snapshot);
        });

        Ok(Self {
            pools,
            ui_queue,
            ui_thread_id: std::thread::current().id(),
            stats_subscriber: subscriber,
            _stats_ticker: stats_ticker,
            _pool_guards: guards,
        })
    }

    /// The most recently published stats snapshot, refreshed every
    /// [`STATS_PUBLISH_INTERVAL`] by a background ticker. For an
    /// immediate, uncached read use [`ThreadManager::get_stats_snapshot`].
    pub fn read_published_stats(&mut self) -> &StatsSnapshot {
        self.stats_subscriber.consume_latest()
    }

    fn stats_snapshot(&self) -> StatsSnapshot {
        let mut pools: Vec<(PoolKind, PoolStats)> =
            self.pools.iter().map(|(k, p)| (*k, p.stats())).collect();
        pools.sort_by_key(|(k, _)| format!("{k:?}"));
        StatsSnapshot { pools }
    }

    /// Submits a job to the named pool.
    pub fn submit_task(&self, kind: PoolKind, job: Job) -> Result<TaskId, Error> {
        self.pools
            .get(&kind)
            .ok_or(Error::NoSuchPool(kind))?
            .submit(job)
    }

    /// Submits a job to the I/O pool. Fails with [`Error::NoSuchPool`] if
    /// [`PoolKind::Io`] was not requested in [`ThreadManager::with_pools`].
    pub fn submit_io_task(&self, job: impl FnOnce(&CancelFlag) + Send + 'static) -> Result<TaskId, Error> {
        self.submit_task(PoolKind::Io, Box::new(job))
    }

    /// Submits a job to the compute pool.
    pub fn submit_compute_task(
        &self,
        job: impl FnOnce(&CancelFlag) + Send + 'static,
    ) -> Result<TaskId, Error> {
        self.submit_task(PoolKind::Compute, Box::new(job))
    }

    /// Requests cooperative cancellation of a still-queued or running task.
    /// Returns whether the task was found; a job that ignores its
    /// [`CancelFlag`] still runs to completion.
    pub fn cancel_task(&self, kind: PoolKind, task_id: TaskId) -> bool {
        self.pools.get(&kind).is_some_and(|p| p.cancel(task_id))
    }

    /// Task ids currently queued or executing in a pool.
    pub fn get_active_tasks(&self, kind: PoolKind) -> Vec<TaskId> {
        self.pools.get(&kind).map(|p| p.active_tasks()).unwrap_or_default()
    }

    /// Live counters for a single pool.
    pub fn get_pool_stats(&self, kind: PoolKind) -> Option<PoolStats> {
        self.pools.get(&kind).map(|p| p.stats())
    }

    /// Live counters across every pool, computed on demand (does not wait
    /// for the next publish tick).
    pub fn get_stats_snapshot(&self) -> StatsSnapshot {
        self.stats_snapshot()
    }

    /// Queues a closure to run on the UI thread; the UI event loop must
    /// call [`ThreadManager::drain_ui_queue`] to actually run it. If the
    /// caller is already on the UI thread, runs `job` inline instead of
    /// enqueueing it, so a UI-thread caller never waits for its own next
    /// tick to drain.
    pub fn run_on_ui_thread(&self, job: impl FnOnce() + Send + 'static) {
        if std::thread::current().id() == self.ui_thread_id {
            job();
            return;
        }
        self.ui_queue.run_on_ui_thread(job);
    }

    /// A cloneable, `'static` handle onto the UI dispatch queue, for
    /// components (like the render timer) that outlive the borrow of this
    /// `ThreadManager` and need to keep dispatching to the UI thread.
    pub fn ui_handle(&self) -> UiQueue {
        self.ui_queue.clone()
    }

    /// Dispatches `job` to the UI thread and blocks the caller until it has
    /// run, returning its result. Runs inline (no dispatch, no block) when
    /// already called from the UI thread. Fails with
    /// [`Error::MainThreadJobPanicked`] if `job` panics or the UI thread
    /// never drains its queue.
    pub fn run_in_main_thread<T: Send + 'static>(
        &self,
        job: impl FnOnce() -> T + Send + 'static,
    ) -> Result<T, Error> {
        if std::thread::current().id() == self.ui_thread_id {
            return std::panic::catch_unwind(std::panic::AssertUnwindSafe(job))
                .map_err(|_| Error::MainThreadJobPanicked);
        }

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.ui_queue.run_on_ui_thread(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job));
            let _ = reply_tx.send(result);
        });
        reply_rx
            .recv()
            .map_err(|_| Error::MainThreadJobPanicked)?
            .map_err(|_| Error::MainThreadJobPanicked)
    }

    /// Runs every job queued for the UI thread. Call once per UI tick.
    pub fn drain_ui_queue(&self) {
        self.ui_queue.drain();
    }

    /// Runs `job` once after `delay`, dispatched onto the UI thread.
    pub fn single_shot(&self, delay: Duration, job: impl FnOnce() + Send + 'static) -> TimerHandle {
        timer::single_shot(delay, self.ui_queue.clone(), job)
    }

    /// Runs `job` every `interval` until the returned handle is cancelled,
    /// each tick dispatched onto the UI thread.
    pub fn schedule_recurring(
        &self,
        interval: Duration,
        job: impl FnMut() + Send + 'static,
    ) -> TimerHandle {
        timer::schedule_recurring(interval, self.ui_queue.clone(), job)
    }

    /// Creates a bounded SPSC ring buffer for cross-thread producer/consumer
    /// handoff (spec.md §2 primitive A).
    pub fn create_spsc_queue<T>(
        &self,
        capacity: usize,
    ) -> Result<(RingSender<T>, RingReceiver<T>), ring_channel::Error> {
        ring_channel(capacity)
    }

    /// Creates a lock-free triple buffer for latest-value publication
    /// (spec.md §2 primitive B).
    pub fn create_triple_buffer<T: Clone + Send>(&self, initial: T) -> (Publisher<T>, Subscriber<T>) {
        triple_buffer(initial)
    }

    /// Creates a "keep only the latest" UI update coalescer.
    pub fn create_ui_coalescer<T: Send + 'static>(&self, window: Duration) -> UiCoalescer<T> {
        UiCoalescer::latest(window)
    }

    /// Stops accepting new jobs and joins every pool's workers, each up to
    /// `timeout`. Safe to call more than once; later calls see empty pools
    /// and return immediately.
    pub fn shutdown(&mut self, timeout: Duration) -> Result<(), Error> {
        let mut first_err = None;
        for (kind, pool) in self.pools.drain() {
            debug!(?kind, "shutting down pool");
            if let Err(err) = pool.shutdown(timeout) {
                first_err.get_or_insert(err);
            }
        }
        self._pool_guards.clear();
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
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
    fn submits_and_runs_compute_task() {
        let resources = ResourceManager::new();
        let manager = ThreadManager::with_pools(&resources, &[PoolKind::Compute]).unwrap();
        let done = Arc::new(AtomicU32::new(0));
        let d = done.clone();
        manager
            .submit_compute_task(move |_cancel| {
                d.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stats_snapshot_reports_registered_pools() {
        let resources = ResourceManager::new();
        let manager =
            ThreadManager::with_pools(&resources, &[PoolKind::Io, PoolKind::Compute]).unwrap();
        let snapshot = manager.get_stats_snapshot();
        assert_eq!(snapshot.pools.len(), 2);
    }

    #[test]
    fn submit_after_shutdown_is_rejected() {
        let resources = ResourceManager::new();
        let mut manager = ThreadManager::with_pools(&resources, &[PoolKind::Compute]).unwrap();
        manager.shutdown(Duration::from_secs(1)).unwrap();
        let result = manager.submit_compute_task(|_| {});
        assert!(matches!(result, Err(Error::NoSuchPool(PoolKind::Compute))));
    }

    #[test]
    fn ui_queue_round_trips_through_manager() {
        let resources = ResourceManager::new();
        let manager = ThreadManager::with_pools(&resources, &[]).unwrap();
        let ran = Arc::new(AtomicU32::new(0));
        let r = ran.clone();
        manager.run_on_ui_thread(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        manager.drain_ui_queue();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn run_on_ui_thread_invokes_inline_when_already_on_ui_thread() {
        let resources = ResourceManager::new();
        let manager = ThreadManager::with_pools(&resources, &[]).unwrap();
        let ran = Arc::new(AtomicU32::new(0));
        let r = ran.clone();
        // The test thread is the one that constructed `manager`, so this
        // must run immediately without needing a `drain_ui_queue` call.
        manager.run_on_ui_thread(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn run_in_main_thread_blocks_and_returns_the_job_result_from_another_thread() {
        let resources = ResourceManager::new();
        let manager = ThreadManager::with_pools(&resources, &[]).unwrap();
        std::thread::scope(|scope| {
            let worker = scope.spawn(|| manager.run_in_main_thread(|| 7_i32));
            // Nothing has drained the UI queue yet, so the worker thread
            // should still be blocked on `recv()`.
            std::thread::sleep(Duration::from_millis(20));
            assert!(!worker.is_finished());
            manager.drain_ui_queue();
            assert_eq!(worker.join().unwrap().unwrap(), 7);
        });
    }

    #[test]
    fn run_in_main_thread_propagates_a_panicking_job_as_an_error() {
        let resources = ResourceManager::new();
        let manager = ThreadManager::with_pools(&resources, &[]).unwrap();
        std::thread::scope(|scope| {
            let worker = scope.spawn(|| manager.run_in_main_thread(|| -> i32 { panic!("boom") }));
            std::thread::sleep(Duration::from_millis(20));
            manager.drain_ui_queue();
            assert!(matches!(worker.join().unwrap(), Err(Error::MainThreadJobPanicked)));
        });
    }
}
