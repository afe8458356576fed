//! A single typed worker pool: a fixed set of OS threads draining a bounded
//! job queue (spec.md §4.D).

use crate::error::Error;
use crate::job::{CancelFlag, Job, TaskId};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// The closed set of pool kinds the manager schedules work onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// Blocking I/O: file and network work.
    Io,
    /// CPU-bound compute: image decode, FFT, transition precompute.
    Compute,
    /// Screen/video capture work, when enabled.
    Capture,
    /// Off-thread render preparation.
    Render,
}

impl PoolKind {
    /// Default worker count for this kind of pool, scaled off `num_cpus`.
    pub fn default_worker_count(self) -> usize {
        let cpus = num_cpus::get().max(1);
        match self {
            PoolKind::Io => (cpus * 2).clamp(2, 16),
            PoolKind::Compute => cpus.clamp(1, 8),
            PoolKind::Capture => 1,
            PoolKind::Render => cpus.clamp(1, 4),
        }
    }

    /// Thread name prefix used for workers in this pool.
    pub fn thread_name_prefix(self) -> &'static str {
        match self {
            PoolKind::Io => "sse-io",
            PoolKind::Compute => "sse-compute",
            PoolKind::Capture => "sse-capture",
            PoolKind::Render => "sse-render",
        }
    }
}

/// Point-in-time counters for a single pool. Non-decreasing invariant:
/// `completed + failed <= submitted` always holds.
#[derive(Debug, Default, Clone, Copy)]
pub struct PoolStats {
    /// Worker threads in the pool.
    pub worker_count: usize,
    /// Jobs currently executing.
    pub active: usize,
    /// Jobs waiting in the queue.
    pub queued: usize,
    /// Jobs accepted by `submit` since the pool started.
    pub submitted: u64,
    /// Jobs that ran to completion without panicking.
    pub completed: u64,
    /// Jobs whose closure panicked; the worker thread survives and keeps
    /// pulling from the queue.
    pub failed: u64,
}

struct Entry {
    cancel: CancelFlag,
}

/// Cloneable handle onto a pool's live counters, detached from the pool
/// itself so it can be held by a ticker thread that outlives any single
/// borrow of the [`crate::ThreadManager`].
#[derive(Clone)]
pub(crate) struct PoolStatsHandle {
    worker_count: usize,
    active: Arc<AtomicUsize>,
    queued_hint: Arc<AtomicUsize>,
    submitted: Arc<AtomicU64>,
    completed: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl PoolStatsHandle {
    pub(crate) fn stats(&self) -> PoolStats {
        PoolStats {
            worker_count: self.worker_count,
            active: self.active.load(Ordering::Acquire),
            queued: self.queued_hint.load(Ordering::Acquire),
            submitted: self.submitted.load(Ordering::Acquire),
            completed: self.completed.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
        }
    }
}

pub(crate) struct Pool {
    kind: PoolKind,
    sender: Sender<(TaskId, Job)>,
    workers: Vec<JoinHandle<()>>,
    active: Arc<AtomicUsize>,
    submitted: Arc<AtomicU64>,
    completed: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    queued_hint: Arc<AtomicUsize>,
    in_flight: Arc<Mutex<HashMap<TaskId, Entry>>>,
    shut_down: Arc<std::sync::atomic::AtomicBool>,
}

impl Pool {
    pub(crate) fn start(kind: PoolKind, worker_count: usize, queue_capacity: usize) -> Result<Self, Error> {
        let (sender, receiver): (Sender<(TaskId, Job)>, Receiver<(TaskId, Job)>) = bounded(queue_capacity);
        let active = Arc::new(AtomicUsize::new(0));
        let submitted = Arc::new(AtomicU64::new(0));
        let completed = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));
        let queued_hint = Arc::new(AtomicUsize::new(0));
        let in_flight: Arc<Mutex<HashMap<TaskId, Entry>>> = Arc::new(Mutex::new(HashMap::new()));
        let shut_down = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for idx in 0..worker_count {
            let receiver = receiver.clone();
            let active = active.clone();
            let completed = completed.clone();
            let failed = failed.clone();
            let queued_hint = queued_hint.clone();
            let in_flight = in_flight.clone();
            let name = format!("{}-{idx}", kind.thread_name_prefix());
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    while let Ok((task_id, job)) = receiver.recv() {
                        queued_hint.fetch_sub(1, Ordering::AcqRel);
                        let cancel = {
                            let guard = in_flight.lock();
                            guard.get(&task_id).map(|e| e.cancel.clone())
                        };
                        let Some(cancel) = cancel else {
                            // cancel() removed the entry before the job ran; skip.
                            continue;
                        };
                        active.fetch_add(1, Ordering::AcqRel);
                        let outcome =
                            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| job(&cancel)));
                        active.fetch_sub(1, Ordering::AcqRel);
                        match outcome {
                            Ok(()) => {
                                completed.fetch_add(1, Ordering::AcqRel);
                            }
                            Err(panic) => {
                                failed.fetch_add(1, Ordering::AcqRel);
                                warn!(thread = %name, ?panic, "pool job panicked, worker continues");
                            }
                        }
                        in_flight.lock().remove(&task_id);
                    }
                    debug!(thread = %name, "pool worker exiting");
                })
                .map_err(|source| Error::ThreadSpawnFailed {
                    thread_name: name,
                    source,
                })?;
            workers.push(handle);
        }

        Ok(Self {
            kind,
            sender,
            workers,
            active,
            submitted,
            completed,
            failed,
            queued_hint,
            in_flight,
            shut_down,
        })
    }

    pub(crate) fn submit(&self, job: Job) -> Result<TaskId, Error> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(Error::PoolShutDown(self.kind));
        }
        let task_id = TaskId::next();
        self.in_flight.lock().insert(
            task_id,
            Entry {
                cancel: CancelFlag::default(),
            },
        );
        self.queued_hint.fetch_add(1, Ordering::AcqRel);
        if self.sender.send((task_id, job)).is_err() {
            self.in_flight.lock().remove(&task_id);
            self.queued_hint.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::PoolShutDown(self.kind));
        }
        self.submitted.fetch_add(1, Ordering::AcqRel);
        Ok(task_id)
    }

    pub(crate) fn cancel(&self, task_id: TaskId) -> bool {
        let guard = self.in_flight.lock();
        if let Some(entry) = guard.get(&task_id) {
            entry.cancel.cancel();
            true
        } else {
            false
        }
    }

    pub(crate) fn active_tasks(&self) -> Vec<TaskId> {
        self.in_flight.lock().keys().copied().collect()
    }

    pub(crate) fn stats(&self) -> PoolStats {
        self.stats_handle().stats()
    }

    /// A cheaply cloneable, `Send + Sync` view of this pool's counters,
    /// independent of the pool's own lifetime — used to republish stats
    /// from a dedicated ticker thread.
    pub(crate) fn stats_handle(&self) -> PoolStatsHandle {
        PoolStatsHandle {
            worker_count: self.workers.len(),
            active: self.active.clone(),
            queued_hint: self.queued_hint.clone(),
            submitted: self.submitted.clone(),
            completed: self.completed.clone(),
            failed: self.failed.clone(),
        }
    }

    /// Stops accepting new jobs, drops the sender to unblock workers once
    /// the queue drains, and waits up to `timeout` for every worker to
    /// finish before giving up on the stragglers (they are left running
    /// and detached; the process is expected to be exiting anyway).
    pub(crate) fn shutdown(mut self, timeout: std::time::Duration) -> Result<(), Error> {
        self.shut_down.store(true, Ordering::Release);
        drop(self.sender);
        let deadline = std::time::Instant::now() + timeout;
        let workers = std::mem::take(&mut self.workers);
        let mut stuck = 0usize;
        for handle in workers {
            loop {
                if handle.is_finished() {
                    if let Err(panic) = handle.join() {
                        warn!(?panic, pool = ?self.kind, "pool worker panicked during shutdown");
                    }
                    break;
                }
                if std::time::Instant::now() >= deadline {
                    stuck += 1;
                    break;
                }
                thread::sleep(std::time::Duration::from_millis(1));
            }
        }
        if stuck == 0 {
            Ok(())
        } else {
            Err(Error::ShutdownTimedOut { remaining: stuck })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn a_panicking_job_is_counted_failed_and_the_worker_survives() {
        let pool = Pool::start(PoolKind::Compute, 1, 8).unwrap();
        pool.submit(Box::new(|_cancel| panic!("boom"))).unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);
        pool.submit(Box::new(move |_cancel| {
            let _ = tx.send(());
        }))
        .unwrap();
        rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert!(stats.completed + stats.failed <= stats.submitted);
    }
}
