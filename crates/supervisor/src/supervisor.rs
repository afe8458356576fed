//! Process supervision: spawns one OS process per worker kind, pumps
//! requests/responses over its stdio, and runs the 1 s heartbeat/restart
//! tick (spec.md §4.H).

use crate::entrypoint::WorkerFactory;
use crate::error::Error;
use crate::latency::LatencyMonitor;
use crate::transport::WorkerProcess;
use crossbeam_channel::TrySendError;
use parking_lot::Mutex;
use resource_manager::{ResourceGuard, ResourceKind, ResourceManager};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use tracing::{info, warn};
use worker_protocol::tuning::{self, BackpressurePolicy};
use worker_protocol::{
    default_tuning, HealthStatus, MessageType, WorkerKind, WorkerMessage, WorkerResponse, WorkerState,
};

struct PendingEntry {
    created_at: Instant,
}

struct WorkerSlot {
    factory: Option<WorkerFactory>,
    process: Option<WorkerProcess>,
    health: HealthStatus,
    pending: HashMap<String, PendingEntry>,
    seq_no: u64,
    _resource_guard: Option<ResourceGuard>,
    /// Timestamps of restarts still inside the rolling `RESTART_WINDOW`,
    /// oldest first. Pruned in [`WorkerSlot::prune_restart_history`] before
    /// the budget is checked, so old restarts age out rather than wedging
    /// the worker in `Error` forever.
    restart_history: VecDeque<Instant>,
}

impl WorkerSlot {
    fn new(kind: WorkerKind) -> Self {
        Self {
            factory: None,
            process: None,
            health: HealthStatus::new(kind),
            pending: HashMap::new(),
            seq_no: 0,
            _resource_guard: None,
            restart_history: VecDeque::new(),
        }
    }

    /// Drops restart timestamps older than `tuning::RESTART_WINDOW` and
    /// returns how many restarts remain counted within the window.
    fn prune_restart_history(&mut self, now: Instant) -> u32 {
        while let Some(&oldest) = self.restart_history.front() {
            if now.duration_since(oldest) > tuning::RESTART_WINDOW {
                self.restart_history.pop_front();
            } else {
                break;
            }
        }
        self.restart_history.len() as u32
    }
}

/// Owns one request/response queue pair per worker kind and the supervision
/// tick that keeps those processes alive.
pub struct ProcessSupervisor {
    resources: ResourceManager,
    latency: LatencyMonitor,
    slots: Mutex<HashMap<WorkerKind, WorkerSlot>>,
}

impl ProcessSupervisor {
    /// Creates a supervisor with no factories registered yet.
    pub fn new(resources: ResourceManager) -> Self {
        let mut slots = HashMap::new();
        for &kind in &WorkerKind::ALL {
            slots.insert(kind, WorkerSlot::new(kind));
        }
        Self {
            resources,
            latency: LatencyMonitor::new(),
            slots: Mutex::new(slots),
        }
    }

    /// The latency monitor tracking response turnaround per worker kind.
    pub fn latency_monitor(&self) -> &LatencyMonitor {
        &self.latency
    }

    /// Records the spawnable entrypoint for `kind`, used by `start` and by
    /// every subsequent restart.
    pub fn register_worker_factory(&self, kind: WorkerKind, factory: WorkerFactory) {
        let mut slots = self.slots.lock();
        slots.get_mut(&kind).expect("every WorkerKind has a slot").factory = Some(factory);
    }

    /// Spawns the worker process and transitions its health to `Starting`.
    /// The supervision tick promotes it to `Running` on the first
    /// `HeartbeatAck`/`WorkerReady`.
    pub fn start(&self, kind: WorkerKind) -> Result<(), Error> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(&kind).expect("every WorkerKind has a slot");
        let factory = slot.factory.as_ref().ok_or(Error::NoFactoryRegistered(kind))?;
        let config = default_tuning(kind);
        let process = WorkerProcess::spawn(kind, factory, config.request_queue_size, config.response_queue_size)?;

        let (_id, guard) = self
            .resources
            .register(
                ResourceKind::Custom,
                format!("{} worker process", kind.as_str()),
                Some(Box::new(|| {})),
            )
            .map_err(|_| Error::SpawnFailed {
                kind,
                source: std::io::Error::other("resource manager is shutting down"),
            })?;

        slot.health = HealthStatus::new(kind);
        slot.health.pid = Some(process.pid());
        slot.health.state = WorkerState::Starting;
        slot.process = Some(process);
        slot.pending.clear();
        slot._resource_guard = Some(guard);
        info!(kind = ?kind, pid = ?slot.health.pid, "worker process started");
        Ok(())
    }

    /// Enqueues a request for `kind`, returning the correlation id used to
    /// match its eventual response via `poll_responses`.
    pub fn send_message(
        &self,
        kind: WorkerKind,
        msg_type: MessageType,
        payload: serde_json::Value,
    ) -> Result<String, Error> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(&kind).expect("every WorkerKind has a slot");
        let process = slot.process.as_ref().ok_or(Error::NotRunning(kind))?;

        slot.seq_no += 1;
        let correlation_id = uuid::Uuid::new_v4().to_string();
        let message = WorkerMessage::new(msg_type, slot.seq_no, correlation_id.clone(), kind, payload);
        message.validate_size()?;

        let config = default_tuning(kind);
        match process.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => match config.backpressure_policy {
                BackpressurePolicy::Block => {
                    // The bounded channel only supports try_send from this
                    // call path; block by retrying the enqueue.
                    drop(slots);
                    return self.send_message_blocking(kind, message);
                }
                BackpressurePolicy::DropOldest => {
                    process.drop_oldest_and_send(message);
                }
                BackpressurePolicy::DropNewest => {
                    return Err(Error::QueueFull(kind));
                }
            },
            Err(TrySendError::Disconnected(_)) => return Err(Error::NotRunning(kind)),
        }

        slot.pending.insert(
            correlation_id.clone(),
            PendingEntry {
                created_at: Instant::now(),
            },
        );
        Ok(correlation_id)
    }

    fn send_message_blocking(&self, kind: WorkerKind, message: WorkerMessage) -> Result<String, Error> {
        let correlation_id = message.correlation_id.clone();
        // Blocks the caller's thread until the worker's writer thread
        // drains space in the request queue; never touches `self.slots`
        // while waiting, so other kinds stay responsive.
        let process_handle = {
            let mut slots = self.slots.lock();
            let slot = slots.get_mut(&kind).expect("every WorkerKind has a slot");
            slot.process.take().ok_or(Error::NotRunning(kind))?
        };
        let result = process_handle.send_blocking(message);

        let mut slots = self.slots.lock();
        let slot = slots.get_mut(&kind).expect("every WorkerKind has a slot");
        slot.process = Some(process_handle);
        result.map_err(|_| Error::NotRunning(kind))?;
        slot.pending.insert(
            correlation_id.clone(),
            PendingEntry {
                created_at: Instant::now(),
            },
        );
        Ok(correlation_id)
    }

    /// Drains up to `max_count` decoded responses for `kind`, evicting their
    /// entries from the pending table and recording their latency.
    pub fn poll_responses(&self, kind: WorkerKind, max_count: usize) -> Vec<WorkerResponse> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(&kind).expect("every WorkerKind has a slot");
        let Some(process) = slot.process.as_ref() else {
            return Vec::new();
        };
        let responses = process.poll_responses(max_count);
        let mut latencies = Vec::new();
        for response in &responses {
            if let Some(entry) = slot.pending.remove(&response.correlation_id) {
                latencies.push(entry.created_at.elapsed().as_secs_f64() * 1000.0);
            }
        }
        drop(slots);
        for latency_ms in latencies {
            self.latency.record_latency(kind, latency_ms);
        }
        responses
    }

    /// A snapshot of every worker kind's current health.
    pub fn health_snapshot(&self) -> HashMap<WorkerKind, HealthStatus> {
        self.slots
            .lock()
            .iter()
            .map(|(&kind, slot)| (kind, slot.health.clone()))
            .collect()
    }

    /// Runs one supervision tick (spec.md §4.H): sends heartbeats, tracks
    /// misses with busy exemption, and restarts workers that exceed the
    /// missed-heartbeat threshold or are in `Error`, honouring the restart
    /// budget and backoff.
    pub fn tick(&self) {
        let now = Instant::now();
        let kinds: Vec<WorkerKind> = WorkerKind::ALL.to_vec();
        for kind in kinds {
            self.tick_one(kind, now);
        }
    }

    fn tick_one(&self, kind: WorkerKind, now: Instant) {
        let should_restart = {
            let mut slots = self.slots.lock();
            let slot = slots.get_mut(&kind).expect("every WorkerKind has a slot");
            if slot.process.is_none() {
                return;
            }

            if slot.health.state == WorkerState::Running {
                if slot.health.is_hung(now) {
                    warn!(kind = ?kind, "worker busy past hung threshold");
                }
                let _ = self.send_heartbeat_locked(slot, kind);
                slot.health.record_missed_heartbeat(now);
            }

            slot.health.missed_heartbeats >= tuning::MISSED_HEARTBEAT_RESTART_THRESHOLD
                || slot.health.state == WorkerState::Error
        };

        if should_restart {
            self.restart(kind, now);
        }
    }

    fn send_heartbeat_locked(&self, slot: &mut WorkerSlot, kind: WorkerKind) -> Result<(), Error> {
        let Some(process) = slot.process.as_ref() else {
            return Err(Error::NotRunning(kind));
        };
        slot.seq_no += 1;
        let correlation_id = uuid::Uuid::new_v4().to_string();
        let message = WorkerMessage::new(MessageType::Heartbeat, slot.seq_no, correlation_id, kind, serde_json::Value::Null);
        let _ = process.try_send(message);
        Ok(())
    }

    /// Applies a pending `HeartbeatAck`/`WorkerReady`/`WorkerBusy`/
    /// `WorkerIdle` response to the worker's health record. Callers should
    /// route responses returned from `poll_responses` through this before
    /// handing the rest on to application code.
    pub fn observe_response(&self, kind: WorkerKind, response: &WorkerResponse) {
        let now = Instant::now();
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(&kind).expect("every WorkerKind has a slot");
        match response.msg_type {
            MessageType::HeartbeatAck => {
                slot.health.record_heartbeat_ack(now);
                if slot.health.state == WorkerState::Starting {
                    slot.health.state = WorkerState::Running;
                    info!(kind = ?kind, "worker transitioned to Running on HeartbeatAck");
                }
            }
            MessageType::WorkerReady => {
                slot.health.state = WorkerState::Running;
                slot.health.record_heartbeat_ack(now);
                info!(kind = ?kind, "worker transitioned to Running on WorkerReady");
            }
            MessageType::WorkerBusy => slot.health.mark_busy(now),
            MessageType::WorkerIdle => slot.health.mark_idle(),
            MessageType::Error => {
                slot.health.last_error = response.error.clone();
            }
            _ => {}
        }
    }

    fn restart(&self, kind: WorkerKind, now: Instant) {
        let config = default_tuning(kind);

        let restart_count = {
            let mut slots = self.slots.lock();
            let slot = slots.get_mut(&kind).expect("every WorkerKind has a slot");
            let windowed_restarts = slot.prune_restart_history(now);
            if windowed_restarts >= config.max_restart_attempts {
                slot.health.state = WorkerState::Error;
                warn!(
                    kind = ?kind,
                    windowed_restarts,
                    window_s = tuning::RESTART_WINDOW.as_secs(),
                    "restart budget exceeded within rolling window, worker left in Error state"
                );
                return;
            }
            slot.health.state = WorkerState::Restarting;
            if let Some(process) = slot.process.take() {
                process.terminate();
            }
            slot._resource_guard = None;
            slot.pending.clear();
            windowed_restarts
        };

        // Sleeps without holding the lock so other kinds' ticks stay
        // responsive during this kind's backoff.
        let backoff = tuning::restart_backoff(&config, restart_count);
        std::thread::sleep(backoff);

        let mut slots = self.slots.lock();
        let slot = slots.get_mut(&kind).expect("every WorkerKind has a slot");
        let Some(factory) = slot.factory.as_ref() else {
            slot.health.state = WorkerState::Error;
            return;
        };
        match WorkerProcess::spawn(kind, factory, config.request_queue_size, config.response_queue_size) {
            Ok(process) => {
                let guard = self
                    .resources
                    .register(
                        ResourceKind::Custom,
                        format!("{} worker process", kind.as_str()),
                        Some(Box::new(|| {})),
                    )
                    .ok()
                    .map(|(_id, guard)| guard);
                slot.health.pid = Some(process.pid());
                slot.health.state = WorkerState::Starting;
                slot.health.missed_heartbeats = 0;
                slot.health.restart_count += 1;
                slot.health.last_restart = Some(now);
                slot.restart_history.push_back(now);
                slot.process = Some(process);
                slot._resource_guard = guard;
                info!(
                    kind = ?kind,
                    restart_count = slot.health.restart_count,
                    windowed_restarts = slot.restart_history.len(),
                    "worker restarted"
                );
            }
            Err(err) => {
                warn!(kind = ?kind, %err, "worker restart failed to spawn");
                slot.health.state = WorkerState::Error;
            }
        }
    }

    /// Sends `Shutdown` to every running worker, waits up to `timeout` for
    /// graceful exit, then force-terminates whatever remains.
    pub fn shutdown(&self, timeout: std::time::Duration) {
        let kinds: Vec<WorkerKind> = WorkerKind::ALL.to_vec();
        for kind in &kinds {
            let _ = self.send_message(*kind, MessageType::Shutdown, serde_json::Value::Null);
        }
        std::thread::sleep(timeout);
        let mut slots = self.slots.lock();
        for kind in kinds {
            if let Some(slot) = slots.get_mut(&kind) {
                if let Some(process) = slot.process.take() {
                    process.terminate();
                }
                slot._resource_guard = None;
                slot.health.state = WorkerState::Stopped;
            }
        }
    }
}
