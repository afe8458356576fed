//! Spawns a worker's OS process and pumps newline-delimited JSON envelopes
//! over its stdio, each direction staffed by a dedicated thread
//! (spec.md §4.G, §4.H).

use crate::entrypoint::WorkerFactory;
use crate::error::Error;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Stdio};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};
use worker_protocol::{WorkerKind, WorkerMessage, WorkerResponse};

/// A spawned worker process and the threads pumping its stdio.
pub(crate) struct WorkerProcess {
    kind: WorkerKind,
    child: Child,
    request_tx: Sender<WorkerMessage>,
    /// Clone of the writer thread's receiver, used only to evict a queued
    /// message under the `DropOldest` backpressure policy. Racing the
    /// writer thread for the same message is acceptable: eviction is
    /// inherently best-effort.
    request_rx_for_eviction: Receiver<WorkerMessage>,
    response_rx: Receiver<WorkerResponse>,
    writer_thread: Option<JoinHandle<()>>,
    reader_thread: Option<JoinHandle<()>>,
}

impl WorkerProcess {
    pub(crate) fn spawn(
        kind: WorkerKind,
        factory: &WorkerFactory,
        request_queue_size: usize,
        response_queue_size: usize,
    ) -> Result<Self, Error> {
        let mut command = factory();
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        let mut child = command.spawn().map_err(|source| Error::SpawnFailed { kind, source })?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");

        let (request_tx, request_rx) = bounded::<WorkerMessage>(request_queue_size.max(1));
        let (response_tx, response_rx) = bounded::<WorkerResponse>(response_queue_size.max(1));
        let request_rx_for_eviction = request_rx.clone();

        let writer_thread = thread::Builder::new()
            .name(format!("sse-{}-writer", kind.as_str()))
            .spawn(move || run_writer(stdin, request_rx))
            .expect("spawning worker writer thread");

        let reader_thread = thread::Builder::new()
            .name(format!("sse-{}-reader", kind.as_str()))
            .spawn(move || run_reader(stdout, response_tx))
            .expect("spawning worker reader thread");

        Ok(Self {
            kind,
            child,
            request_tx,
            request_rx_for_eviction,
            response_rx,
            writer_thread: Some(writer_thread),
            reader_thread: Some(reader_thread),
        })
    }

    /// Attempts a non-blocking enqueue; `Err(TrySendError::Full)` signals
    /// the caller should apply the worker's backpressure policy.
    pub(crate) fn try_send(&self, message: WorkerMessage) -> Result<(), TrySendError<WorkerMessage>> {
        self.request_tx.try_send(message)
    }

    /// Evicts one queued message (oldest-first, best-effort) to make room,
    /// then enqueues. Used by the `DropOldest` backpressure policy.
    pub(crate) fn drop_oldest_and_send(&self, message: WorkerMessage) {
        let _ = self.request_rx_for_eviction.try_recv();
        let _ = self.request_tx.try_send(message);
    }

    /// Blocking enqueue used by the `Block` backpressure policy. Returns
    /// an error if the writer thread has disconnected the channel.
    pub(crate) fn send_blocking(&self, message: WorkerMessage) -> Result<(), crossbeam_channel::SendError<WorkerMessage>> {
        self.request_tx.send(message)
    }

    pub(crate) fn poll_responses(&self, max_count: usize) -> Vec<WorkerResponse> {
        let mut out = Vec::with_capacity(max_count.min(16));
        while out.len() < max_count {
            match self.response_rx.try_recv() {
                Ok(response) => out.push(response),
                Err(_) => break,
            }
        }
        out
    }

    pub(crate) fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Kills the child and joins both pump threads. Best-effort: a thread
    /// that does not exit promptly is left detached.
    pub(crate) fn terminate(mut self) {
        if let Err(err) = self.child.kill() {
            debug!(?err, kind = ?self.kind, "terminate: child already exited");
        }
        let _ = self.child.wait();
        if let Some(handle) = self.writer_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
    }
}

fn run_writer(mut stdin: std::process::ChildStdin, request_rx: Receiver<WorkerMessage>) {
    for message in request_rx.iter() {
        let line = match serde_json::to_string(&message) {
            Ok(line) => line,
            Err(err) => {
                warn!(%err, "failed to serialize outgoing worker message");
                continue;
            }
        };
        if writeln!(stdin, "{line}").is_err() || stdin.flush().is_err() {
            break;
        }
    }
}

fn run_reader(stdout: std::process::ChildStdout, response_tx: Sender<WorkerResponse>) {
    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<WorkerResponse>(&line) {
            Ok(response) => {
                if response_tx.send(response).is_err() {
                    break;
                }
            }
            Err(err) => warn!(%err, %line, "failed to parse worker response line"),
        }
    }
}
