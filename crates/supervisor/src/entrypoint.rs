//! Spawnable worker entrypoints (spec.md §4.H `register_worker_factory`).

use std::process::Command;

/// Builds the [`Command`] used to spawn a worker process. Stored per
/// [`worker_protocol::WorkerKind`] and invoked on every `start`/restart.
pub type WorkerFactory = Box<dyn Fn() -> Command + Send + Sync>;
