//! The uniform worker main loop (spec.md §4.I): read a request with a
//! short timeout, dispatch to the worker-specific handler, reply.

use crate::handler::WorkerHandler;
use std::io::{BufRead, Write};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use worker_protocol::{MessageType, WorkerKind, WorkerMessage, WorkerResponse};

/// How long the reader thread's channel recv blocks before the loop goes
/// around again, per spec.md §4.I step 2.a.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Process-lifetime counters surfaced in `HeartbeatAck` payloads.
pub struct WorkerStats {
    started_at: Instant,
    messages_processed: AtomicU64,
}

impl WorkerStats {
    fn new() -> Self {
        Self {
            started_at: Instant::now(),
            messages_processed: AtomicU64::new(0),
        }
    }

    fn record_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Builds the `{uptime_s, messages_processed, pid}` payload sent back
    /// on every `HeartbeatAck`.
    pub fn heartbeat_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "uptime_s": self.started_at.elapsed().as_secs_f64(),
            "messages_processed": self.messages_processed.load(Ordering::Relaxed),
            "pid": process::id(),
        })
    }
}

impl Default for WorkerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of processing one request: whether the loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Keep reading requests.
    Continue,
    /// A `Shutdown` request was processed; the loop should exit.
    Shutdown,
}

/// Applies spec.md §4.I steps c-f to one parsed request, calling `emit` for
/// every response produced (a handler emitting `WorkerBusy`/`WorkerIdle`
/// around its own work produces more than one). Pure aside from `emit` and
/// `stats`, so it is exercised directly in tests without real stdio.
pub fn process_message(
    kind: WorkerKind,
    handler: &mut dyn WorkerHandler,
    message: &WorkerMessage,
    stats: &WorkerStats,
    mut emit: impl FnMut(WorkerResponse),
) -> LoopAction {
    match message.msg_type {
        MessageType::Shutdown => {
            emit(WorkerResponse::ok(
                message,
                MessageType::Shutdown,
                serde_json::Value::Null,
                0.0,
            ));
            info!(kind = ?kind, "worker acknowledged shutdown");
            LoopAction::Shutdown
        }
        MessageType::Heartbeat => {
            emit(WorkerResponse::ok(
                message,
                MessageType::HeartbeatAck,
                stats.heartbeat_payload(),
                0.0,
            ));
            LoopAction::Continue
        }
        msg_type => {
            let busy_idle = handler.emits_busy_idle(msg_type);
            if busy_idle {
                emit(WorkerResponse::ok(message, MessageType::WorkerBusy, serde_json::Value::Null, 0.0));
            }

            let started = Instant::now();
            let response = match handler.handle(message) {
                Ok(handled) => {
                    let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
                    let mut response = WorkerResponse::ok(message, handled.result_type, handled.payload, processing_time_ms);
                    if let Some(name) = handled.shared_memory_name {
                        response = response.with_shared_memory(name);
                    }
                    response
                }
                Err(err) => {
                    warn!(kind = ?kind, message = %err.message, code = err.code, "handler returned an error");
                    WorkerResponse::error(message, err.message, err.code)
                }
            };
            emit(response);

            if busy_idle {
                emit(WorkerResponse::ok(message, MessageType::WorkerIdle, serde_json::Value::Null, 0.0));
            }
            stats.record_processed();
            LoopAction::Continue
        }
    }
}

/// Runs the worker main loop over `reader`/`writer`, parsing one
/// newline-delimited JSON [`WorkerMessage`] per line and writing back one
/// JSON line per emitted [`WorkerResponse`]. Returns once a `Shutdown`
/// request is processed or the reader reaches EOF.
pub fn run_loop(
    kind: WorkerKind,
    handler: &mut dyn WorkerHandler,
    mut reader: impl BufRead,
    mut writer: impl Write,
) -> std::io::Result<()> {
    let stats = WorkerStats::new();
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            debug!(kind = ?kind, "stdin closed, exiting");
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }

        let message: WorkerMessage = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(err) => {
                warn!(kind = ?kind, %err, "failed to parse incoming request line");
                continue;
            }
        };

        let action = process_message(kind, handler, &message, &stats, |response| {
            if let Err(err) = write_response(&mut writer, &response) {
                warn!(kind = ?kind, %err, "failed to write response");
            }
        });

        if action == LoopAction::Shutdown {
            return Ok(());
        }
    }
}

fn write_response(writer: &mut impl Write, response: &WorkerResponse) -> std::io::Result<()> {
    let line = serde_json::to_string(response)?;
    writeln!(writer, "{line}")?;
    writer.flush()
}

/// Entrypoint called by every worker binary's `main`: initialises logging
/// and runs [`run_loop`] over the process's own stdin/stdout.
pub fn run_worker_main(kind: WorkerKind, mut handler: impl WorkerHandler) {
    init_logging(kind);
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    if let Err(err) = run_loop(kind, &mut handler, stdin.lock(), stdout.lock()) {
        warn!(kind = ?kind, %err, "worker main loop exited with an I/O error");
    }
}

/// Best-effort `tracing_subscriber` initialisation; failures (e.g. a
/// subscriber already installed by an embedding host) are swallowed since
/// this is a worker process where logging is a diagnostic nicety, not a
/// correctness dependency.
fn init_logging(kind: WorkerKind) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
    if result.is_err() {
        debug!(kind = ?kind, "tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::HandledResponse;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    struct EchoHandler {
        busy_idle_for: Option<MessageType>,
    }

    impl WorkerHandler for EchoHandler {
        fn handle(&mut self, message: &WorkerMessage) -> Result<HandledResponse, HandlerError> {
            if message.payload == serde_json::json!("boom") {
                return Err(HandlerError::new("boom", 42));
            }
            Ok(HandledResponse::inline(MessageType::FftBars, message.payload.clone()))
        }

        fn emits_busy_idle(&self, msg_type: MessageType) -> bool {
            self.busy_idle_for == Some(msg_type)
        }
    }

    fn collector() -> (Arc<Mutex<Vec<WorkerResponse>>>, impl FnMut(WorkerResponse)) {
        let responses = Arc::new(Mutex::new(Vec::new()));
        let sink = responses.clone();
        (responses, move |response| sink.lock().unwrap().push(response))
    }

    #[test]
    fn shutdown_acknowledges_and_stops_loop() {
        let mut handler = EchoHandler { busy_idle_for: None };
        let stats = WorkerStats::new();
        let message = WorkerMessage::new(MessageType::Shutdown, 1, "c1", WorkerKind::Fft, serde_json::Value::Null);
        let (responses, emit) = collector();
        let action = process_message(WorkerKind::Fft, &mut handler, &message, &stats, emit);
        assert_eq!(action, LoopAction::Shutdown);
        assert_eq!(responses.lock().unwrap().len(), 1);
    }

    #[test]
    fn heartbeat_replies_with_ack_payload() {
        let mut handler = EchoHandler { busy_idle_for: None };
        let stats = WorkerStats::new();
        let message = WorkerMessage::new(MessageType::Heartbeat, 1, "c1", WorkerKind::Image, serde_json::Value::Null);
        let (responses, emit) = collector();
        process_message(WorkerKind::Image, &mut handler, &message, &stats, emit);
        let responses = responses.lock().unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].msg_type, MessageType::HeartbeatAck);
        assert!(responses[0].payload.get("uptime_s").is_some());
    }

    #[test]
    fn handler_error_becomes_error_response() {
        let mut handler = EchoHandler { busy_idle_for: None };
        let stats = WorkerStats::new();
        let message = WorkerMessage::new(MessageType::FftFrame, 1, "c1", WorkerKind::Fft, serde_json::json!("boom"));
        let (responses, emit) = collector();
        process_message(WorkerKind::Fft, &mut handler, &message, &stats, emit);
        let responses = responses.lock().unwrap();
        assert_eq!(responses.len(), 1);
        assert!(!responses[0].success);
        assert_eq!(responses[0].error_code, Some(42));
    }

    #[test]
    fn long_running_handler_brackets_busy_and_idle() {
        let mut handler = EchoHandler {
            busy_idle_for: Some(MessageType::RssRefresh),
        };
        let stats = WorkerStats::new();
        let message = WorkerMessage::new(MessageType::RssRefresh, 1, "c1", WorkerKind::Rss, serde_json::json!(1));
        let (responses, emit) = collector();
        process_message(WorkerKind::Rss, &mut handler, &message, &stats, emit);
        let responses = responses.lock().unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].msg_type, MessageType::WorkerBusy);
        assert_eq!(responses[2].msg_type, MessageType::WorkerIdle);
    }

    #[test]
    fn run_loop_processes_lines_until_shutdown() {
        let mut handler = EchoHandler { busy_idle_for: None };
        let shutdown = WorkerMessage::new(MessageType::Shutdown, 1, "c1", WorkerKind::Fft, serde_json::Value::Null);
        let input = format!("{}\n", serde_json::to_string(&shutdown).unwrap());
        let mut output = Vec::new();
        run_loop(WorkerKind::Fft, &mut handler, input.as_bytes(), &mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
