//! The per-worker-kind hook every worker binary implements (spec.md §4.I).

use crate::error::HandlerError;
use worker_protocol::{MessageType, WorkerMessage};

/// The outcome of a successful [`WorkerHandler::handle`] call.
#[derive(Debug, Clone)]
pub struct HandledResponse {
    /// The response's message type.
    pub result_type: MessageType,
    /// Structured payload, message-type specific.
    pub payload: serde_json::Value,
    /// Name of a shared-memory handle holding the result, for handlers
    /// that deliver large payloads out of band instead of inline.
    pub shared_memory_name: Option<String>,
}

impl HandledResponse {
    /// An inline response with no shared-memory handle.
    pub fn inline(result_type: MessageType, payload: serde_json::Value) -> Self {
        Self {
            result_type,
            payload,
            shared_memory_name: None,
        }
    }

    /// A response whose large result rides a shared-memory handle instead
    /// of the JSON payload.
    pub fn with_shared_memory(result_type: MessageType, payload: serde_json::Value, handle: impl Into<String>) -> Self {
        Self {
            result_type,
            payload,
            shared_memory_name: Some(handle.into()),
        }
    }
}

/// Worker-specific message handling, invoked by the shared main loop for
/// everything other than `Shutdown`/`Heartbeat`, which the loop handles
/// itself.
pub trait WorkerHandler: Send {
    /// Handles one request, returning the produced response, or a
    /// [`HandlerError`] turned into an `Error` response.
    fn handle(&mut self, message: &WorkerMessage) -> Result<HandledResponse, HandlerError>;

    /// Whether `msg_type` may run long enough that the supervisor's
    /// heartbeat accounting should be suspended for its duration
    /// (spec.md §4.I step f). Defaults to `false`.
    fn emits_busy_idle(&self, msg_type: MessageType) -> bool {
        let _ = msg_type;
        false
    }
}
