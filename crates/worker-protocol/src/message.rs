//! Request/response envelopes exchanged with worker processes (spec.md §4.G).
//!
//! Per the REDESIGN FLAGS in spec.md §9 ("Dynamic payload maps"), a
//! statically typed target should prefer a tagged union per message type.
//! We keep `payload` as a `serde_json::Value` tagged tree of primitives —
//! it is still the wire form, and every message-type-specific field is
//! additionally exposed through typed constructors/accessors in the
//! `image`, `rss`, `fft`, and `transition` modules of the worker crates so
//! application code never matches on untyped JSON directly.

use crate::error::Error;
use crate::worker::WorkerKind;
use serde::{Deserialize, Serialize};

/// The closed set of message types exchanged over the request/response
/// queues, per spec.md §3 "Message types".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Graceful shutdown request.
    Shutdown,
    /// Supervisor liveness probe.
    Heartbeat,
    /// Worker's reply to `Heartbeat`.
    HeartbeatAck,
    /// Pushed configuration update (e.g. FFT tuning).
    ConfigUpdate,
    /// Worker main loop has started and can accept messages.
    WorkerReady,
    /// Worker has entered a long-running handler.
    WorkerBusy,
    /// Worker has exited a long-running handler.
    WorkerIdle,

    /// Decode an image file to RGBA8.
    ImageDecode,
    /// Decode and scale an image file to a target size.
    ImagePrescale,
    /// Response payload for an image request.
    ImageResult,

    /// Fetch and parse a single RSS/Atom feed.
    RssFetch,
    /// Fetch and parse a batch of feeds.
    RssRefresh,
    /// Response payload for an RSS request.
    RssResult,

    /// Analyze one sample window.
    FftFrame,
    /// Response payload carrying bar/peak data.
    FftBars,
    /// Push updated FFT tuning parameters.
    FftConfig,

    /// Precompute transition geometry for a transition type.
    TransitionPrecompute,
    /// Response payload for a transition precompute request.
    TransitionResult,

    /// A handler raised; `payload` carries the error detail.
    Error,
}

/// A request sent to a worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerMessage {
    /// The kind of message this is.
    pub msg_type: MessageType,
    /// Monotonically increasing sequence number, scoped per worker kind.
    pub seq_no: u64,
    /// Opaque id used to pair this request with its response.
    pub correlation_id: String,
    /// Producer-side send timestamp (unix seconds, fractional).
    pub timestamp: f64,
    /// Which worker kind this message targets.
    pub worker_kind: WorkerKind,
    /// Structured payload, message-type specific.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl WorkerMessage {
    /// Builds a new request with the given fields and `payload`, stamping
    /// `timestamp` to the current time.
    pub fn new(
        msg_type: MessageType,
        seq_no: u64,
        correlation_id: impl Into<String>,
        worker_kind: WorkerKind,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            msg_type,
            seq_no,
            correlation_id: correlation_id.into(),
            timestamp: unix_timestamp_secs(),
            worker_kind,
            payload,
        }
    }

    /// Validates `payload`'s serialized size against this worker kind's cap
    /// (spec.md §3's per-worker size caps).
    pub fn validate_size(&self) -> Result<(), Error> {
        let actual = serde_json::to_vec(&self.payload).map(|v| v.len()).unwrap_or(0);
        let limit = self.worker_kind.max_payload_bytes();
        if actual > limit {
            return Err(Error::PayloadTooLarge {
                kind: self.worker_kind,
                actual,
                limit,
            });
        }
        Ok(())
    }

    /// Serializes to the dynamic-map wire form.
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("WorkerMessage always serializes")
    }

    /// Deserializes from the dynamic-map wire form.
    pub fn from_dict(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// A response received from a worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResponse {
    /// Echoes the request's message type (or `Error` on failure).
    pub msg_type: MessageType,
    /// Echoes the request's sequence number.
    pub seq_no: u64,
    /// Echoes the request's correlation id unchanged.
    pub correlation_id: String,
    /// Whether the handler completed successfully.
    pub success: bool,
    /// Response timestamp (unix seconds, fractional).
    pub timestamp: f64,
    /// Human-readable error message, set only when `success` is false.
    #[serde(default)]
    pub error: Option<String>,
    /// Numeric error code, set only when `success` is false.
    #[serde(default)]
    pub error_code: Option<i32>,
    /// Structured payload, message-type specific.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Name of a shared-memory handle holding a large result, if any.
    #[serde(default)]
    pub shared_memory_name: Option<String>,
    /// Wall-clock time the handler took to produce this response.
    pub processing_time_ms: f64,
}

impl WorkerResponse {
    /// Builds a successful response.
    pub fn ok(
        request: &WorkerMessage,
        result_type: MessageType,
        payload: serde_json::Value,
        processing_time_ms: f64,
    ) -> Self {
        Self {
            msg_type: result_type,
            seq_no: request.seq_no,
            correlation_id: request.correlation_id.clone(),
            success: true,
            timestamp: unix_timestamp_secs(),
            error: None,
            error_code: None,
            payload,
            shared_memory_name: None,
            processing_time_ms,
        }
    }

    /// Builds an error response, preserving correlation with `request`.
    pub fn error(request: &WorkerMessage, message: impl Into<String>, code: i32) -> Self {
        Self {
            msg_type: MessageType::Error,
            seq_no: request.seq_no,
            correlation_id: request.correlation_id.clone(),
            success: false,
            timestamp: unix_timestamp_secs(),
            error: Some(message.into()),
            error_code: Some(code),
            payload: serde_json::Value::Null,
            shared_memory_name: None,
            processing_time_ms: 0.0,
        }
    }

    /// Attaches a shared-memory handle name carrying the large result.
    pub fn with_shared_memory(mut self, handle: impl Into<String>) -> Self {
        self.shared_memory_name = Some(handle.into());
        self
    }

    /// Serializes to the dynamic-map wire form.
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("WorkerResponse always serializes")
    }

    /// Deserializes from the dynamic-map wire form.
    pub fn from_dict(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

fn unix_timestamp_secs() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn envelope_codec_identity() {
        let req = WorkerMessage::new(
            MessageType::ImageDecode,
            7,
            "corr-1",
            WorkerKind::Image,
            serde_json::json!({"path": "/tmp/a.png"}),
        );
        let round_tripped = WorkerMessage::from_dict(req.to_dict()).unwrap();
        assert_eq!(round_tripped.msg_type, req.msg_type);
        assert_eq!(round_tripped.seq_no, req.seq_no);
        assert_eq!(round_tripped.correlation_id, req.correlation_id);
        assert_eq!(round_tripped.payload, req.payload);
    }

    #[test]
    fn response_round_trips_correlation_and_seq() {
        let req = WorkerMessage::new(
            MessageType::FftFrame,
            42,
            "corr-xyz",
            WorkerKind::Fft,
            serde_json::json!({}),
        );
        let resp = WorkerResponse::ok(&req, MessageType::FftBars, serde_json::json!({"bars": []}), 1.5);
        assert_eq!(resp.correlation_id, req.correlation_id);
        assert_eq!(resp.seq_no, req.seq_no);

        let round_tripped = WorkerResponse::from_dict(resp.to_dict()).unwrap();
        assert_eq!(round_tripped.correlation_id, resp.correlation_id);
        assert_eq!(round_tripped.seq_no, resp.seq_no);
    }

    #[test]
    fn rejects_oversized_fft_payload() {
        let big = "x".repeat(70 * 1024);
        let req = WorkerMessage::new(
            MessageType::FftFrame,
            1,
            "corr",
            WorkerKind::Fft,
            serde_json::json!({ "blob": big }),
        );
        assert!(req.validate_size().is_err());
    }
}
