//! Dispatches `ImageDecode`/`ImagePrescale` requests (spec.md §4.I "Image
//! worker").

use crate::resize::{prescale, DisplayMode};
use crate::shm::ShmStore;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use worker_protocol::{MessageType, WorkerMessage};
use worker_runtime::{HandledResponse, HandlerError, WorkerHandler};

/// Results at or above this size are delivered via shared memory instead
/// of inline, base64-encoded payload (spec.md §4.I).
const SHARED_MEMORY_THRESHOLD: usize = 2 * 1024 * 1024;

/// Decodes and prescales images on request, keeping every shared-memory
/// segment it has handed out alive until evicted.
pub struct ImageHandler {
    shm: ShmStore,
}

impl ImageHandler {
    /// Creates a handler with an empty shared-memory store.
    pub fn new() -> Self {
        Self { shm: ShmStore::new() }
    }

    fn decode_path(&self, path: &str) -> Result<image::DynamicImage, HandlerError> {
        image::open(path).map_err(|err| HandlerError::new(format!("failed to decode {path}: {err}"), 1))
    }

    fn deliver(
        &mut self,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        cache_key: String,
    ) -> Result<HandledResponse, HandlerError> {
        let mut payload = serde_json::json!({
            "width": width,
            "height": height,
            "format": "RGBA8",
            "cache_key": cache_key,
        });

        if pixels.len() >= SHARED_MEMORY_THRESHOLD {
            let handle = self
                .shm
                .store_rgba(width, height, &pixels)
                .map_err(|err| HandlerError::new(err.to_string(), 2))?;
            Ok(HandledResponse::with_shared_memory(MessageType::ImageResult, payload, handle))
        } else {
            payload["data"] = serde_json::Value::String(STANDARD.encode(&pixels));
            Ok(HandledResponse::inline(MessageType::ImageResult, payload))
        }
    }

    fn required_str<'a>(payload: &'a serde_json::Value, field: &'static str) -> Result<&'a str, HandlerError> {
        payload
            .get(field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| HandlerError::new(format!("missing field {field}"), 400))
    }

    fn required_u32(payload: &serde_json::Value, field: &'static str) -> Result<u32, HandlerError> {
        payload
            .get(field)
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
            .ok_or_else(|| HandlerError::new(format!("missing field {field}"), 400))
    }
}

impl Default for ImageHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerHandler for ImageHandler {
    fn handle(&mut self, message: &WorkerMessage) -> Result<HandledResponse, HandlerError> {
        match message.msg_type {
            MessageType::ImageDecode => {
                let path = Self::required_str(&message.payload, "path")?;
                let decoded = self.decode_path(path)?.to_rgba8();
                let (width, height) = decoded.dimensions();
                self.deliver(width, height, decoded.into_raw(), path.to_string())
            }
            MessageType::ImagePrescale => {
                let path = Self::required_str(&message.payload, "path")?;
                let target_w = Self::required_u32(&message.payload, "target_w")?;
                let target_h = Self::required_u32(&message.payload, "target_h")?;
                let mode = message
                    .payload
                    .get("mode")
                    .and_then(|v| v.as_str())
                    .and_then(DisplayMode::parse)
                    .unwrap_or(DisplayMode::Fit);

                let source = self.decode_path(path)?;
                let scaled = prescale(&source, target_w, target_h, mode);
                let cache_key = format!("{path}|scaled:{target_w}x{target_h}");
                self.deliver(target_w, target_h, scaled.into_raw(), cache_key)
            }
            other => Err(HandlerError::new(format!("image worker does not handle {other:?}"), 400)),
        }
    }

    fn emits_busy_idle(&self, msg_type: MessageType) -> bool {
        matches!(msg_type, MessageType::ImagePrescale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use pretty_assertions::assert_eq;

    fn write_png(path: &std::path::Path, w: u32, h: u32) {
        let img: ImageBuffer<Rgba<u8>, _> = ImageBuffer::from_pixel(w, h, Rgba([10, 20, 30, 255]));
        img.save(path).expect("writing fixture png");
    }

    #[test]
    fn decode_returns_inline_payload_for_small_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_png(&path, 8, 8);

        let mut handler = ImageHandler::new();
        let message = WorkerMessage::new(
            MessageType::ImageDecode,
            1,
            "corr",
            worker_protocol::WorkerKind::Image,
            serde_json::json!({"path": path.to_str().unwrap()}),
        );
        let response = handler.handle(&message).unwrap();
        assert_eq!(response.result_type, MessageType::ImageResult);
        assert_eq!(response.payload["width"], 8);
        assert!(response.shared_memory_name.is_none());
        assert!(response.payload.get("data").is_some());
    }

    #[test]
    fn prescale_fill_reports_requested_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.png");
        write_png(&path, 400, 100);

        let mut handler = ImageHandler::new();
        let message = WorkerMessage::new(
            MessageType::ImagePrescale,
            1,
            "corr",
            worker_protocol::WorkerKind::Image,
            serde_json::json!({"path": path.to_str().unwrap(), "target_w": 50, "target_h": 50, "mode": "fill"}),
        );
        let response = handler.handle(&message).unwrap();
        assert_eq!(response.payload["width"], 50);
        assert_eq!(response.payload["height"], 50);
        assert_eq!(response.payload["cache_key"], path.to_str().unwrap().to_string() + "|scaled:50x50");
    }

    #[test]
    fn missing_path_is_a_handler_error() {
        let mut handler = ImageHandler::new();
        let message = WorkerMessage::new(
            MessageType::ImageDecode,
            1,
            "corr",
            worker_protocol::WorkerKind::Image,
            serde_json::json!({}),
        );
        assert!(handler.handle(&message).is_err());
    }
}
