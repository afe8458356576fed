//! Dispatches `FftConfig`/`FftFrame` requests (spec.md §4.I "FFT worker").

use crate::config::FftConfig;
use crate::pipeline::FftState;
use worker_protocol::{MessageType, WorkerMessage};
use worker_runtime::{HandledResponse, HandlerError, WorkerHandler};

/// Holds the running smoother state and tuning config between frames.
pub struct FftHandler {
    config: FftConfig,
    state: FftState,
}

impl FftHandler {
    /// Creates a handler with default tuning and fresh smoother state.
    pub fn new() -> Self {
        let config = FftConfig::default();
        let mut state = FftState::new();
        state.reset(config.bars);
        Self { config, state }
    }
}

impl Default for FftHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerHandler for FftHandler {
    fn handle(&mut self, message: &WorkerMessage) -> Result<HandledResponse, HandlerError> {
        match message.msg_type {
            MessageType::FftConfig => {
                self.config.apply_update(&message.payload);
                self.state.reset(self.config.bars);
                Ok(HandledResponse::inline(MessageType::FftConfig, serde_json::json!({ "applied": true })))
            }
            MessageType::FftFrame => {
                let samples: Vec<f64> = message
                    .payload
                    .get("samples")
                    .and_then(|v| v.as_array())
                    .ok_or_else(|| HandlerError::new("missing field samples", 400))?
                    .iter()
                    .filter_map(|v| v.as_f64())
                    .collect();

                let output = self.state.compute_frame(&samples, &self.config);
                Ok(HandledResponse::inline(
                    MessageType::FftBars,
                    serde_json::json!({
                        "bars": output.bars,
                        "peaks": output.peaks,
                        "frame_count": output.frame_count,
                    }),
                ))
            }
            other => Err(HandlerError::new(format!("fft worker does not handle {other:?}"), 400)),
        }
    }

    fn emits_busy_idle(&self, msg_type: MessageType) -> bool {
        matches!(msg_type, MessageType::FftFrame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn config_update_resets_bar_count() {
        let mut handler = FftHandler::new();
        let message = WorkerMessage::new(
            MessageType::FftConfig,
            1,
            "corr",
            worker_protocol::WorkerKind::Fft,
            serde_json::json!({"bars": 8}),
        );
        handler.handle(&message).unwrap();
        assert_eq!(handler.config.bars, 8);
        assert_eq!(handler.state.compute_frame(&[0.0; 64], &handler.config.clone()).bars.len(), 8);
    }

    #[test]
    fn frame_without_samples_is_a_handler_error() {
        let mut handler = FftHandler::new();
        let message = WorkerMessage::new(
            MessageType::FftFrame,
            1,
            "corr",
            worker_protocol::WorkerKind::Fft,
            serde_json::json!({}),
        );
        assert!(handler.handle(&message).is_err());
    }

    #[test]
    fn quiet_frame_reports_bars_key() {
        let mut handler = FftHandler::new();
        let message = WorkerMessage::new(
            MessageType::FftFrame,
            1,
            "corr",
            worker_protocol::WorkerKind::Fft,
            serde_json::json!({"samples": vec![0.0_f64; 4410]}),
        );
        let response = handler.handle(&message).unwrap();
        assert!(response.payload.get("bars").is_some());
        assert_eq!(response.result_type, MessageType::FftBars);
    }
}
