//! Dispatches `TransitionPrecompute`/`ConfigUpdate` requests (spec.md §4.I
//! "Transition worker").

use crate::cache::{cache_key, TransitionCache};
use crate::config::TransitionConfig;
use crate::precompute::precompute;
use worker_protocol::{MessageType, WorkerMessage};
use worker_runtime::{HandledResponse, HandlerError, WorkerHandler};

pub struct TransitionHandler {
    config: TransitionConfig,
    cache: TransitionCache,
}

impl TransitionHandler {
    pub fn new() -> Self {
        Self { config: TransitionConfig::default(), cache: TransitionCache::new() }
    }

    fn handle_precompute(&mut self, message: &WorkerMessage) -> Result<HandledResponse, HandlerError> {
        let transition_type = message
            .payload
            .get("transition_type")
            .and_then(|v| v.as_str())
            .unwrap_or("Diffuse")
            .to_string();
        let empty_params = serde_json::Value::Object(serde_json::Map::new());
        let params = message.payload.get("params").unwrap_or(&empty_params);
        let use_cache = message.payload.get("use_cache").and_then(|v| v.as_bool()).unwrap_or(true);

        let key = cache_key(&transition_type, params);

        if use_cache {
            if let Some(cached) = self.cache.get(&key) {
                return Ok(HandledResponse::inline(
                    MessageType::TransitionResult,
                    serde_json::json!({
                        "transition_type": transition_type,
                        "cache_key": key,
                        "data": cached,
                        "cached": true,
                    }),
                ));
            }
        }

        let data = precompute(&transition_type, params, &self.config);
        self.cache.insert(key.clone(), data.clone());

        Ok(HandledResponse::inline(
            MessageType::TransitionResult,
            serde_json::json!({
                "transition_type": transition_type,
                "cache_key": key,
                "data": data,
                "cached": false,
            }),
        ))
    }

    fn handle_config(&mut self, message: &WorkerMessage) -> Result<HandledResponse, HandlerError> {
        self.config.apply_update(&message.payload);
        if message.payload.get("clear_cache").and_then(|v| v.as_bool()).unwrap_or(true) {
            self.cache.clear();
        }
        Ok(HandledResponse::inline(MessageType::ConfigUpdate, serde_json::json!({ "applied": true })))
    }
}

impl Default for TransitionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerHandler for TransitionHandler {
    fn handle(&mut self, message: &WorkerMessage) -> Result<HandledResponse, HandlerError> {
        match message.msg_type {
            MessageType::TransitionPrecompute => self.handle_precompute(message),
            MessageType::ConfigUpdate => self.handle_config(message),
            other => Err(HandlerError::new(format!("transition worker does not handle {other:?}"), 400)),
        }
    }

    fn emits_busy_idle(&self, msg_type: MessageType) -> bool {
        matches!(msg_type, MessageType::TransitionPrecompute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn precompute_message(transition_type: &str, params: serde_json::Value, use_cache: bool) -> WorkerMessage {
        WorkerMessage::new(
            MessageType::TransitionPrecompute,
            1,
            "corr",
            worker_protocol::WorkerKind::Transition,
            serde_json::json!({ "transition_type": transition_type, "params": params, "use_cache": use_cache }),
        )
    }

    #[test]
    fn second_identical_request_is_a_cache_hit() {
        let mut handler = TransitionHandler::new();
        let params = serde_json::json!({"block_size": 20, "seed": 123});

        let first = handler.handle(&precompute_message("Diffuse", params.clone(), true)).unwrap();
        assert_eq!(first.payload["cached"], false);

        let second = handler.handle(&precompute_message("Diffuse", params, true)).unwrap();
        assert_eq!(second.payload["cached"], true);
    }

    #[test]
    fn unknown_transition_type_is_not_precomputed_but_still_succeeds() {
        let mut handler = TransitionHandler::new();
        let response = handler.handle(&precompute_message("Dissolve", serde_json::json!({}), true)).unwrap();
        assert_eq!(response.payload["data"]["precomputed"], false);
    }

    #[test]
    fn config_update_clears_cache_by_default() {
        let mut handler = TransitionHandler::new();
        let params = serde_json::json!({"seed": 1});
        handler.handle(&precompute_message("Diffuse", params.clone(), true)).unwrap();

        let config_message = WorkerMessage::new(
            MessageType::ConfigUpdate,
            2,
            "corr",
            worker_protocol::WorkerKind::Transition,
            serde_json::json!({"block_cols": 10}),
        );
        handler.handle(&config_message).unwrap();

        let response = handler.handle(&precompute_message("Diffuse", params, true)).unwrap();
        assert_eq!(response.payload["cached"], false);
    }
}
