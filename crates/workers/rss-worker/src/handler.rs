//! Dispatches `RssFetch`/`RssRefresh` requests (spec.md §4.I "RSS worker").

use crate::feed::{parse_feed, url_host, ImageDescriptor};
use crate::ratelimit::{HostRateLimiter, RateLimitPriority, RedditTokenBucket};
use std::time::Duration;
use worker_protocol::rss::source_priority;
use worker_protocol::{MessageType, WorkerMessage};
use worker_runtime::{HandledResponse, HandlerError, WorkerHandler};

const DEFAULT_MAX_ITEMS: usize = 20;
const REDDIT_BUCKET_WAIT: Duration = Duration::from_secs(30);

/// Fetches and parses feeds, applying per-host spacing and the Reddit
/// global token bucket ahead of each request.
pub struct RssHandler {
    client: reqwest::blocking::Client,
    host_limiter: HostRateLimiter,
    reddit_bucket: RedditTokenBucket,
}

impl RssHandler {
    /// Creates a handler with a fresh client and empty rate-limit state.
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            host_limiter: HostRateLimiter::new(),
            reddit_bucket: RedditTokenBucket::new(),
        }
    }

    /// Reserves Reddit quota for a higher-priority namespace (e.g. a
    /// desktop widget) ahead of its own fetches, so this worker's RSS
    /// refreshes yield to it. See [`RedditTokenBucket::reserve`].
    pub fn reserve_reddit_quota(&mut self, count: u32, namespace: &str) -> bool {
        self.reddit_bucket.reserve(count, namespace)
    }

    /// Releases quota previously reserved with [`Self::reserve_reddit_quota`].
    pub fn release_reddit_quota(&mut self, count: u32, namespace: &str) {
        self.reddit_bucket.release(count, namespace);
    }

    fn fetch_one(&mut self, url: &str, max_items: usize) -> Result<Vec<ImageDescriptor>, HandlerError> {
        let host = url_host(url);
        if host.contains("reddit.") {
            if self.reddit_bucket.should_skip_for_quota(RateLimitPriority::Normal) {
                return Err(HandlerError::new(
                    format!("skipping {url}: reddit quota reserved for higher-priority callers"),
                    429,
                ));
            }
            if !self.reddit_bucket.acquire(REDDIT_BUCKET_WAIT, RateLimitPriority::Normal) {
                return Err(HandlerError::new(format!("reddit token bucket exhausted for {url}"), 429));
            }
        }
        self.host_limiter.wait_and_record(&host);

        let bytes = self
            .client
            .get(url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(|resp| resp.bytes())
            .map_err(|err| HandlerError::new(format!("fetch {url} failed: {err}"), 2))?;

        parse_feed(&bytes, max_items).map_err(|err| HandlerError::new(format!("parse {url} failed: {err}"), 3))
    }
}

impl Default for RssHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerHandler for RssHandler {
    fn handle(&mut self, message: &WorkerMessage) -> Result<HandledResponse, HandlerError> {
        match message.msg_type {
            MessageType::RssFetch => {
                let url = message
                    .payload
                    .get("url")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| HandlerError::new("missing field url", 400))?
                    .to_string();
                let max_items = message
                    .payload
                    .get("max_items")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(DEFAULT_MAX_ITEMS as u64) as usize;

                let items = self.fetch_one(&url, max_items)?;
                Ok(HandledResponse::inline(MessageType::RssResult, serde_json::json!({ "items": items })))
            }
            MessageType::RssRefresh => {
                let urls: Vec<String> = message
                    .payload
                    .get("urls")
                    .and_then(|v| v.as_array())
                    .ok_or_else(|| HandlerError::new("missing field urls", 400))?
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                let max_items = message
                    .payload
                    .get("max_items")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(DEFAULT_MAX_ITEMS as u64) as usize;

                let mut ordered = urls;
                ordered.sort_by_key(|url| std::cmp::Reverse(source_priority(&url_host(url))));

                let mut all = Vec::new();
                for url in &ordered {
                    match self.fetch_one(url, max_items) {
                        Ok(mut items) => all.append(&mut items),
                        Err(err) => tracing::warn!(url = %url, error = %err, "feed refresh skipped a failing feed"),
                    }
                }
                Ok(HandledResponse::inline(MessageType::RssResult, serde_json::json!({ "items": all })))
            }
            other => Err(HandlerError::new(format!("rss worker does not handle {other:?}"), 400)),
        }
    }

    fn emits_busy_idle(&self, msg_type: MessageType) -> bool {
        matches!(msg_type, MessageType::RssRefresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_message_type_is_rejected() {
        let mut handler = RssHandler::new();
        let message = WorkerMessage::new(
            MessageType::FftFrame,
            1,
            "corr",
            worker_protocol::WorkerKind::Rss,
            serde_json::json!({}),
        );
        assert!(handler.handle(&message).is_err());
    }

    #[test]
    fn fetch_without_url_is_a_handler_error() {
        let mut handler = RssHandler::new();
        let message = WorkerMessage::new(
            MessageType::RssFetch,
            1,
            "corr",
            worker_protocol::WorkerKind::Rss,
            serde_json::json!({}),
        );
        let err = handler.handle(&message).unwrap_err();
        assert_eq!(err.code, 400);
    }
}
