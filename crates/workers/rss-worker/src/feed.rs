//! Feed parsing and image-descriptor extraction (spec.md §4.I "RSS worker").

use serde::Serialize;
use std::hash::{Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};
use worker_protocol::rss::source_priority;

/// One image candidate surfaced from a feed entry.
#[derive(Debug, Clone, Serialize)]
pub struct ImageDescriptor {
    pub source_id: String,
    pub url: String,
    pub local_path: Option<String>,
    pub title: String,
    pub priority: u8,
    pub timestamp: f64,
}

/// Parses a raw RSS/Atom document and returns up to `max_items` image
/// descriptors, sorted by source priority (highest first).
pub fn parse_feed(bytes: &[u8], max_items: usize) -> Result<Vec<ImageDescriptor>, feed_rs::parser::ParseFeedError> {
    let feed = feed_rs::parser::parse(bytes)?;

    let mut descriptors: Vec<ImageDescriptor> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry.links.first()?.href.clone();
            let host = url_host(&link);
            let title = entry.title.map(|t| t.content).unwrap_or_default();
            Some(ImageDescriptor {
                source_id: hash_url(&link),
                url: link,
                local_path: None,
                title,
                priority: source_priority(&host),
                timestamp: unix_timestamp(),
            })
        })
        .collect();

    descriptors.sort_by(|a, b| b.priority.cmp(&a.priority));
    descriptors.truncate(max_items);
    Ok(descriptors)
}

/// Lowercased host component of a URL, `""` if it can't be parsed.
pub fn url_host(url: &str) -> String {
    url.split("//")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .unwrap_or("")
        .to_lowercase()
}

fn hash_url(url: &str) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    url.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn unix_timestamp() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Sample</title>
  <item><title>From Reddit</title><link>https://old.reddit.com/img/b.jpg</link></item>
  <item><title>From Bing</title><link>https://www.bing.com/img/a.jpg</link></item>
</channel></rss>"#;

    #[test]
    fn sorts_by_source_priority_descending() {
        let descriptors = parse_feed(SAMPLE_RSS.as_bytes(), 10).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].url, "https://www.bing.com/img/a.jpg");
        assert!(descriptors[0].priority > descriptors[1].priority);
    }

    #[test]
    fn truncates_to_max_items() {
        let descriptors = parse_feed(SAMPLE_RSS.as_bytes(), 1).unwrap();
        assert_eq!(descriptors.len(), 1);
    }

    #[test]
    fn url_host_lowercases_and_strips_path() {
        assert_eq!(url_host("https://WWW.Bing.com/a/b"), "www.bing.com");
    }
}
