//! Shared constants for RSS image-source prioritisation (spec.md §4.I), so
//! the supervisor side and the `rss-worker` binary sort by the same table
//! instead of duplicating magic numbers (SPEC_FULL.md §10).

/// Priority weight for a given lowercase source host, falling back to the
/// default weight for unrecognised sources.
pub fn source_priority(host: &str) -> u8 {
    if host.contains("bing.") {
        95
    } else if host.contains("unsplash.") {
        90
    } else if host.contains("wikimedia.") {
        85
    } else if host.contains("nasa.") {
        75
    } else if host.contains("reddit.") {
        10
    } else {
        50
    }
}

/// Minimum delay between requests to the same host, per spec.md §4.I.
pub fn host_cooldown(host: &str) -> std::time::Duration {
    if host.contains("reddit.") {
        std::time::Duration::from_secs(4)
    } else {
        std::time::Duration::from_secs(2)
    }
}

/// Global Reddit token-bucket capacity: at most this many Reddit requests
/// per minute across all feeds, per spec.md §4.I.
pub const REDDIT_BUCKET_PER_MINUTE: u32 = 8;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn priorities_match_spec_table() {
        assert_eq!(source_priority("www.bing.com"), 95);
        assert_eq!(source_priority("unsplash.com"), 90);
        assert_eq!(source_priority("commons.wikimedia.org"), 85);
        assert_eq!(source_priority("images.nasa.gov"), 75);
        assert_eq!(source_priority("old.reddit.com"), 10);
        assert_eq!(source_priority("example.com"), 50);
    }
}
