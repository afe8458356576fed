//! Per-host request spacing and the global Reddit token bucket
//! (spec.md §4.I "RSS worker").

use std::collections::HashMap;
use std::time::{Duration, Instant};
use worker_protocol::rss::{host_cooldown, REDDIT_BUCKET_PER_MINUTE};

/// Enforces the minimum delay between requests to the same host.
pub struct HostRateLimiter {
    last_request: HashMap<String, Instant>,
}

impl HostRateLimiter {
    /// Creates a limiter with no recorded history.
    pub fn new() -> Self {
        Self { last_request: HashMap::new() }
    }

    /// Blocks the calling thread until `host`'s cooldown has elapsed since
    /// its last request, then records this request's time.
    pub fn wait_and_record(&mut self, host: &str) {
        let cooldown = host_cooldown(host);
        if let Some(&last) = self.last_request.get(host) {
            let elapsed = last.elapsed();
            if elapsed < cooldown {
                std::thread::sleep(cooldown - elapsed);
            }
        }
        self.last_request.insert(host.to_string(), Instant::now());
    }
}

impl Default for HostRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Relative priority of a caller consulting the global Reddit token
/// bucket. `High` (widget) traffic reserves quota ahead of time and never
/// skips; `Normal` (RSS) traffic yields to outstanding reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitPriority {
    Normal,
    High,
}

/// Global Reddit token bucket, refilling continuously up to
/// `REDDIT_BUCKET_PER_MINUTE` tokens/minute. Namespaced reservations let a
/// high-priority caller (e.g. the desktop widget) carve out tokens ahead of
/// use so a concurrent RSS refresh can't consume them underneath it.
pub struct RedditTokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
    reserved: HashMap<String, u32>,
}

impl RedditTokenBucket {
    /// Creates a bucket that starts full.
    pub fn new() -> Self {
        let capacity = REDDIT_BUCKET_PER_MINUTE as f64;
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: capacity / 60.0,
            last_refill: Instant::now(),
            reserved: HashMap::new(),
        }
    }

    fn refill(&mut self) {
        let elapsed = self.last_refill.elapsed().as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = Instant::now();
    }

    fn reserved_total(&self) -> f64 {
        self.reserved.values().sum::<u32>() as f64
    }

    /// Reserves `count` tokens for `namespace` ahead of use. Returns `false`
    /// without reserving anything if fewer than `count` tokens are free
    /// once existing reservations are accounted for.
    pub fn reserve(&mut self, count: u32, namespace: &str) -> bool {
        self.refill();
        let available = self.tokens - self.reserved_total();
        if f64::from(count) > available {
            return false;
        }
        *self.reserved.entry(namespace.to_string()).or_insert(0) += count;
        true
    }

    /// Releases up to `count` previously reserved tokens for `namespace`.
    pub fn release(&mut self, count: u32, namespace: &str) {
        if let Some(current) = self.reserved.get_mut(namespace) {
            *current = current.saturating_sub(count);
            if *current == 0 {
                self.reserved.remove(namespace);
            }
        }
    }

    /// Whether a caller at `priority` should skip this Reddit call entirely
    /// to preserve quota reserved by a higher-priority namespace. `High`
    /// priority callers never skip.
    pub fn should_skip_for_quota(&mut self, priority: RateLimitPriority) -> bool {
        if priority == RateLimitPriority::High {
            return false;
        }
        self.refill();
        self.tokens - 1.0 - self.reserved_total() < 0.0
    }

    /// Blocks up to `max_wait` for one token at `priority`, returning
    /// whether it acquired one. `Normal` priority respects reservations
    /// made by other namespaces; `High` priority draws from the full pool.
    pub fn acquire(&mut self, max_wait: Duration, priority: RateLimitPriority) -> bool {
        let deadline = Instant::now() + max_wait;
        loop {
            self.refill();
            let headroom = match priority {
                RateLimitPriority::High => self.tokens,
                RateLimitPriority::Normal => self.tokens - self.reserved_total(),
            };
            if headroom >= 1.0 {
                self.tokens -= 1.0;
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

impl Default for RedditTokenBucket {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_starts_full_and_then_refuses() {
        let mut bucket = RedditTokenBucket::new();
        for _ in 0..REDDIT_BUCKET_PER_MINUTE {
            assert!(bucket.acquire(Duration::from_millis(10), RateLimitPriority::Normal));
        }
        assert!(!bucket.acquire(Duration::from_millis(10), RateLimitPriority::Normal));
    }

    #[test]
    fn host_limiter_delays_second_request_to_same_host() {
        let mut limiter = HostRateLimiter::new();
        limiter.wait_and_record("old.reddit.com");
        let started = Instant::now();
        limiter.wait_and_record("old.reddit.com");
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[test]
    fn widget_reservation_preempts_normal_priority() {
        let mut bucket = RedditTokenBucket::new();
        let capacity = REDDIT_BUCKET_PER_MINUTE;
        assert!(bucket.reserve(capacity, "widget"));
        assert!(bucket.should_skip_for_quota(RateLimitPriority::Normal));
        assert!(!bucket.acquire(Duration::from_millis(10), RateLimitPriority::Normal));
        assert!(bucket.acquire(Duration::from_millis(10), RateLimitPriority::High));
    }

    #[test]
    fn release_frees_reserved_quota_back_to_normal_priority() {
        let mut bucket = RedditTokenBucket::new();
        let capacity = REDDIT_BUCKET_PER_MINUTE;
        assert!(bucket.reserve(capacity, "widget"));
        bucket.release(capacity, "widget");
        assert!(bucket.acquire(Duration::from_millis(10), RateLimitPriority::Normal));
    }
}
