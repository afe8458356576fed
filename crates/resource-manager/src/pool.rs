//! Bucketed object pools for pixmap/image surfaces (spec.md §4.C).
//!
//! Pools are keyed by exact `(width, height)` — there is no "close enough"
//! match. A bucket holds at most [`DEFAULT_POOL_CAP`] surfaces; anything
//! acquired beyond the cap is simply not returned to the pool on release
//! and is dropped normally.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Default maximum number of pooled surfaces kept per `(width, height)` bucket.
pub const DEFAULT_POOL_CAP: usize = 8;

/// Running hit/miss counters for a [`SurfacePool`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PoolStats {
    /// Acquisitions satisfied from a pooled surface.
    pub hits: u64,
    /// Acquisitions that allocated a new surface because none was pooled.
    pub misses: u64,
    /// Surfaces returned via `release`.
    pub releases: u64,
    /// Surfaces dropped on release because their bucket was already full.
    pub discarded_on_release: u64,
}

struct Inner<T> {
    buckets: HashMap<(u32, u32), Vec<T>>,
    cap_per_bucket: usize,
    stats: PoolStats,
}

/// A pool of same-shaped reusable surfaces, bucketed by exact `(width, height)`.
pub struct SurfacePool<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for SurfacePool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> SurfacePool<T> {
    /// Creates an empty pool with the given per-bucket cap.
    pub fn new(cap_per_bucket: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                buckets: HashMap::new(),
                cap_per_bucket,
                stats: PoolStats::default(),
            })),
        }
    }

    /// Takes a pooled surface of exactly `(width, height)` if one is
    /// available; otherwise calls `alloc` to create a fresh one. Returns
    /// whether the surface came from the pool alongside the surface itself.
    pub fn acquire(&self, width: u32, height: u32, alloc: impl FnOnce() -> T) -> T {
        let mut inner = self.inner.lock();
        if let Some(bucket) = inner.buckets.get_mut(&(width, height)) {
            if let Some(surface) = bucket.pop() {
                inner.stats.hits += 1;
                return surface;
            }
        }
        inner.stats.misses += 1;
        alloc()
    }

    /// Returns a surface to the pool for reuse at the given dimensions.
    /// Dropped (not pooled) if its bucket is already at capacity. Returns
    /// `true` when the surface was accepted into the pool, `false` when
    /// its bucket was full and the surface was discarded instead.
    pub fn release(&self, width: u32, height: u32, surface: T) -> bool {
        let mut inner = self.inner.lock();
        let cap = inner.cap_per_bucket;
        let bucket = inner.buckets.entry((width, height)).or_default();
        if bucket.len() < cap {
            bucket.push(surface);
            inner.stats.releases += 1;
            true
        } else {
            inner.stats.discarded_on_release += 1;
            false
        }
    }

    /// Current hit/miss/release counters.
    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats
    }

    /// Drops every pooled surface across all buckets.
    pub fn clear(&self) {
        self.inner.lock().buckets.clear();
    }
}

impl<T> Default for SurfacePool<T> {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn acquire_misses_then_hits_on_release() {
        let pool: SurfacePool<Vec<u8>> = SurfacePool::default();
        let surface = pool.acquire(64, 64, || vec![0u8; 64 * 64 * 4]);
        assert_eq!(pool.stats().misses, 1);
        pool.release(64, 64, surface);
        let _ = pool.acquire(64, 64, || panic!("should have reused pooled surface"));
        assert_eq!(pool.stats().hits, 1);
    }

    #[test]
    fn exact_size_match_only() {
        let pool: SurfacePool<Vec<u8>> = SurfacePool::default();
        let surface = pool.acquire(64, 64, Vec::new);
        pool.release(64, 64, surface);
        let mut allocated_fresh = false;
        let _ = pool.acquire(32, 32, || {
            allocated_fresh = true;
            Vec::new()
        });
        assert!(allocated_fresh, "differently sized bucket must not be reused");
    }

    #[test]
    fn bucket_cap_discards_excess_releases() {
        let pool: SurfacePool<u32> = SurfacePool::new(2);
        for i in 0..4 {
            pool.release(8, 8, i);
        }
        let stats = pool.stats();
        assert_eq!(stats.releases, 2);
        assert_eq!(stats.discarded_on_release, 2);
    }
}
