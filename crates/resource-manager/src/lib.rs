//! Registry and deterministic, group-ordered cleanup for every resource the
//! engine owns — GUI widgets, network connections, caches, files, threads,
//! timers, and GL handles — plus bucketed object pools for reusable
//! pixmap/image surfaces (spec.md §4.C).

pub mod error;
pub mod kind;
pub mod manager;
pub mod pool;

pub use error::Error;
pub use kind::{CleanupGroup, ResourceKind, CLEANUP_ORDER};
pub use manager::{ResourceGuard, ResourceId, ResourceInfo, ResourceManager};
pub use pool::{PoolStats, SurfacePool, DEFAULT_POOL_CAP};
