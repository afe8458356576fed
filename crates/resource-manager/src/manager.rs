//! Core resource registry and deterministic, group-ordered cleanup
//! (spec.md §4.C).
//!
//! Design Notes §9 calls out that a language without weak references plus
//! finalizers needs an explicit "observe" API the owner calls on
//! destruction, with an exactly-once cleanup flag. The idiomatic Rust
//! substitute for that explicit call is RAII: [`register`] returns a
//! [`ResourceGuard`] whose `Drop` impl performs the observe call, so a
//! resource dropped by its owner is finalised exactly as reliably as one
//! explicitly unregistered or swept by `cleanup_all`.

use crate::error::Error;
use crate::kind::{CleanupGroup, ResourceKind, CLEANUP_ORDER};
use crate::pool::{PoolStats, SurfacePool};
use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

new_key_type! {
    /// Opaque identifier for a registered resource.
    pub struct ResourceId;
}

type CleanupHandler = Box<dyn FnMut() + Send>;

struct Record {
    kind: ResourceKind,
    description: String,
    group: CleanupGroup,
    handler: Option<CleanupHandler>,
    cleaned: bool,
    ref_count: u32,
    created_at: Instant,
    last_access: Instant,
    /// Strong keepalive for resources (e.g. temp files) that must not be
    /// dropped before their own cleanup handler runs.
    _keepalive: Option<Box<dyn std::any::Any + Send>>,
}

/// A point-in-time snapshot of a resource record, returned by [`ResourceManager::get`].
#[derive(Debug, Clone)]
pub struct ResourceInfo {
    /// The resource's kind tag.
    pub kind: ResourceKind,
    /// Human description supplied at registration.
    pub description: String,
    /// The cleanup group this resource's kind maps to.
    pub group: CleanupGroup,
    /// Current reference count.
    pub ref_count: u32,
    /// Whether cleanup has already run.
    pub cleaned: bool,
    /// Time since registration.
    pub age: Duration,
}

#[derive(Default)]
struct Inner {
    records: SlotMap<ResourceId, Record>,
    shutting_down: bool,
}

/// Single registry of every owned resource; the only component allowed to
/// destroy them.
#[derive(Clone)]
pub struct ResourceManager {
    inner: Arc<Mutex<Inner>>,
    pixmap_pool: SurfacePool<Vec<u8>>,
    image_pool: SurfacePool<Vec<u8>>,
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceManager {
    /// Creates an empty resource manager.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            pixmap_pool: SurfacePool::default(),
            image_pool: SurfacePool::default(),
        }
    }

    /// Registers a resource with an explicit cleanup handler.
    ///
    /// Fails with [`Error::InvalidArgument`] if no handler is supplied,
    /// and [`Error::ShuttingDown`] once `cleanup_all` has begun.
    pub fn register(
        &self,
        kind: ResourceKind,
        description: impl Into<String>,
        handler: Option<CleanupHandler>,
    ) -> Result<(ResourceId, ResourceGuard), Error> {
        let Some(handler) = handler else {
            return Err(Error::InvalidArgument);
        };
        let mut inner = self.inner.lock();
        if inner.shutting_down {
            return Err(Error::ShuttingDown);
        }
        let now = Instant::now();
        let group = kind.cleanup_group();
        let id = inner.records.insert(Record {
            kind,
            description: description.into(),
            group,
            handler: Some(handler),
            cleaned: false,
            ref_count: 1,
            created_at: now,
            last_access: now,
            _keepalive: None,
        });
        debug!(?kind, group = ?group, "resource registered");
        Ok((
            id,
            ResourceGuard {
                manager: self.clone(),
                id,
                disarmed: false,
            },
        ))
    }

    /// Convenience registration for a UI widget: cleanup is caller-defined
    /// but expected to attempt "delete later" then "close", per spec.md §4.C.
    pub fn register_qt(
        &self,
        description: impl Into<String>,
        cleanup: impl FnMut() + Send + 'static,
    ) -> Result<(ResourceId, ResourceGuard), Error> {
        self.register(ResourceKind::GuiComponent, description, Some(Box::new(cleanup)))
    }

    /// Registers a temporary file, keeping a strong reference to its path
    /// so it is not dropped prematurely; cleanup deletes the file when
    /// `delete` is true.
    pub fn register_temp_file(
        &self,
        path: std::path::PathBuf,
        delete: bool,
        description: impl Into<String>,
    ) -> Result<(ResourceId, ResourceGuard), Error> {
        let cleanup_path = path.clone();
        let handler: CleanupHandler = Box::new(move || {
            if delete {
                if let Err(err) = std::fs::remove_file(&cleanup_path) {
                    warn!(path = %cleanup_path.display(), %err, "temp file cleanup failed");
                }
            }
        });
        let mut inner = self.inner.lock();
        if inner.shutting_down {
            return Err(Error::ShuttingDown);
        }
        let now = Instant::now();
        let id = inner.records.insert(Record {
            kind: ResourceKind::FileHandle,
            description: description.into(),
            group: ResourceKind::FileHandle.cleanup_group(),
            handler: Some(handler),
            cleaned: false,
            ref_count: 1,
            created_at: now,
            last_access: now,
            _keepalive: Some(Box::new(path)),
        });
        Ok((
            id,
            ResourceGuard {
                manager: self.clone(),
                id,
                disarmed: false,
            },
        ))
    }

    fn register_gl(
        &self,
        description: impl Into<String>,
        handle: u32,
        delete: impl Fn(u32) + Send + 'static,
    ) -> Result<(ResourceId, ResourceGuard), Error> {
        self.register(
            ResourceKind::NativeGlHandle,
            description,
            Some(Box::new(move || delete(handle))),
        )
    }

    /// Registers a GL texture handle with its deletion function.
    pub fn register_gl_texture(
        &self,
        handle: u32,
        delete: impl Fn(u32) + Send + 'static,
    ) -> Result<(ResourceId, ResourceGuard), Error> {
        self.register_gl(format!("gl texture {handle}"), handle, delete)
    }

    /// Registers a GL vertex buffer object handle with its deletion function.
    pub fn register_gl_vbo(
        &self,
        handle: u32,
        delete: impl Fn(u32) + Send + 'static,
    ) -> Result<(ResourceId, ResourceGuard), Error> {
        self.register_gl(format!("gl vbo {handle}"), handle, delete)
    }

    /// Registers a GL vertex array object handle with its deletion function.
    pub fn register_gl_vao(
        &self,
        handle: u32,
        delete: impl Fn(u32) + Send + 'static,
    ) -> Result<(ResourceId, ResourceGuard), Error> {
        self.register_gl(format!("gl vao {handle}"), handle, delete)
    }

    /// Registers a GL shader program handle with its deletion function.
    pub fn register_gl_program(
        &self,
        handle: u32,
        delete: impl Fn(u32) + Send + 'static,
    ) -> Result<(ResourceId, ResourceGuard), Error> {
        self.register_gl(format!("gl program {handle}"), handle, delete)
    }

    /// Returns a snapshot of the resource's metadata, refreshing its
    /// last-access timestamp.
    pub fn get(&self, id: ResourceId) -> Option<ResourceInfo> {
        let mut inner = self.inner.lock();
        let record = inner.records.get_mut(id)?;
        record.last_access = Instant::now();
        Some(ResourceInfo {
            kind: record.kind,
            description: record.description.clone(),
            group: record.group,
            ref_count: record.ref_count,
            cleaned: record.cleaned,
            age: record.created_at.elapsed(),
        })
    }

    /// Increments a resource's reference count (additional owner).
    pub fn retain(&self, id: ResourceId) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        let record = inner.records.get_mut(id).ok_or(Error::NotFound(id))?;
        record.ref_count += 1;
        Ok(())
    }

    /// Runs cleanup and removes the mapping. Fails with [`Error::InUse`]
    /// when `force` is false and the reference count exceeds one.
    pub fn unregister(&self, id: ResourceId, force: bool) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        let record = inner.records.get_mut(id).ok_or(Error::NotFound(id))?;
        if !force && record.ref_count > 1 {
            return Err(Error::InUse(id));
        }
        run_cleanup_once(record);
        let _ = inner.records.remove(id);
        Ok(())
    }

    /// Idempotently cleans up every still-registered resource, walking
    /// groups in the order `qt -> network -> cache -> filesystem -> other`
    /// (spec.md §4.C invariant ii). After this call, further registrations
    /// fail with [`Error::ShuttingDown`].
    pub fn cleanup_all(&self) {
        let mut inner = self.inner.lock();
        inner.shutting_down = true;
        for &group in &CLEANUP_ORDER {
            let ids: Vec<ResourceId> = inner
                .records
                .iter()
                .filter(|(_, r)| r.group == group && !r.cleaned)
                .map(|(id, _)| id)
                .collect();
            for id in ids {
                if let Some(record) = inner.records.get_mut(id) {
                    run_cleanup_once(record);
                }
            }
        }
    }

    /// Takes a pixmap-shaped byte buffer of exactly `width * height * 4`
    /// bytes from the pool, or allocates a fresh zeroed one.
    pub fn acquire_pixmap(&self, width: u32, height: u32) -> Vec<u8> {
        let len = width as usize * height as usize * 4;
        self.pixmap_pool.acquire(width, height, || vec![0u8; len])
    }

    /// Returns a pixmap buffer to the pool for reuse. Returns `true` when
    /// accepted into the pool, `false` when the bucket was already full.
    pub fn release_pixmap(&self, width: u32, height: u32, buffer: Vec<u8>) -> bool {
        self.pixmap_pool.release(width, height, buffer)
    }

    /// Hit/miss/release counters for the pixmap pool.
    pub fn pixmap_pool_stats(&self) -> PoolStats {
        self.pixmap_pool.stats()
    }

    /// Takes a decoded-image-shaped byte buffer of exactly
    /// `width * height * 4` bytes from the pool, or allocates a fresh
    /// zeroed one.
    pub fn acquire_image(&self, width: u32, height: u32) -> Vec<u8> {
        let len = width as usize * height as usize * 4;
        self.image_pool.acquire(width, height, || vec![0u8; len])
    }

    /// Returns a decoded-image buffer to the pool for reuse. Returns `true`
    /// when accepted into the pool, `false` when the bucket was already
    /// full.
    pub fn release_image(&self, width: u32, height: u32, buffer: Vec<u8>) -> bool {
        self.image_pool.release(width, height, buffer)
    }

    /// Hit/miss/release counters for the decoded-image pool.
    pub fn image_pool_stats(&self) -> PoolStats {
        self.image_pool.stats()
    }

    /// Marks a single resource finalised because its RAII guard dropped,
    /// running its handler at most once. No-op if already cleaned or
    /// unregistered.
    fn finalize_from_guard(&self, id: ResourceId) {
        let mut inner = self.inner.lock();
        if let Some(record) = inner.records.get_mut(id) {
            run_cleanup_once(record);
        }
    }
}

fn run_cleanup_once(record: &mut Record) {
    if record.cleaned {
        return;
    }
    record.cleaned = true;
    if let Some(mut handler) = record.handler.take() {
        handler();
    }
}

/// RAII handle returned alongside a [`ResourceId`]; dropping it finalises
/// the resource exactly once if it has not already been cleaned up via
/// `unregister` or `cleanup_all`. Call [`ResourceGuard::disarm`] to hand
/// ownership of the cleanup moment to an explicit `unregister` call
/// instead.
pub struct ResourceGuard {
    manager: ResourceManager,
    id: ResourceId,
    disarmed: bool,
}

impl ResourceGuard {
    /// The id this guard observes.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Prevents this guard's `Drop` from finalising the resource; use when
    /// an explicit `unregister` call will handle cleanup instead.
    pub fn disarm(mut self) {
        self.disarmed = true;
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        if !self.disarmed {
            self.manager.finalize_from_guard(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn cleanup_runs_exactly_once_across_paths() {
        let manager = ResourceManager::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        let (id, guard) = manager
            .register(ResourceKind::Custom, "thing", Some(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })))
            .unwrap();

        manager.unregister(id, true).unwrap();
        drop(guard); // already cleaned by unregister; must not double-fire
        manager.cleanup_all(); // idempotent no-op

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn guard_drop_finalises_exactly_once() {
        let manager = ResourceManager::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let (_id, guard) = manager
            .register(ResourceKind::Thread, "worker thread", Some(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })))
            .unwrap();
        drop(guard);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cleanup_ordering_is_qt_network_cache_filesystem() {
        let manager = ResourceManager::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let kinds = [
            (ResourceKind::GuiComponent, "gui"),
            (ResourceKind::NetworkConnection, "network"),
            (ResourceKind::ImageCache, "cache"),
            (ResourceKind::FileHandle, "filesystem"),
        ];
        let mut guards = Vec::new();
        for (kind, tag) in kinds {
            let order = order.clone();
            let (_id, guard) = manager
                .register(kind, tag, Some(Box::new(move || order.lock().push(tag))))
                .unwrap();
            guards.push(guard);
        }
        manager.cleanup_all();

        let observed = order.lock().clone();
        assert_eq!(observed, vec!["gui", "network", "cache", "filesystem"]);
    }

    #[test]
    fn registration_after_shutdown_is_refused() {
        let manager = ResourceManager::new();
        manager.cleanup_all();
        let result = manager.register(ResourceKind::Custom, "late", Some(Box::new(|| {})));
        assert!(matches!(result, Err(Error::ShuttingDown)));
    }

    #[test]
    fn pixmap_pool_reuses_exact_size_buffers() {
        let manager = ResourceManager::new();
        let buf = manager.acquire_pixmap(16, 16);
        assert_eq!(buf.len(), 16 * 16 * 4);
        manager.release_pixmap(16, 16, buf);
        assert_eq!(manager.pixmap_pool_stats().misses, 1);
        let _ = manager.acquire_pixmap(16, 16);
        assert_eq!(manager.pixmap_pool_stats().hits, 1);
    }

    #[test]
    fn unregister_refuses_in_use_without_force() {
        let manager = ResourceManager::new();
        let (id, _guard) = manager
            .register(ResourceKind::Custom, "shared", Some(Box::new(|| {})))
            .unwrap();
        manager.retain(id).unwrap();
        assert!(matches!(manager.unregister(id, false), Err(Error::InUse(_))));
        assert!(manager.unregister(id, true).is_ok());
    }
}
