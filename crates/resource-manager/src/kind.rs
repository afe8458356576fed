//! Resource kind tags and the cleanup groups they fall into (spec.md §3).

/// The closed set of resource kinds the manager knows how to tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// An open OS file handle.
    FileHandle,
    /// A network connection (socket, HTTP keep-alive, etc.).
    NetworkConnection,
    /// A GUI widget/component owned by the UI layer.
    GuiComponent,
    /// A spawned OS or pool thread.
    Thread,
    /// A recurring or one-shot timer.
    Timer,
    /// A top-level window.
    Window,
    /// A worker thread pool.
    ThreadPool,
    /// A decoded-image cache entry.
    ImageCache,
    /// A temporary decoded image surface.
    TempImage,
    /// An in-flight network request.
    NetworkRequest,
    /// A native GL handle (texture, VBO, VAO, program).
    NativeGlHandle,
    /// Anything not covered by the above.
    Custom,
}

/// Deterministic shutdown ordering group a [`ResourceKind`] is cleaned up
/// under (spec.md §3 invariant ii: `qt -> network -> cache -> filesystem ->
/// other`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CleanupGroup {
    /// GUI components and anything Qt-flavoured.
    Qt,
    /// Network connections and requests.
    Network,
    /// Caches (image cache, decoded surfaces).
    Cache,
    /// Filesystem resources (temp files, file handles).
    Filesystem,
    /// Everything else.
    Other,
}

/// The cleanup groups in shutdown order.
pub const CLEANUP_ORDER: [CleanupGroup; 5] = [
    CleanupGroup::Qt,
    CleanupGroup::Network,
    CleanupGroup::Cache,
    CleanupGroup::Filesystem,
    CleanupGroup::Other,
];

impl ResourceKind {
    /// Derives this kind's cleanup group.
    pub fn cleanup_group(self) -> CleanupGroup {
        match self {
            ResourceKind::GuiComponent | ResourceKind::Window => CleanupGroup::Qt,
            ResourceKind::NetworkConnection | ResourceKind::NetworkRequest => CleanupGroup::Network,
            ResourceKind::ImageCache | ResourceKind::TempImage => CleanupGroup::Cache,
            ResourceKind::FileHandle => CleanupGroup::Filesystem,
            ResourceKind::Thread
            | ResourceKind::Timer
            | ResourceKind::ThreadPool
            | ResourceKind::NativeGlHandle
            | ResourceKind::Custom => CleanupGroup::Other,
        }
    }
}
