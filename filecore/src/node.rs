//! [`FileNode`] and its `DirectoryNode` refinement — spec.md §4.E.
//!
//! A node owns its [`AttributeCache`] slots and dispatches the tasks that
//! fill them. Identity and lifetime are managed by [`crate::registry::FileRegistry`]:
//! a node never stores a back-pointer to its parent (Design Notes, §9) —
//! `get_parent` re-resolves through the registry from the current location
//! every time, which also makes rename "just work" for parent lookups.

use std::sync::{Arc, Weak};
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::cache::{AttributeCache, CacheState, SlotId};
use crate::error::{Error, Result};
use crate::location::Location;
use crate::registry::FileRegistry;
use crate::task::runner::{Context, PoolRunner};
use crate::task::{spawn_task, Cancellable};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Regular,
    Directory,
}

/// A fully resolved attribute bundle, the `GFileInfo`-equivalent of §4.E.
#[derive(Clone, Debug)]
pub struct FileInfo {
    pub display_name: String,
    pub content_type: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub is_dir: bool,
    pub readonly: bool,
    pub filesystem_id: Option<u64>,
}

fn fetch_info(location: &Location, cancellable: &Cancellable) -> Result<FileInfo> {
    cancellable.check()?;
    let metadata = std::fs::symlink_metadata(location.path())?;
    cancellable.check()?;
    let content_type = if metadata.is_dir() {
        "inode/directory".to_string()
    } else {
        mime_guess::from_path(location.path())
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string())
    };
    Ok(FileInfo {
        display_name: location.basename(),
        content_type,
        size: metadata.len(),
        modified: metadata.modified().ok(),
        accessed: metadata.accessed().ok(),
        is_dir: metadata.is_dir(),
        readonly: metadata.permissions().readonly(),
        filesystem_id: file_id(&metadata),
    })
}

#[cfg(unix)]
fn file_id(metadata: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.dev())
}

#[cfg(not(unix))]
fn file_id(_metadata: &std::fs::Metadata) -> Option<u64> {
    None
}

type InfoWaiter = Box<dyn FnOnce(Result<FileInfo>) + Send>;
type ChildrenWaiter = Box<dyn FnOnce(Result<Vec<FileNode>>) + Send>;
type ThumbnailWaiter = Box<dyn FnOnce(Result<crate::thumbnail::ThumbnailState>) + Send>;
type DeepCountWaiter = Box<dyn FnOnce(Result<crate::operations::deep_count::DeepCount>) + Send>;

pub struct NodeInner {
    location: Mutex<Location>,
    kind: NodeKind,
    registry: Weak<FileRegistry>,
    cache: AttributeCache,
    info_slot: SlotId,
    children_slot: SlotId,
    thumbnail_slot: SlotId,
    deep_count_slot: SlotId,
    info_waiters: Mutex<Vec<InfoWaiter>>,
    children_waiters: Mutex<Vec<ChildrenWaiter>>,
    thumbnail_waiters: Mutex<Vec<ThumbnailWaiter>>,
    deep_count_waiters: Mutex<Vec<DeepCountWaiter>>,
    deep_count_task: Mutex<Option<crate::task::TaskHandle>>,
    renamed_listeners: Mutex<Vec<Box<dyn Fn(Location) + Send + Sync>>>,
    children_changed_listeners: Mutex<Vec<Box<dyn Fn() + Send + Sync>>>,
}

impl NodeInner {
    pub(crate) fn new(location: Location, kind: NodeKind, registry: Weak<FileRegistry>) -> Arc<Self> {
        let mut cache = AttributeCache::new();
        let info_slot = cache.install_slot();
        let children_slot = cache.install_slot();
        let thumbnail_slot = cache.install_slot();
        let deep_count_slot = cache.install_slot();
        Arc::new(NodeInner {
            location: Mutex::new(location),
            kind,
            registry,
            cache,
            info_slot,
            children_slot,
            thumbnail_slot,
            deep_count_slot,
            info_waiters: Mutex::new(Vec::new()),
            children_waiters: Mutex::new(Vec::new()),
            thumbnail_waiters: Mutex::new(Vec::new()),
            deep_count_waiters: Mutex::new(Vec::new()),
            deep_count_task: Mutex::new(None),
            renamed_listeners: Mutex::new(Vec::new()),
            children_changed_listeners: Mutex::new(Vec::new()),
        })
    }
}

impl Drop for NodeInner {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.forget(&self.location.lock());
        }
    }
}

/// The user-visible handle for a [`Location`]. Cheap to clone; all clones
/// share the same cache and identity.
#[derive(Clone)]
pub struct FileNode {
    pub(crate) inner: Arc<NodeInner>,
}

impl FileNode {
    pub(crate) fn from_inner(inner: Arc<NodeInner>) -> Self {
        FileNode { inner }
    }

    pub fn location(&self) -> Location {
        self.inner.location.lock().clone()
    }

    pub fn is_dir(&self) -> bool {
        self.inner.kind == NodeKind::Directory
    }

    /// True if `self` and `other` share the same underlying node identity
    /// (i.e. the registry handed back the same handle for both).
    pub fn is_same_node(&self, other: &FileNode) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn set_location(&self, location: Location) {
        *self.inner.location.lock() = location;
    }

    pub(crate) fn cache(&self) -> &AttributeCache {
        &self.inner.cache
    }

    pub(crate) fn info_slot(&self) -> SlotId {
        self.inner.info_slot
    }

    /// Resolves the parent purely from the current location, per Design
    /// Notes §9 — no back-pointer is ever stored.
    pub fn get_parent(&self) -> Option<FileNode> {
        let registry = self.inner.registry.upgrade()?;
        let parent_location = self.location().parent()?;
        Some(registry.get_or_create(parent_location, true))
    }

    pub fn on_renamed(&self, listener: impl Fn(Location) + Send + Sync + 'static) {
        self.inner.renamed_listeners.lock().push(Box::new(listener));
    }

    pub fn on_children_changed(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.inner.children_changed_listeners.lock().push(Box::new(listener));
    }

    pub(crate) fn emit_renamed(&self, new_location: Location) {
        for listener in self.inner.renamed_listeners.lock().iter() {
            listener(new_location.clone());
        }
    }

    pub(crate) fn emit_children_changed(&self) {
        for listener in self.inner.children_changed_listeners.lock().iter() {
            listener();
        }
    }

    pub(crate) fn invalidate_children(&self) {
        self.inner.cache.invalidate(self.inner.children_slot, false);
    }

    pub(crate) fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
    }

    /// Resolution of the "stale-while-pending" open question (§9): option
    /// (b), await the outstanding task. A call arriving while `Info` is
    /// `Pending` is queued as an extra waiter on the in-flight task rather
    /// than served stale or double-spawned.
    pub fn query_info(
        &self,
        pool: &PoolRunner,
        context: &Context,
        continuation: impl FnOnce(Result<FileInfo>) + Send + 'static,
    ) {
        let ctx = context.clone();
        let wrapped: InfoWaiter = Box::new(move |result| ctx.spawn(move || continuation(result)));

        match self.inner.cache.state(self.inner.info_slot) {
            CacheState::Valid => {
                let value = self.inner.cache.get_value::<FileInfo>(self.inner.info_slot);
                wrapped(value.ok_or_else(|| Error::Other("info slot valid but empty".into())));
            }
            CacheState::Pending => {
                self.inner.info_waiters.lock().push(wrapped);
            }
            CacheState::Invalid => {
                self.inner.info_waiters.lock().push(wrapped);
                self.inner.cache.set_pending(self.inner.info_slot);
                let node = self.clone();
                let location = self.location();
                spawn_task(
                    pool,
                    context,
                    move |cancellable| fetch_info(&location, cancellable),
                    move |result: Result<FileInfo>| node.finish_info(result),
                );
            }
        }
    }

    fn finish_info(&self, result: Result<FileInfo>) {
        match &result {
            Ok(info) => self.inner.cache.set_value(self.inner.info_slot, info.clone()),
            Err(_) => self.inner.cache.invalidate(self.inner.info_slot, true),
        }
        for waiter in self.inner.info_waiters.lock().drain(..) {
            waiter(result.clone());
        }
    }

    /// Dispatches a `RenameTask`, then re-keys through the [`crate::change_bus::ChangeBus`]
    /// on success and invalidates `Info` so the next `query_info` re-fetches.
    pub fn rename(
        &self,
        pool: &PoolRunner,
        context: &Context,
        bus: Arc<crate::change_bus::ChangeBus>,
        new_name: String,
        continuation: impl FnOnce(Result<Location>) + Send + 'static,
    ) {
        let node = self.clone();
        let old_location = self.location();
        spawn_task(
            pool,
            context,
            move |cancellable| {
                cancellable.check()?;
                let new_location = old_location
                    .parent()
                    .ok_or_else(|| Error::InvalidFilename("cannot rename a filesystem root".into()))?
                    .child(&new_name);
                std::fs::rename(old_location.path(), new_location.path())?;
                Ok(new_location)
            },
            move |result: Result<Location>| match result {
                Ok(new_location) => {
                    if let Some(registry) = node.inner.registry.upgrade() {
                        let _ = registry.rekey(&node, new_location.clone(), &bus);
                    }
                    continuation(Ok(new_location));
                }
                Err(e) => continuation(Err(e)),
            },
        );
    }

    /// Consults the `Thumbnail` slot; on miss or invalidation, runs the
    /// freedesktop-cache lookup / in-process decode / subprocess-fallback
    /// chain of §4.E on a worker.
    pub fn get_thumbnail(
        &self,
        pool: &PoolRunner,
        context: &Context,
        thumbnailer_command: Option<&[String]>,
        continuation: impl FnOnce(Result<crate::thumbnail::ThumbnailState>) + Send + 'static,
    ) {
        let ctx = context.clone();
        let wrapped: ThumbnailWaiter = Box::new(move |result| ctx.spawn(move || continuation(result)));

        match self.inner.cache.state(self.inner.thumbnail_slot) {
            CacheState::Valid => {
                let value = self.inner.cache.get_value::<crate::thumbnail::ThumbnailState>(self.inner.thumbnail_slot);
                wrapped(value.ok_or_else(|| Error::Other("thumbnail slot valid but empty".into())));
            }
            CacheState::Pending => {
                self.inner.thumbnail_waiters.lock().push(wrapped);
            }
            CacheState::Invalid => {
                self.inner.thumbnail_waiters.lock().push(wrapped);
                self.inner.cache.set_pending(self.inner.thumbnail_slot);
                let node = self.clone();
                let location = self.location();
                let command = thumbnailer_command.map(|c| c.to_vec());
                spawn_task(
                    pool,
                    context,
                    move |cancellable| crate::thumbnail::generate(&location, command.as_deref(), cancellable),
                    move |result| node.finish_thumbnail(result),
                );
            }
        }
    }

    fn finish_thumbnail(&self, result: Result<crate::thumbnail::ThumbnailState>) {
        match &result {
            Ok(state) => self.inner.cache.set_value(self.inner.thumbnail_slot, state.clone()),
            Err(_) => self.inner.cache.invalidate(self.inner.thumbnail_slot, true),
        }
        for waiter in self.inner.thumbnail_waiters.lock().drain(..) {
            waiter(result.clone());
        }
    }

    /// Recursive `{directory_count, file_count, unreadable_count,
    /// total_bytes}` tally for a directory (§4.G operation 8). Resolution
    /// of the deep-count-restart open question (§9): "cancel-and-restart
    /// on the next reader" — [`FileNode::refresh_deep_count`] cancels any
    /// in-flight tally and invalidates the slot; this method is what does
    /// the actual restarting, the next time it's called.
    pub fn get_deep_count(
        &self,
        pool: &PoolRunner,
        context: &Context,
        continuation: impl FnOnce(Result<crate::operations::deep_count::DeepCount>) + Send + 'static,
    ) {
        let ctx = context.clone();
        let wrapped: DeepCountWaiter = Box::new(move |result| ctx.spawn(move || continuation(result)));

        match self.inner.cache.state(self.inner.deep_count_slot) {
            CacheState::Valid => {
                let value = self
                    .inner
                    .cache
                    .get_value::<crate::operations::deep_count::DeepCount>(self.inner.deep_count_slot);
                wrapped(value.ok_or_else(|| Error::Other("deep-count slot valid but empty".into())));
            }
            CacheState::Pending => {
                self.inner.deep_count_waiters.lock().push(wrapped);
            }
            CacheState::Invalid => {
                self.inner.deep_count_waiters.lock().push(wrapped);
                self.inner.cache.set_pending(self.inner.deep_count_slot);
                let node = self.clone();
                let location = self.location();
                let handle = spawn_task(
                    pool,
                    context,
                    move |cancellable| crate::operations::deep_count::deep_count(location.path(), cancellable),
                    move |result| node.finish_deep_count(result),
                );
                *self.inner.deep_count_task.lock() = Some(handle);
            }
        }
    }

    fn finish_deep_count(&self, result: Result<crate::operations::deep_count::DeepCount>) {
        match &result {
            Ok(tally) => self.inner.cache.set_value(self.inner.deep_count_slot, tally.clone()),
            Err(_) => self.inner.cache.invalidate(self.inner.deep_count_slot, true),
        }
        for waiter in self.inner.deep_count_waiters.lock().drain(..) {
            waiter(result.clone());
        }
    }

    /// Invalidates the `DeepCount` slot and cancels any tally currently in
    /// flight; the next [`FileNode::get_deep_count`] call starts a fresh one.
    pub fn refresh_deep_count(&self) {
        self.inner.cache.invalidate(self.inner.deep_count_slot, false);
        if let Some(handle) = self.inner.deep_count_task.lock().take() {
            handle.cancel();
        }
    }
}

/// `DirectoryNode` refinement (§3: "Dispatch node"): every [`FileNode`] with
/// `NodeKind::Directory` can be viewed through this wrapper to reach
/// `enumerate_children`. Constructing one for a non-directory location is a
/// programmer error, caught with a debug assertion rather than threaded
/// through as a runtime error, since callers are expected to check `is_dir`
/// first (typically via the `Info` bundle).
pub struct DirectoryNode(FileNode);

impl DirectoryNode {
    pub fn new(node: FileNode) -> Self {
        debug_assert!(node.is_dir(), "DirectoryNode wraps a non-directory FileNode");
        DirectoryNode(node)
    }

    pub fn enumerate_children(
        &self,
        pool: &PoolRunner,
        context: &Context,
        continuation: impl FnOnce(Result<Vec<FileNode>>) + Send + 'static,
    ) {
        let node = self.0.clone();
        let ctx = context.clone();
        let wrapped: ChildrenWaiter = Box::new(move |result| ctx.spawn(move || continuation(result)));

        match node.inner.cache.state(node.inner.children_slot) {
            CacheState::Valid => {
                let value = node.inner.cache.get_value::<Vec<FileNode>>(node.inner.children_slot);
                wrapped(value.ok_or_else(|| Error::Other("children slot valid but empty".into())));
            }
            CacheState::Pending => {
                node.inner.children_waiters.lock().push(wrapped);
            }
            CacheState::Invalid => {
                node.inner.children_waiters.lock().push(wrapped);
                node.inner.cache.set_pending(node.inner.children_slot);
                let registry = node.inner.registry.clone();
                let parent = node.clone();
                spawn_task(
                    pool,
                    context,
                    move |cancellable| enumerate_dir(&parent.location(), cancellable),
                    move |result: Result<Vec<(Location, FileInfo)>>| {
                        finish_children(&node, registry, result);
                    },
                );
            }
        }
    }

    pub fn location(&self) -> Location {
        self.0.location()
    }

    pub fn as_file_node(&self) -> &FileNode {
        &self.0
    }
}

fn enumerate_dir(location: &Location, cancellable: &Cancellable) -> Result<Vec<(Location, FileInfo)>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(location.path())? {
        cancellable.check()?;
        let entry = entry?;
        let child_location = location.child(&entry.file_name().to_string_lossy());
        let info = fetch_info(&child_location, cancellable)?;
        out.push((child_location, info));
    }
    Ok(out)
}

/// Populates the parent's `Children` slot and each child's `Info` slot in
/// one pass, per §4.E — "so no second round-trip is required to display
/// them."
fn finish_children(parent: &FileNode, registry: Weak<FileRegistry>, result: Result<Vec<(Location, FileInfo)>>) {
    let outcome = result.and_then(|entries| {
        let registry = registry.upgrade().ok_or(Error::Cancelled)?;
        let mut children = Vec::with_capacity(entries.len());
        for (location, info) in entries {
            let child = registry.get_or_create(location, info.is_dir);
            child.inner.cache.set_pending(child.inner.info_slot);
            child.inner.cache.set_value(child.inner.info_slot, info);
            children.push(child);
        }
        Ok(children)
    });
    match &outcome {
        Ok(children) => parent.inner.cache.set_value(parent.inner.children_slot, children.clone()),
        Err(_) => parent.inner.cache.invalidate(parent.inner.children_slot, true),
    }
    for waiter in parent.inner.children_waiters.lock().drain(..) {
        waiter(outcome.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_bus::ChangeBus;
    use crate::registry::FileRegistry;
    use crate::task::runner::{Context, PoolRunner};

    fn harness() -> (Arc<FileRegistry>, Arc<PoolRunner>, Context) {
        (FileRegistry::new(), PoolRunner::named("node-tests", 4), Context::named("node-tests"))
    }

    #[test]
    fn query_info_resolves_display_name_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello world").unwrap();

        let (registry, pool, ctx) = harness();
        let node = registry.get_or_create(Location::from_path(&path), false);
        let (tx, rx) = std::sync::mpsc::channel();
        node.query_info(&pool, &ctx, move |result| tx.send(result).unwrap());
        let info = rx.recv_timeout(std::time::Duration::from_secs(2)).unwrap().unwrap();
        assert_eq!(info.display_name, "hello.txt");
        assert_eq!(info.size, 11);
    }

    #[test]
    fn enumerate_children_populates_child_info() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("child_1"), b"a").unwrap();
        std::fs::write(dir.path().join("child_2"), b"bb").unwrap();

        let (registry, pool, ctx) = harness();
        let node = registry.get_or_create(Location::from_path(dir.path()), true);
        let dir_node = DirectoryNode::new(node);
        let (tx, rx) = std::sync::mpsc::channel();
        dir_node.enumerate_children(&pool, &ctx, move |result| tx.send(result).unwrap());
        let mut children = rx.recv_timeout(std::time::Duration::from_secs(2)).unwrap().unwrap();
        children.sort_by_key(|c| c.location().basename());
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].location().basename(), "child_1");
        assert_eq!(children[0].inner.cache.state(children[0].inner.info_slot), CacheState::Valid);
    }

    #[test]
    fn rename_rekeys_and_invalidates_info() {
        let dir = tempfile::tempdir().unwrap();
        let child = dir.path().join("child_1");
        std::fs::write(&child, b"x").unwrap();

        let (registry, pool, ctx) = harness();
        let bus = ChangeBus::new(registry.clone());
        let node = registry.get_or_create(Location::from_path(&child), false);
        let changed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let parent = node.get_parent().unwrap();
        let flag = changed.clone();
        parent.on_children_changed(move || flag.store(true, std::sync::atomic::Ordering::SeqCst));

        let (tx, rx) = std::sync::mpsc::channel();
        node.rename(&pool, &ctx, bus, "renamed".to_string(), move |r| tx.send(r).unwrap());
        let new_location = rx.recv_timeout(std::time::Duration::from_secs(2)).unwrap().unwrap();

        assert_eq!(new_location.basename(), "renamed");
        assert!(registry.lookup(&Location::from_path(&child)).is_none());
        assert!(registry.lookup(&new_location).is_some());
        assert_eq!(node.inner.cache.state(node.inner.info_slot), CacheState::Invalid);
    }
}
