//! [`FileRegistry`] — interns [`FileNode`] by [`Location`], surviving rename
//! by re-keying, per spec.md §4.C.
//!
//! A single mutex over the whole hash; contention is acceptable because
//! every operation here is a short pointer manipulation with no I/O under
//! the lock (§5). Identity is implemented as a weak-handle table (Design
//! Notes, §9): the registry holds only [`Weak`] references, so the last
//! strong reference's `Drop` is the canonical "forgotten" moment.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::change_bus::ChangeBus;
use crate::location::Location;
use crate::node::{FileNode, NodeInner, NodeKind};

#[derive(Default)]
pub struct FileRegistry {
    nodes: Mutex<HashMap<Location, Weak<NodeInner>>>,
}

impl FileRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(FileRegistry {
            nodes: Mutex::new(HashMap::new()),
        })
    }

    /// The process-wide default registry.
    pub fn global() -> &'static Arc<FileRegistry> {
        static GLOBAL: OnceLock<Arc<FileRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(FileRegistry::new)
    }

    /// Atomically: look up; if present, return a new shared reference;
    /// else construct, insert, and return. `is_dir` decides whether the
    /// node gets `DirectoryNode` behaviour (§3 "Dispatch node").
    pub fn get_or_create(self: &Arc<Self>, location: Location, is_dir: bool) -> FileNode {
        let mut nodes = self.nodes.lock();
        if let Some(existing) = nodes.get(&location).and_then(Weak::upgrade) {
            return FileNode::from_inner(existing);
        }
        let kind = if is_dir { NodeKind::Directory } else { NodeKind::Regular };
        let inner = NodeInner::new(location.clone(), kind, Arc::downgrade(self));
        nodes.insert(location, Arc::downgrade(&inner));
        FileNode::from_inner(inner)
    }

    /// Non-creating lookup.
    pub fn lookup(&self, location: &Location) -> Option<FileNode> {
        self.nodes
            .lock()
            .get(location)
            .and_then(Weak::upgrade)
            .map(FileNode::from_inner)
    }

    /// Called by the rename path once the rename has succeeded on disk.
    /// Steps run entirely under the registry's exclusive lock, per §4.C.
    pub fn rekey(&self, node: &FileNode, new_location: Location, bus: &ChangeBus) -> crate::error::Result<()> {
        let old_location = node.location();
        {
            let mut nodes = self.nodes.lock();
            nodes.remove(&old_location);
            if nodes.contains_key(&new_location) {
                // Precondition violated: a live, non-invalidated node already
                // occupies the destination. The ChangeBus is responsible for
                // invalidating any conflicting node before this is called.
                tracing::warn!(target: "filecore::registry", "rekey target {:?} already occupied", new_location);
            }
            nodes.insert(new_location.clone(), Arc::downgrade(&node.inner));
            node.set_location(new_location.clone());
            node.cache().invalidate(node.info_slot(), false);
        }
        bus.emit_renamed(node, new_location);
        if let Some(parent) = old_location.parent().and_then(|p| self.lookup(&p)) {
            bus.emit_children_changed(&parent);
        }
        Ok(())
    }

    /// Removes a dead weak entry. Called from `NodeInner::drop`.
    pub(crate) fn forget(&self, location: &Location) {
        let mut nodes = self.nodes.lock();
        if let Some(weak) = nodes.get(location) {
            if weak.upgrade().is_none() {
                nodes.remove(location);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.lock().is_empty()
    }
}
