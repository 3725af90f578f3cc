//! [`ChangeBus`] — routes filesystem mutations back onto the registry and
//! emits `renamed` / `children-changed` on the affected node's owning
//! context, per spec.md §4.F.
//!
//! Events arrive from two sources: operation tasks calling `report`
//! directly after a mutation succeeds, and an optional OS-level watch via
//! `notify`, wired up by [`ChangeBus::watch`].

use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;

use crate::location::Location;
use crate::node::FileNode;
use crate::registry::FileRegistry;

/// A single translated filesystem mutation.
#[derive(Clone, Debug)]
pub enum ChangeEvent {
    Created(Location),
    Deleted(Location),
    Renamed(Location, Location),
    Moved(Location, Location),
}

pub struct ChangeBus {
    registry: Arc<FileRegistry>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl ChangeBus {
    pub fn new(registry: Arc<FileRegistry>) -> Arc<Self> {
        Arc::new(ChangeBus { registry, watcher: Mutex::new(None) })
    }

    /// Subscribes an OS-level watcher rooted at `location`, translating its
    /// events into [`ChangeEvent`]s and feeding them back through `report`.
    /// Best-effort: a backend that can't watch (e.g. a remote mount) simply
    /// leaves the bus driven only by explicit `report` calls from operation
    /// tasks.
    pub fn watch(self: &Arc<Self>, location: &Location) -> crate::error::Result<()> {
        let bus = self.clone();
        let root = location.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let Ok(event) = res else { return };
            for translated in translate(&root, &event) {
                bus.report(translated);
            }
        })
        .map_err(|e| crate::error::Error::BackendUnavailable(e.to_string()))?;
        watcher
            .watch(location.path(), RecursiveMode::NonRecursive)
            .map_err(|e| crate::error::Error::BackendUnavailable(e.to_string()))?;
        *self.watcher.lock() = Some(watcher);
        Ok(())
    }

    /// Applies one event: invalidates cache slots, re-keys the registry on
    /// rename/move, and emits signals on the owning node's context.
    pub fn report(&self, event: ChangeEvent) {
        match event {
            ChangeEvent::Created(location) => {
                if let Some(parent) = location.parent().and_then(|p| self.registry.lookup(&p)) {
                    parent.invalidate_children();
                    parent.emit_children_changed();
                }
            }
            ChangeEvent::Deleted(location) => {
                if let Some(node) = self.registry.lookup(&location) {
                    node.invalidate_all();
                }
                if let Some(parent) = location.parent().and_then(|p| self.registry.lookup(&p)) {
                    parent.emit_children_changed();
                }
            }
            ChangeEvent::Renamed(from, to) | ChangeEvent::Moved(from, to) => {
                if let Some(node) = self.registry.lookup(&from) {
                    let _ = self.registry.rekey(&node, to.clone(), self);
                } else if let Some(parent) = to.parent().and_then(|p| self.registry.lookup(&p)) {
                    parent.invalidate_children();
                    parent.emit_children_changed();
                }
            }
        }
    }

    /// Called by [`FileRegistry::rekey`] once re-keying has happened under
    /// its lock, so the emission itself happens outside that lock.
    pub(crate) fn emit_renamed(&self, node: &FileNode, new_location: Location) {
        node.emit_renamed(new_location);
    }

    pub(crate) fn emit_children_changed(&self, parent: &FileNode) {
        parent.emit_children_changed();
    }
}

fn translate(root: &Location, event: &notify::Event) -> Vec<ChangeEvent> {
    use notify::EventKind;
    event
        .paths
        .iter()
        .map(|p| {
            let location = if p.is_absolute() {
                Location::from_path(p)
            } else {
                root.child(&p.to_string_lossy())
            };
            match event.kind {
                EventKind::Create(_) => ChangeEvent::Created(location),
                EventKind::Remove(_) => ChangeEvent::Deleted(location),
                _ => ChangeEvent::Created(location),
            }
        })
        .collect()
}
