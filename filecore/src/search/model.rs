//! [`ModelProvider`] — matches against whatever directory is currently on
//! screen, per spec.md §4.I: a view already holds a `DirectoryNode`'s last
//! `enumerate_children` result, so searching it needs no I/O at all.

use std::sync::Mutex;

use crate::cache::CacheState;
use crate::error::Result;
use crate::node::{FileInfo, FileNode};
use crate::search::engine::SearchProvider;
use crate::search::query::{Query, SearchHit};
use crate::task::Cancellable;

/// Holds a snapshot of the rows a view is currently displaying. The caller
/// refreshes it (typically from a `children_changed` listener) each time
/// the backing directory's contents change; the provider itself never
/// walks the filesystem.
pub struct ModelProvider {
    snapshot: Mutex<Vec<FileNode>>,
}

impl ModelProvider {
    pub fn new() -> Self {
        ModelProvider { snapshot: Mutex::new(Vec::new()) }
    }

    pub fn update(&self, children: Vec<FileNode>) {
        *self.snapshot.lock().unwrap() = children;
    }
}

impl Default for ModelProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchProvider for ModelProvider {
    fn name(&self) -> &'static str {
        "model"
    }

    fn search(&self, query: &Query, cancellable: &Cancellable, on_hit: &dyn Fn(Vec<SearchHit>)) -> Result<()> {
        let snapshot = self.snapshot.lock().unwrap().clone();
        let mut hits = Vec::new();
        for node in &snapshot {
            cancellable.check()?;
            let location = node.location();
            if !query.matches_text(&location.basename()) {
                continue;
            }
            // Only the already-cached `Info`, if any, is consulted here: the
            // provider contract (§4.I) is pure in-memory matching against
            // the current snapshot, with no I/O of its own.
            let info =
                (node.cache().state(node.info_slot()) == CacheState::Valid).then(|| node.cache().get_value::<FileInfo>(node.info_slot())).flatten();
            let mime_ok = match &info {
                Some(info) => query.matches_mime(&info.content_type),
                None => query.mime_types.is_none(),
            };
            let date_ok = match &info {
                Some(info) => query.matches_date(info.modified, info.accessed, None),
                None => query.date_range.is_none(),
            };
            if mime_ok && date_ok {
                hits.push(SearchHit {
                    uri: location.to_uri(),
                    fts_rank: 1.0,
                    snippet: None,
                    modified: info.as_ref().and_then(|i| i.modified),
                    accessed: info.as_ref().and_then(|i| i.accessed),
                    created: None,
                });
            }
        }
        if !hits.is_empty() {
            on_hit(hits);
        }
        Ok(())
    }
}
