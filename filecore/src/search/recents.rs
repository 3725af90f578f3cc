//! [`RecentsProvider`] — matches the query against a bounded recently-used
//! list, per spec.md §4.I ("Recently used" is one of the provider sources
//! alongside the index and filesystem walk). Backed by a flat JSON file
//! under the config directory, mirroring how [`super::indexed::IndexedProvider`]
//! is pointed at a `locate.db` path: no host "recently used documents"
//! service exists outside GNOME/GTK, so this stands in for it.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::search::engine::SearchProvider;
use crate::search::query::{Query, SearchHit};
use crate::task::Cancellable;

#[derive(Clone, Serialize, Deserialize)]
struct RecentEntry {
    uri: String,
    name: String,
    content_type: String,
    accessed: SystemTime,
}

/// Tracks the most recently opened locations, most-recent first, capped at
/// `capacity`. Pushing a URI already present moves it to the front instead
/// of duplicating it. Every [`RecentsProvider::touch`] call persists the
/// whole (small, capacity-bounded) list back to `path`, if one was given.
pub struct RecentsProvider {
    entries: Mutex<VecDeque<RecentEntry>>,
    capacity: usize,
    path: Option<PathBuf>,
}

impl RecentsProvider {
    pub fn new(capacity: usize) -> Self {
        RecentsProvider { entries: Mutex::new(VecDeque::new()), capacity, path: None }
    }

    /// Loads the recents list from `path` if it exists, falling back to an
    /// empty list on a missing file or a parse error — the same
    /// missing-or-broken-is-fine policy as [`crate::config::Config::load`].
    pub fn open(path: PathBuf, capacity: usize) -> Self {
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Vec<RecentEntry>>(&text) {
                Ok(entries) => entries.into_iter().collect(),
                Err(e) => {
                    tracing::warn!(target: "filecore::search", error = %e, "failed to parse recents file, starting empty");
                    VecDeque::new()
                }
            },
            Err(e) => {
                tracing::debug!(target: "filecore::search", error = %e, "no recents file, starting empty");
                VecDeque::new()
            }
        };
        RecentsProvider { entries: Mutex::new(entries), capacity, path: Some(path) }
    }

    /// `content_type` is whatever `FileOperations` resolved for the opened
    /// location, carried along so a mime-type-filtered search can apply
    /// §3's predicate without re-stating it from the path.
    pub fn touch(&self, uri: &str, name: &str, content_type: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|e| e.uri != uri);
        entries.push_front(RecentEntry {
            uri: uri.to_string(),
            name: name.to_string(),
            content_type: content_type.to_string(),
            accessed: SystemTime::now(),
        });
        entries.truncate(self.capacity);
        self.save(&entries);
    }

    fn save(&self, entries: &VecDeque<RecentEntry>) {
        let Some(path) = &self.path else { return };
        let list: Vec<&RecentEntry> = entries.iter().collect();
        match serde_json::to_string(&list) {
            Ok(json) => {
                if let Some(parent) = path.parent() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        tracing::warn!(target: "filecore::search", error = %e, "failed to create recents directory");
                        return;
                    }
                }
                if let Err(e) = std::fs::write(path, json) {
                    tracing::warn!(target: "filecore::search", error = %e, "failed to persist recents file");
                }
            }
            Err(e) => tracing::warn!(target: "filecore::search", error = %e, "failed to serialize recents"),
        }
    }
}

impl SearchProvider for RecentsProvider {
    fn name(&self) -> &'static str {
        "recents"
    }

    fn search(&self, query: &Query, cancellable: &Cancellable, on_hit: &dyn Fn(Vec<SearchHit>)) -> Result<()> {
        let entries = self.entries.lock().unwrap();
        let hits: Vec<SearchHit> = entries
            .iter()
            .filter(|e| {
                query.matches_text(&e.name)
                    && query.matches_mime(&e.content_type)
                    && query.matches_date(None, Some(e.accessed), None)
            })
            .map(|e| SearchHit {
                uri: e.uri.clone(),
                fts_rank: 1.0,
                snippet: None,
                modified: None,
                accessed: Some(e.accessed),
                created: None,
            })
            .collect();
        cancellable.check()?;
        if !hits.is_empty() {
            on_hit(hits);
        }
        Ok(())
    }
}

pub fn default_recents_path(config: &crate::config::Config) -> PathBuf {
    config.recents_path.clone().unwrap_or_else(|| {
        crate::config::Config::default_path()
            .and_then(|p| p.parent().map(|p| p.join("recently-used.json")))
            .unwrap_or_else(|| PathBuf::from("recently-used.json"))
    })
}
