//! [`FilesystemProvider`] — directory-walk search fallback, per spec.md
//! §4.I. Breadth-first from the query root; a per-inode seen-set prevents
//! re-visiting a location reached twice through symlinks.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::location::Location;
use crate::search::query::{Query, SearchHit};
use crate::search::engine::SearchProvider;
use crate::task::Cancellable;

const BATCH_SIZE: usize = 500;

pub struct FilesystemProvider;

impl SearchProvider for FilesystemProvider {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    fn search(&self, query: &Query, cancellable: &Cancellable, on_hit: &dyn Fn(Vec<SearchHit>)) -> Result<()> {
        let Some(root) = &query.root else {
            return Err(Error::InvalidFilename("filesystem search requires a root".into()));
        };
        let mut queue: VecDeque<PathBuf> = VecDeque::from([root.clone()]);
        let mut seen = HashSet::new();
        let mut batch = Vec::with_capacity(BATCH_SIZE);

        while let Some(dir) = queue.pop_front() {
            cancellable.check()?;
            let Ok(entries) = std::fs::read_dir(&dir) else { continue };
            for entry in entries {
                cancellable.check()?;
                let Ok(entry) = entry else { continue };
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                if !query.show_hidden && name.starts_with('.') {
                    continue;
                }
                let Ok(metadata) = entry.metadata() else { continue };
                if !seen.insert(inode_key(&metadata)) {
                    continue;
                }
                if metadata.is_dir() && query.recursive {
                    queue.push_back(path.clone());
                }
                let modified = metadata.modified().ok();
                let accessed = metadata.accessed().ok();
                let created = metadata.created().ok();
                if query.matches_text(&name)
                    && query.matches_mime(&content_type(&path, &metadata))
                    && query.matches_date(modified, accessed, created)
                {
                    batch.push(SearchHit {
                        uri: Location::from_path(&path).to_uri(),
                        fts_rank: name_similarity(&query.text, &name),
                        snippet: None,
                        modified,
                        accessed,
                        created,
                    });
                    if batch.len() >= BATCH_SIZE {
                        on_hit(std::mem::take(&mut batch));
                    }
                }
            }
        }
        if !batch.is_empty() {
            on_hit(batch);
        }
        Ok(())
    }
}

/// Mirrors `node::fetch_info`'s content-type detection, so a mime-type
/// filter behaves the same way through either provider.
fn content_type(path: &std::path::Path, metadata: &std::fs::Metadata) -> String {
    if metadata.is_dir() {
        "inode/directory".to_string()
    } else {
        mime_guess::from_path(path).first().map(|m| m.essence_str().to_string()).unwrap_or_else(|| "application/octet-stream".to_string())
    }
}

/// A simple scaled-overlap similarity: fraction of the name's length
/// covered by query token matches. Good enough for the provider contract
/// in §4.I — "a scaled similarity between the query tokens and the display
/// name" — without depending on a string-distance crate.
fn name_similarity(tokens: &[String], name: &str) -> f64 {
    if tokens.is_empty() {
        return 1.0;
    }
    let lower = name.to_lowercase();
    let covered: usize = tokens.iter().map(|t| t.len()).sum();
    (covered as f64 / lower.len().max(1) as f64).min(1.0)
}

#[cfg(unix)]
fn inode_key(metadata: &std::fs::Metadata) -> (u64, u64) {
    use std::os::unix::fs::MetadataExt;
    (metadata.dev(), metadata.ino())
}

#[cfg(not(unix))]
fn inode_key(metadata: &std::fs::Metadata) -> (u64, u64) {
    (0, metadata.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn finds_matching_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("engine_all_engines_1"), b"").unwrap();
        std::fs::write(dir.path().join("sub/engine_all_engines_2"), b"").unwrap();
        std::fs::write(dir.path().join("unrelated"), b"").unwrap();

        let query = Query::new("engine_all_engines").with_root(dir.path().to_path_buf()).recursive(true);
        let hits = Mutex::new(Vec::new());
        FilesystemProvider
            .search(&query, &Cancellable::new(), &|batch| hits.lock().unwrap().extend(batch))
            .unwrap();
        assert_eq!(hits.lock().unwrap().len(), 2);
    }

    #[test]
    fn hidden_files_excluded_unless_requested() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".hidden_engine_all_engines"), b"").unwrap();

        let query = Query::new("engine_all_engines").with_root(dir.path().to_path_buf());
        let hits = Mutex::new(Vec::new());
        FilesystemProvider
            .search(&query, &Cancellable::new(), &|batch| hits.lock().unwrap().extend(batch))
            .unwrap();
        assert!(hits.lock().unwrap().is_empty());
    }

    #[test]
    fn mime_type_set_filters_out_non_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("engine_all_engines.txt"), b"").unwrap();
        let png_path = dir.path().join("engine_all_engines.png");
        std::fs::write(&png_path, b"").unwrap();

        let mut query = Query::new("engine_all_engines").with_root(dir.path().to_path_buf());
        query.mime_types = Some(vec!["image/png".into()]);
        let hits = Mutex::new(Vec::new());
        FilesystemProvider
            .search(&query, &Cancellable::new(), &|batch| hits.lock().unwrap().extend(batch))
            .unwrap();
        let hits = hits.into_inner().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].uri, Location::from_path(&png_path).to_uri());
    }

    #[test]
    fn date_range_filters_out_files_outside_the_window() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("engine_all_engines_old.txt");
        let new = dir.path().join("engine_all_engines_new.txt");
        std::fs::write(&old, b"").unwrap();
        std::fs::write(&new, b"").unwrap();

        let far_future = std::time::SystemTime::now() + std::time::Duration::from_secs(3600);
        let mut query = Query::new("engine_all_engines").with_root(dir.path().to_path_buf());
        // A window that starts after every file's real mtime excludes both.
        query.date_range = Some((far_future, far_future + std::time::Duration::from_secs(60)));
        let hits = Mutex::new(Vec::new());
        FilesystemProvider
            .search(&query, &Cancellable::new(), &|batch| hits.lock().unwrap().extend(batch))
            .unwrap();
        assert!(hits.lock().unwrap().is_empty());
    }
}
