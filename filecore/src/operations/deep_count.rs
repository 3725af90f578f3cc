//! Compute size / deep-count, per spec.md §4.G operation 8.
//!
//! Inode-based loop detection: a `(filesystem_id, inode)` seen-set is
//! checked before descending into any child, so a symlink cycle or a
//! bind-mount loop is visited once rather than forever.

use std::collections::HashSet;
use std::path::Path;

use crate::error::Result;
use crate::task::Cancellable;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeepCount {
    pub directory_count: u64,
    pub file_count: u64,
    pub unreadable_count: u64,
    pub total_bytes: u64,
}

pub fn deep_count(root: &Path, cancellable: &Cancellable) -> Result<DeepCount> {
    let mut tally = DeepCount::default();
    let mut seen = HashSet::new();
    walk(root, &mut tally, &mut seen, cancellable)?;
    Ok(tally)
}

fn walk(path: &Path, tally: &mut DeepCount, seen: &mut HashSet<(u64, u64)>, cancellable: &Cancellable) -> Result<()> {
    cancellable.check()?;
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(_) => {
            tally.unreadable_count += 1;
            return Ok(());
        }
    };

    if !seen.insert(inode_key(&metadata)) {
        return Ok(());
    }

    if metadata.is_dir() {
        tally.directory_count += 1;
        let entries = match std::fs::read_dir(path) {
            Ok(entries) => entries,
            Err(_) => {
                tally.unreadable_count += 1;
                return Ok(());
            }
        };
        for entry in entries {
            cancellable.check()?;
            match entry {
                Ok(entry) => walk(&entry.path(), tally, seen, cancellable)?,
                Err(_) => tally.unreadable_count += 1,
            }
        }
    } else {
        tally.file_count += 1;
        tally.total_bytes += metadata.len();
    }
    Ok(())
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

    #[test]
    fn tallies_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"12345").unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"1234567890").unwrap();

        let tally = deep_count(dir.path(), &Cancellable::new()).unwrap();
        assert_eq!(tally.directory_count, 2); // root + sub
        assert_eq!(tally.file_count, 2);
        assert_eq!(tally.total_bytes, 15);
        assert_eq!(tally.unreadable_count, 0);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_is_visited_once() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::os::unix::fs::symlink(dir.path(), sub.join("loop")).unwrap();

        let tally = deep_count(dir.path(), &Cancellable::new()).unwrap();
        // The loop entry's target (dir.path() itself) has already been
        // seen, so it contributes nothing further.
        assert_eq!(tally.directory_count, 2);
    }
}
