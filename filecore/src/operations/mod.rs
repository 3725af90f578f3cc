//! [`FileOperations`] — long-running file mutations, per spec.md §4.G.
//!
//! Every operation here runs inside a Task body dispatched by a
//! [`crate::task::runner::PoolRunner`], reports through a shared
//! [`progress::ProgressInfo`], and on success hands the caller an undo
//! record for [`crate::undo::UndoManager`].

pub mod compress;
pub mod copy_move;
pub mod create;
pub mod deep_count;
pub mod delete;
pub mod extract;
pub mod inhibit;
pub mod link;
pub mod progress;
pub mod prompt;
pub mod rename;

use std::path::Path;

/// Generates ` (2)`, ` (3)`, … suffixes until `dir/name` is free, per §4.G
/// and the uniquification property (§8, property 10). `name` is split into
/// stem and extension so the numbering reads `file (2).txt`, not
/// `file.txt (2)`.
pub fn uniquify_name(dir: &Path, name: &str) -> String {
    if !dir.join(name).exists() {
        return name.to_string();
    }
    let path = Path::new(name);
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| name.to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    for n in 2.. {
        let candidate = match &ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        if !dir.join(&candidate).exists() {
            return candidate;
        }
    }
    unreachable!("filesystem directory cannot contain infinitely many entries")
}

/// `Link to <basename>`, uniquified — §4.G operation 2.
pub fn link_name(dir: &Path, source_basename: &str) -> String {
    uniquify_name(dir, &format!("Link to {source_basename}"))
}

pub(crate) fn basename(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniquify_increments_suffix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("X"), b"").unwrap();
        assert_eq!(uniquify_name(dir.path(), "X"), "X (2)");
        std::fs::write(dir.path().join("X (2)"), b"").unwrap();
        assert_eq!(uniquify_name(dir.path(), "X"), "X (3)");
    }

    #[test]
    fn uniquify_preserves_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("photo.jpg"), b"").unwrap();
        assert_eq!(uniquify_name(dir.path(), "photo.jpg"), "photo (2).jpg");
    }

    #[test]
    fn link_name_is_prefixed() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(link_name(dir.path(), "file_1"), "Link to file_1");
    }
}
