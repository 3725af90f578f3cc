//! Delete / trash, per spec.md §4.G operation 3.
//!
//! Trash is preferred; an explicit `permanent` override deletes outright.
//! Trashing follows the freedesktop.org Trash spec's `$XDG_DATA_HOME/Trash`
//! layout (files/ + info/), the same "implement the XDG convention by hand
//! over directories::BaseDirs" approach [`crate::thumbnail`] uses for the
//! thumbnail cache — no further crate needed for this.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::operations::uniquify_name;

fn trash_dirs() -> Option<(PathBuf, PathBuf)> {
    let base = directories::BaseDirs::new()?;
    let root = base.data_dir().join("Trash");
    Some((root.join("files"), root.join("info")))
}

/// Moves `path` into the trash, writing a `.trashinfo` sidecar with the
/// original path and deletion date. Returns the path it ended up at inside
/// the trash, for undo.
pub fn trash(path: &Path) -> Result<PathBuf> {
    let (files_dir, info_dir) = trash_dirs().ok_or_else(|| {
        crate::error::Error::BackendUnavailable("no trash directory available".into())
    })?;
    std::fs::create_dir_all(&files_dir)?;
    std::fs::create_dir_all(&info_dir)?;

    let basename = super::basename(path);
    let trashed_name = uniquify_name(&files_dir, &basename);
    let trashed_path = files_dir.join(&trashed_name);
    std::fs::rename(path, &trashed_path)?;

    let info_path = info_dir.join(format!("{trashed_name}.trashinfo"));
    let original = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    std::fs::write(
        &info_path,
        format!(
            "[Trash Info]\nPath={}\nDeletionDate=unspecified\n",
            original.display()
        ),
    )?;
    Ok(trashed_path)
}

/// Restores a previously trashed path back to its original location, per
/// the `.trashinfo` sidecar — used by [`crate::undo::UndoManager`].
pub fn restore(trashed_path: &Path) -> Result<PathBuf> {
    let (files_dir, info_dir) = trash_dirs()
        .ok_or_else(|| crate::error::Error::BackendUnavailable("no trash directory available".into()))?;
    let name = super::basename(trashed_path);
    let info_path = info_dir.join(format!("{name}.trashinfo"));
    let info = std::fs::read_to_string(&info_path)?;
    let original = info
        .lines()
        .find_map(|line| line.strip_prefix("Path="))
        .ok_or_else(|| crate::error::Error::Other("malformed .trashinfo".into()))?;
    let original = PathBuf::from(original);
    std::fs::rename(files_dir.join(&name), &original)?;
    std::fs::remove_file(&info_path)?;
    Ok(original)
}

/// Deletes `path` outright, bypassing the trash. Used when the user
/// explicitly overrides the default trash-first behaviour.
pub fn delete_permanently(path: &Path) -> Result<()> {
    let metadata = std::fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(())
}
