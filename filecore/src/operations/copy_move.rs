//! Copy and move, per spec.md §4.G operation 1.
//!
//! Depth-first traversal of the source set; per-entry conflict resolution
//! goes through a caller-supplied resolver so the pool-runner task body
//! stays decoupled from the actual [`super::prompt::Prompt`] wiring (tests
//! supply a deterministic resolver instead of a blocking dialog).

use std::path::{Path, PathBuf};

use super::prompt::Response;
use super::uniquify_name;
use crate::error::{Error, Result};
use crate::operations::progress::ProgressInfo;
use crate::task::Cancellable;

/// Called once per destination-name collision. Returning `Skip` omits the
/// entry; `Replace`/`Merge` overwrite; anything else is treated as `Cancel`.
pub type ConflictResolver<'a> = dyn FnMut(&Path) -> Response + 'a;

fn resolve_destination(
    source: &Path,
    dest_dir: &Path,
    on_conflict: &mut ConflictResolver<'_>,
) -> Result<Option<PathBuf>> {
    let name = super::basename(source);
    let dest = dest_dir.join(&name);
    if !dest.exists() {
        return Ok(Some(dest));
    }
    match on_conflict(&dest) {
        Response::Skip | Response::SkipAll => Ok(None),
        Response::Replace | Response::ReplaceAll | Response::Merge | Response::MergeAll => Ok(Some(dest)),
        Response::CopyAnyway => Ok(Some(dest_dir.join(uniquify_name(dest_dir, &name)))),
        _ => Err(Error::Cancelled),
    }
}

/// Copies `source` (file or directory, recursively) into `dest_dir`.
/// Returns the path actually written to.
pub fn copy_into(
    source: &Path,
    dest_dir: &Path,
    cancellable: &Cancellable,
    progress: &ProgressInfo,
    on_conflict: &mut ConflictResolver<'_>,
) -> Result<Option<PathBuf>> {
    cancellable.check()?;
    let Some(dest) = resolve_destination(source, dest_dir, on_conflict)? else {
        return Ok(None);
    };
    progress.set_details(source.display().to_string());
    copy_tree(source, &dest, cancellable)?;
    Ok(Some(dest))
}

fn copy_tree(source: &Path, dest: &Path, cancellable: &Cancellable) -> Result<()> {
    cancellable.check()?;
    let metadata = std::fs::symlink_metadata(source)?;
    if metadata.is_dir() {
        std::fs::create_dir_all(dest)?;
        for entry in std::fs::read_dir(source)? {
            cancellable.check()?;
            let entry = entry?;
            copy_tree(&entry.path(), &dest.join(entry.file_name()), cancellable)?;
        }
    } else if metadata.is_symlink() {
        let target = std::fs::read_link(source)?;
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, dest)?;
        #[cfg(not(unix))]
        std::fs::copy(source, dest)?;
    } else {
        std::fs::copy(source, dest)?;
    }
    Ok(())
}

/// Moves `source` into `dest_dir`. Tries a same-filesystem rename first;
/// falls back to copy-then-delete across filesystems (mirrors the
/// `std::fs::rename` `EXDEV` fallback every Unix `mv` implementation needs).
pub fn move_into(
    source: &Path,
    dest_dir: &Path,
    cancellable: &Cancellable,
    progress: &ProgressInfo,
    on_conflict: &mut ConflictResolver<'_>,
) -> Result<Option<PathBuf>> {
    cancellable.check()?;
    let Some(dest) = resolve_destination(source, dest_dir, on_conflict)? else {
        return Ok(None);
    };
    match std::fs::rename(source, &dest) {
        Ok(()) => Ok(Some(dest)),
        Err(_) => {
            progress.set_details(source.display().to_string());
            copy_tree(source, &dest, cancellable)?;
            remove_tree(source)?;
            Ok(Some(dest))
        }
    }
}

fn remove_tree(path: &Path) -> Result<()> {
    let metadata = std::fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(())
}
