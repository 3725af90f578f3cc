//! Hard-link… actually symbolic-link creation, per spec.md §4.G operation 2
//! (named "Link" in the spec; the body text specifies a symlink, not a
//! hard link — `ln -s`, not `ln`).

use std::path::{Path, PathBuf};

use super::link_name;
use crate::error::Result;

/// Creates `Link to <source basename>` inside `dest_dir`, pointing at
/// `source`'s absolute path, uniquified on repeat calls.
pub fn link_into(source: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let absolute = if source.is_absolute() {
        source.to_path_buf()
    } else {
        std::env::current_dir()?.join(source)
    };
    let name = link_name(dest_dir, &super::basename(source));
    let dest = dest_dir.join(&name);
    #[cfg(unix)]
    std::os::unix::fs::symlink(&absolute, &dest)?;
    #[cfg(not(unix))]
    std::fs::copy(&absolute, &dest)?;
    Ok(dest)
}

/// Undoes [`link_into`]: removes the link it created.
pub fn unlink(link_path: &Path) -> Result<()> {
    std::fs::remove_file(link_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_link_is_uniquified() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("file_1");
        std::fs::write(&source, b"x").unwrap();

        let first = link_into(&source, dir.path()).unwrap();
        let second = link_into(&source, dir.path()).unwrap();
        assert_eq!(super::super::basename(&first), "Link to file_1");
        assert_eq!(super::super::basename(&second), "Link to file_1 (2)");

        unlink(&first).unwrap();
        unlink(&second).unwrap();
        assert!(!first.exists() && !second.exists());
    }
}
