//! Create, per spec.md §4.G operation 4. Four modes: empty directory, empty
//! file, file from template (byte-copy), file from literal bytes.

use std::path::{Path, PathBuf};

use super::uniquify_name;
use crate::error::Result;

pub enum CreateMode<'a> {
    EmptyDirectory,
    EmptyFile,
    FromTemplate(&'a Path),
    FromBytes(&'a [u8]),
}

/// Creates `name` inside `dest_dir` per `mode`, uniquifying on collision.
/// Returns the path actually created.
pub fn create(dest_dir: &Path, name: &str, mode: CreateMode<'_>) -> Result<PathBuf> {
    let final_name = uniquify_name(dest_dir, name);
    let dest = dest_dir.join(&final_name);
    match mode {
        CreateMode::EmptyDirectory => std::fs::create_dir(&dest)?,
        CreateMode::EmptyFile => {
            std::fs::File::create(&dest)?;
        }
        CreateMode::FromTemplate(source) => {
            std::fs::copy(source, &dest)?;
        }
        CreateMode::FromBytes(bytes) => std::fs::write(&dest, bytes)?,
    }
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_uniquifies_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let first = create(dir.path(), "X", CreateMode::EmptyFile).unwrap();
        let second = create(dir.path(), "X", CreateMode::EmptyFile).unwrap();
        let third = create(dir.path(), "X", CreateMode::EmptyFile).unwrap();
        assert_eq!(super::super::basename(&first), "X");
        assert_eq!(super::super::basename(&second), "X (2)");
        assert_eq!(super::super::basename(&third), "X (3)");
    }

    #[test]
    fn create_from_bytes_writes_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = create(dir.path(), "note.txt", CreateMode::FromBytes(b"hi")).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"hi");
    }

    #[test]
    fn create_from_template_copies_source() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.txt");
        std::fs::write(&template, b"template body").unwrap();
        let path = create(dir.path(), "copy.txt", CreateMode::FromTemplate(&template)).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"template body");
    }
}
