//! [`Location`] — a canonical URI identifying a filesystem entry.
//!
//! Equality and hashing are defined by scheme, host, and normalized path
//! only, per spec.md §3. Locations are immutable; renaming a node replaces
//! its location, not the entry's identity (see [`crate::registry`]).

use std::fmt;
use std::path::{Path, PathBuf};

/// A canonical `file://`-style location. Only the local-filesystem scheme
/// is implemented; the scheme/host split exists so the type can model a
/// remote location the way Nautilus's `GFile` abstraction does, without the
/// core depending on a specific remote backend (out of scope, per §1).
#[derive(Clone, Eq)]
pub struct Location {
    scheme: &'static str,
    host: String,
    path: PathBuf,
}

impl Location {
    /// Builds a location from a local filesystem path. The path is made
    /// absolute (relative to the current directory) but not resolved
    /// through symlinks — canonicalization here means "one normal form for
    /// hashing", not "resolve the real file".
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("/"))
                .join(path)
        };
        Location {
            scheme: "file",
            host: String::new(),
            path: normalize(&absolute),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn scheme(&self) -> &str {
        self.scheme
    }

    pub fn basename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string())
    }

    /// The location of the parent directory, or `None` for a filesystem root.
    pub fn parent(&self) -> Option<Location> {
        self.path.parent().map(|p| Location {
            scheme: self.scheme,
            host: self.host.clone(),
            path: p.to_path_buf(),
        })
    }

    pub fn child(&self, name: &str) -> Location {
        Location {
            scheme: self.scheme,
            host: self.host.clone(),
            path: self.path.join(name),
        }
    }

    pub fn to_uri(&self) -> String {
        let mut s = String::from("file://");
        s.push_str(&self.host);
        s.push_str(&percent_encoding::utf8_percent_encode(
            &self.path.to_string_lossy(),
            percent_encoding::NON_ALPHANUMERIC,
        ).to_string().replace("%2F", "/"));
        s
    }
}

/// Collapses `.`/`..` components lexically. We don't touch symlinks: the
/// registry keys on the path the caller asked for, matching `GFile`'s
/// "canonical but not necessarily real" path semantics.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        use std::path::Component::*;
        match component {
            CurDir => {}
            ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.scheme == other.scheme && self.host == other.host && self.path == other.path
    }
}

impl std::hash::Hash for Location {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.scheme.hash(state);
        self.host.hash(state);
        self.path.hash(state);
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Location({})", self.path.display())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_paths_hash_equal() {
        let a = Location::from_path("/tmp/a/./b");
        let b = Location::from_path("/tmp/a/c/../b");
        assert_eq!(a, b);
    }

    #[test]
    fn parent_child_roundtrip() {
        let dir = Location::from_path("/tmp/d");
        let child = dir.child("child_1");
        assert_eq!(child.parent().unwrap(), dir);
        assert_eq!(child.basename(), "child_1");
    }
}
