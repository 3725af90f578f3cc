//! Batch rename, per spec.md §4.G operation 5.
//!
//! Each `{location -> new_display_name}` entry is attempted independently;
//! a failing entry is reported as an error without aborting the rest of
//! the batch (§7's error policy for batch operations).

use std::collections::HashMap;

use crate::error::Result;
use crate::location::Location;

/// One outcome per requested rename, in input order.
pub struct RenameOutcome {
    pub from: Location,
    pub result: Result<Location>,
}

/// Renames each entry of `requests` in turn, collecting a result per entry
/// rather than short-circuiting on the first failure.
pub fn rename_batch(requests: HashMap<Location, String>) -> Vec<RenameOutcome> {
    requests
        .into_iter()
        .map(|(from, new_name)| {
            let result = rename_one(&from, &new_name);
            RenameOutcome { from, result }
        })
        .collect()
}

fn rename_one(from: &Location, new_name: &str) -> Result<Location> {
    let parent = from
        .parent()
        .ok_or_else(|| crate::error::Error::InvalidFilename("cannot rename a filesystem root".into()))?;
    let to = parent.child(new_name);
    std::fs::rename(from.path(), to.path())?;
    Ok(to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_entries_do_not_abort_each_other() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"").unwrap();
        // "missing" does not exist: its rename fails but "a"'s still succeeds.
        let mut requests = HashMap::new();
        requests.insert(Location::from_path(dir.path().join("a")), "a-renamed".to_string());
        requests.insert(Location::from_path(dir.path().join("missing")), "b-renamed".to_string());

        let outcomes = rename_batch(requests);
        let succeeded = outcomes.iter().filter(|o| o.result.is_ok()).count();
        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        assert_eq!(succeeded, 1);
        assert_eq!(failed, 1);
        assert!(dir.path().join("a-renamed").exists());
    }
}
