//! [`TagManager`] — starred-file set, per spec.md §4.J.
//!
//! The set of URIs is the source of truth; persistence (a plain newline-
//! delimited file, in this implementation) is an implementation detail per
//! the spec's own wording. Persistence runs cooperatively, checking a
//! [`Cancellable`] between writes the way every other task body in this
//! core does.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::task::Cancellable;

pub struct TagManager {
    starred: Mutex<HashSet<String>>,
    persistence_path: Option<PathBuf>,
    listeners: Mutex<Vec<Box<dyn Fn(&[String]) + Send + Sync>>>,
}

impl TagManager {
    pub fn new(persistence_path: Option<PathBuf>) -> Arc<Self> {
        let starred = persistence_path
            .as_ref()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default();
        Arc::new(TagManager {
            starred: Mutex::new(starred),
            persistence_path,
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn on_starred_changed(&self, listener: impl Fn(&[String]) + Send + Sync + 'static) {
        self.listeners.lock().push(Box::new(listener));
    }

    pub fn star(&self, uris: &[String]) -> Result<()> {
        {
            let mut starred = self.starred.lock();
            starred.extend(uris.iter().cloned());
        }
        self.persist_and_notify(uris)
    }

    pub fn unstar(&self, uris: &[String]) -> Result<()> {
        {
            let mut starred = self.starred.lock();
            for uri in uris {
                starred.remove(uri);
            }
        }
        self.persist_and_notify(uris)
    }

    pub fn is_starred(&self, uri: &str) -> bool {
        self.starred.lock().contains(uri)
    }

    pub fn get_starred(&self) -> Vec<String> {
        self.starred.lock().iter().cloned().collect()
    }

    fn persist_and_notify(&self, changed: &[String]) -> Result<()> {
        self.persist(&Cancellable::new())?;
        for listener in self.listeners.lock().iter() {
            listener(changed);
        }
        Ok(())
    }

    fn persist(&self, cancellable: &Cancellable) -> Result<()> {
        let Some(path) = &self.persistence_path else { return Ok(()) };
        cancellable.check()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let snapshot = self.starred.lock().iter().cloned().collect::<Vec<_>>().join("\n");
        std::fs::write(path, snapshot)?;
        Ok(())
    }
}
