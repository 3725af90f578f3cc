//! [`UndoManager`] — process-wide undo/redo history, per spec.md §4.H.
//!
//! A record carries enough data to invert the operation it came from; the
//! manager itself doesn't know how to run the filesystem mutation, it just
//! holds records and asks a caller-supplied applier to invert or replay
//! them. Pushing a new operation truncates the redo stack, per §3's Undo
//! record contract.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::error::Result;
use crate::location::Location;

/// Per-kind data sufficient to exactly invert a completed mutation (§3).
#[derive(Clone, Debug)]
pub enum UndoRecord {
    Rename { from: Location, to: Location },
    Move { source: Location, destination: Location },
    Copy { created: Vec<Location> },
    Create { created: Location },
    Link { created: Location },
    Trash { original: Location, trashed: Location },
    Delete,
    Compress { archive: Location },
    Extract { created: Vec<Location> },
}

/// Knows how to apply the inverse of a record, and how to redo the
/// original. Implemented by the layer that actually drives
/// [`crate::operations`] — the manager itself stays free of filesystem I/O
/// so it can be tested without a real disk.
pub trait UndoApplier: Send + Sync {
    fn undo(&self, record: &UndoRecord) -> Result<UndoRecord>;
    fn redo(&self, record: &UndoRecord) -> Result<UndoRecord>;
}

#[derive(Default)]
struct History {
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
}

pub struct UndoManager {
    history: Mutex<History>,
}

impl UndoManager {
    pub fn new() -> Arc<Self> {
        Arc::new(UndoManager { history: Mutex::new(History::default()) })
    }

    pub fn global() -> &'static Arc<UndoManager> {
        static GLOBAL: OnceLock<Arc<UndoManager>> = OnceLock::new();
        GLOBAL.get_or_init(UndoManager::new)
    }

    /// Called after a mutation task completes successfully. Clears the
    /// redo stack, per §3: "performing a new operation truncates the redo
    /// side."
    pub fn record(&self, record: UndoRecord) {
        let mut history = self.history.lock();
        history.undo_stack.push(record);
        history.redo_stack.clear();
    }

    /// Pops the top undo record, applies its inverse via `applier`, and on
    /// success pushes the resulting record onto the redo stack. On failure
    /// the original record is pushed back so the stack is left consistent
    /// (§7: "UndoManager records nothing if the inverse operation fails").
    pub fn undo(&self, applier: &dyn UndoApplier) -> Option<Result<()>> {
        let record = { self.history.lock().undo_stack.pop()? };
        match applier.undo(&record) {
            Ok(redo_record) => {
                self.history.lock().redo_stack.push(redo_record);
                Some(Ok(()))
            }
            Err(e) => {
                self.history.lock().undo_stack.push(record);
                Some(Err(e))
            }
        }
    }

    pub fn redo(&self, applier: &dyn UndoApplier) -> Option<Result<()>> {
        let record = { self.history.lock().redo_stack.pop()? };
        match applier.redo(&record) {
            Ok(undo_record) => {
                self.history.lock().undo_stack.push(undo_record);
                Some(Ok(()))
            }
            Err(e) => {
                self.history.lock().redo_stack.push(record);
                Some(Err(e))
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.history.lock().undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.history.lock().redo_stack.is_empty()
    }
}
