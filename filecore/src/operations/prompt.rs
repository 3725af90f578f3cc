//! [`Prompt`] — the blocking conflict/error dialog protocol of §4.G.
//!
//! The operation thread calls [`Prompt::ask`] and blocks on a condition
//! variable; the UI thread (or, in tests, a stand-in) resolves it by
//! calling [`Prompt::resolve`]. Matches the condvar-based handoff the spec
//! describes rather than a channel, since a prompt conceptually has at
//! most one resolver and the operation thread needs to keep blocking
//! across it being asked from anywhere.

use std::sync::{Arc, Condvar, Mutex};

/// The fixed response-button palette of §4.G.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Response {
    Cancel,
    Skip,
    SkipAll,
    Retry,
    Delete,
    DeleteAll,
    Replace,
    ReplaceAll,
    Merge,
    MergeAll,
    CopyAnyway,
}

struct Inner {
    message: String,
    detail: String,
    response: Mutex<Option<Response>>,
    condvar: Condvar,
}

/// A single pending prompt. Cloning shares the same underlying wait state;
/// the UI side holds a clone to resolve, the operation thread holds its own
/// to block on.
#[derive(Clone)]
pub struct Prompt {
    inner: Arc<Inner>,
}

impl Prompt {
    pub fn new(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Prompt {
            inner: Arc::new(Inner {
                message: message.into(),
                detail: detail.into(),
                response: Mutex::new(None),
                condvar: Condvar::new(),
            }),
        }
    }

    pub fn message(&self) -> &str {
        &self.inner.message
    }

    pub fn detail(&self) -> &str {
        &self.inner.detail
    }

    /// Blocks the calling (operation) thread until [`Prompt::resolve`] is
    /// called from elsewhere (the UI thread).
    pub fn ask(&self) -> Response {
        let mut guard = self.inner.response.lock().unwrap();
        while guard.is_none() {
            guard = self.inner.condvar.wait(guard).unwrap();
        }
        guard.unwrap()
    }

    /// Called by the UI thread once the user has picked a button.
    pub fn resolve(&self, response: Response) {
        *self.inner.response.lock().unwrap() = Some(response);
        self.inner.condvar.notify_all();
    }
}

/// Remembers an `*All` choice for the remainder of a batch operation, per
/// §4.G: "On `Skip All`, `Replace All`, `Merge All`, the choice is
/// remembered for the remainder of the operation."
#[derive(Default)]
pub struct RememberedChoice {
    choice: Mutex<Option<Response>>,
}

impl RememberedChoice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Response> {
        *self.choice.lock().unwrap()
    }

    pub fn remember_if_blanket(&self, response: Response) {
        if matches!(response, Response::SkipAll | Response::ReplaceAll | Response::MergeAll | Response::DeleteAll) {
            *self.choice.lock().unwrap() = Some(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn ask_blocks_until_resolved() {
        let prompt = Prompt::new("conflict", "file exists");
        let resolver = prompt.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            resolver.resolve(Response::ReplaceAll);
        });
        let response = prompt.ask();
        handle.join().unwrap();
        assert_eq!(response, Response::ReplaceAll);
    }

    #[test]
    fn remembered_choice_ignores_single_shot_responses() {
        let remembered = RememberedChoice::new();
        remembered.remember_if_blanket(Response::Skip);
        assert!(remembered.get().is_none());
        remembered.remember_if_blanket(Response::SkipAll);
        assert_eq!(remembered.get(), Some(Response::SkipAll));
    }
}
