//! Task system — spec.md §3 ("Task") and §4.B.
//!
//! The GObject original expresses a task as a class with `execute`,
//! `cancel`, and an `emit_in_main_context` helper driven by signals. Rust
//! has no signal bus, so the same contract — cancellable work that runs on
//! a worker and reports back on a captured "return context" — is expressed
//! with closures and channels instead: [`spawn_task`] takes the work
//! closure and the completion closure and wires the return-context dispatch
//! for you.

pub mod batch;
pub mod runner;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use runner::{Context, PoolRunner};

/// A task's cooperative cancellation handle. Checked at every suspension
/// point (§5): every filesystem call, every enumerator step, every
/// decompressed-chunk callback, every prompt request.
#[derive(Clone, Default)]
pub struct Cancellable {
    flag: Arc<AtomicBool>,
}

impl Cancellable {
    pub fn new() -> Self {
        Cancellable { flag: Arc::new(AtomicBool::new(false)) }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns `Err(Cancelled)` if tripped; call at every suspension point.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Observable lifecycle state of a task, per spec.md §3. Exposed mainly for
/// tests and observability; the real work happens in the closures passed to
/// [`spawn_task`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Constructed,
    Queued,
    Executing,
    Completed,
}

/// A handle to an in-flight or completed task. Dropping the last handle
/// before the task has started cancels it (§5): "deleting the last
/// reference to a Task before it starts is equivalent to cancelling it."
pub struct TaskHandle {
    cancellable: Cancellable,
    state: Arc<parking_lot::Mutex<TaskState>>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.cancellable.cancel();
    }

    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }

    pub fn cancellable(&self) -> &Cancellable {
        &self.cancellable
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if *self.state.lock() == TaskState::Constructed {
            self.cancellable.cancel();
        }
    }
}

/// Queues `work` on `pool`, then delivers its result to `on_finished` on
/// `context` (the "return context" captured at call time) — the
/// `finished` signal of spec.md §3, minus the GObject ceremony.
///
/// `work` receives the task's [`Cancellable`] so it can poll it at
/// suspension points and bail out with `Error::Cancelled`.
pub fn spawn_task<T, F, D>(pool: &PoolRunner, context: &Context, work: F, on_finished: D) -> TaskHandle
where
    T: Send + 'static,
    F: FnOnce(&Cancellable) -> Result<T> + Send + 'static,
    D: FnOnce(Result<T>) + Send + 'static,
{
    let cancellable = Cancellable::new();
    let state = Arc::new(parking_lot::Mutex::new(TaskState::Constructed));
    let handle = TaskHandle { cancellable: cancellable.clone(), state: state.clone() };

    let context = context.clone();
    *state.lock() = TaskState::Queued;
    let state_for_worker = state.clone();
    pool.submit(move || {
        *state_for_worker.lock() = TaskState::Executing;
        let result = work(&cancellable);
        *state_for_worker.lock() = TaskState::Completed;
        context.spawn(move || on_finished(result));
    });

    handle
}
