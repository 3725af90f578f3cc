//! [`TaskBatch`] — an ordered group of child jobs run sequentially on one
//! worker slot, per spec.md §3 ("Task" composition) and the batched rename
//! path (§4.F).
//!
//! A batch occupies a single pool worker for its whole lifetime rather than
//! resubmitting each child, so an operation like "rename these 40 files"
//! doesn't starve other queued tasks out of the pool's remaining slots.

use crate::error::{Error, Result};
use crate::task::Cancellable;

/// One step of a batch. Receives the batch's shared [`Cancellable`] and the
/// previous step's result so later steps can react to earlier failures
/// (e.g. skip-vs-abort prompts in the file operations layer).
pub type BatchStep<T> = Box<dyn FnOnce(&Cancellable, &[Result<T>]) -> Result<T> + Send>;

/// Runs its steps strictly in order on the calling worker thread, stopping
/// early if the batch's cancellable is tripped. A step's own failure does
/// not stop the batch — callers decide per-step whether to abort by
/// checking `results` themselves (mirrors "skip and continue" vs. "abort
/// all" semantics requested interactively via a [`crate::operations::prompt::Prompt`]).
pub struct TaskBatch<T> {
    steps: Vec<BatchStep<T>>,
}

impl<T> Default for TaskBatch<T> {
    fn default() -> Self {
        TaskBatch { steps: Vec::new() }
    }
}

impl<T: Send + 'static> TaskBatch<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: BatchStep<T>) {
        self.steps.push(step);
    }

    /// Runs every step, returning one result per step. Stops early (with a
    /// trailing `Err(Cancelled)`) if cancellation is observed between steps.
    pub fn run(self, cancellable: &Cancellable) -> Vec<Result<T>> {
        let mut results: Vec<Result<T>> = Vec::with_capacity(self.steps.len());
        for step in self.steps {
            if cancellable.is_cancelled() {
                results.push(Err(Error::Cancelled));
                continue;
            }
            let result = step(cancellable, &results);
            results.push(result);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_in_order() {
        let mut batch: TaskBatch<i32> = TaskBatch::new();
        for i in 0..5 {
            batch.push(Box::new(move |_c, _prev| Ok(i)));
        }
        let results = batch.run(&Cancellable::new());
        let values: Vec<i32> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn stops_emitting_real_work_after_cancel() {
        let cancellable = Cancellable::new();
        let mut batch: TaskBatch<i32> = TaskBatch::new();
        let cancel_after_first = cancellable.clone();
        batch.push(Box::new(move |c, _prev| {
            cancel_after_first.cancel();
            let _ = c;
            Ok(1)
        }));
        batch.push(Box::new(|_c, _prev| Ok(2)));
        let results = batch.run(&cancellable);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Cancelled)));
    }
}
