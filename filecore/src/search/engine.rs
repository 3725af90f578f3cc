//! [`SearchEngine`] — aggregates providers into one deduplicated stream,
//! per spec.md §4.I.
//!
//! Each call to [`SearchEngine::start`] increments a monotonic run id,
//! cancels any providers still working under a prior id, and multicasts
//! the query to every constituent provider on the pool runner. A per-run
//! URI set (property 8, §8) drops cross-provider duplicates; a composite
//! `finished` callback fires once every provider has signalled completion.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::search::query::{Query, SearchHit};
use crate::task::runner::{Context, PoolRunner};
use crate::task::{spawn_task, Cancellable};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Normal,
    /// `start` was called again before this run finished; a new run is
    /// already underway.
    Restarting,
}

/// A single result source. Implementations stream hits through `on_hit` in
/// whatever batch size makes sense for them (the index provider batches up
/// to 100, the filesystem provider up to 500, per §4.I) rather than
/// returning a `Vec` all at once.
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn search(&self, query: &Query, cancellable: &Cancellable, on_hit: &dyn Fn(Vec<SearchHit>)) -> Result<()>;
}

pub struct SearchEngine {
    providers: Vec<Arc<dyn SearchProvider>>,
    run_id: AtomicUsize,
    current_cancellable: Mutex<Option<Cancellable>>,
}

impl SearchEngine {
    pub fn new(providers: Vec<Arc<dyn SearchProvider>>) -> Arc<Self> {
        Arc::new(SearchEngine { providers, run_id: AtomicUsize::new(0), current_cancellable: Mutex::new(None) })
    }

    /// Starts a new run, cancelling the previous one. Hits are delivered
    /// through `on_hits` (already deduplicated within this run) and
    /// `on_finished` fires exactly once, both dispatched on `context`.
    pub fn start(
        self: &Arc<Self>,
        query: Query,
        pool: &PoolRunner,
        context: &Context,
        on_hits: impl Fn(Vec<SearchHit>) + Send + Sync + 'static,
        on_finished: impl FnOnce(RunStatus) + Send + 'static,
    ) -> usize {
        let run_id = self.run_id.fetch_add(1, Ordering::SeqCst) + 1;
        let cancellable = Cancellable::new();
        if let Some(previous) = self.current_cancellable.lock().unwrap().replace(cancellable.clone()) {
            previous.cancel();
        }

        if self.providers.is_empty() {
            context.spawn(move || on_finished(RunStatus::Normal));
            return run_id;
        }

        let seen = Arc::new(Mutex::new(HashSet::<String>::new()));
        let remaining = Arc::new(AtomicUsize::new(self.providers.len()));
        let errors = Arc::new(AtomicUsize::new(0));
        let on_hits = Arc::new(on_hits);
        let on_finished = Arc::new(Mutex::new(Some(on_finished)));

        for provider in &self.providers {
            let provider = provider.clone();
            let query = query.clone();
            let cancellable = cancellable.clone();
            let seen = seen.clone();
            let on_hits = on_hits.clone();
            let hits_ctx = context.clone();
            let remaining = remaining.clone();
            let errors = errors.clone();
            let engine = self.clone();
            let on_finished = on_finished.clone();
            let finish_ctx = context.clone();

            spawn_task(
                pool,
                context,
                move |_task_cancellable| {
                    let seen = seen.clone();
                    let on_hits = on_hits.clone();
                    let hits_ctx = hits_ctx.clone();
                    provider.search(&query, &cancellable, &|hits| {
                        let fresh: Vec<SearchHit> = {
                            let mut seen = seen.lock().unwrap();
                            hits.into_iter().filter(|h| seen.insert(h.uri.clone())).collect()
                        };
                        if !fresh.is_empty() {
                            let on_hits = on_hits.clone();
                            hits_ctx.spawn(move || on_hits(fresh));
                        }
                    })
                },
                move |result: Result<()>| {
                    if result.is_err() && !matches!(result, Err(crate::error::Error::Cancelled)) {
                        errors.fetch_add(1, Ordering::SeqCst);
                        tracing::debug!(target: "filecore::search", "provider errored; continuing run");
                    }
                    if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                        if errors.load(Ordering::SeqCst) == engine.providers.len() {
                            tracing::warn!(target: "filecore::search", "every provider errored this run");
                        }
                        let status = if engine.run_id.load(Ordering::SeqCst) != run_id {
                            RunStatus::Restarting
                        } else {
                            RunStatus::Normal
                        };
                        if let Some(cb) = on_finished.lock().unwrap().take() {
                            finish_ctx.spawn(move || cb(status));
                        }
                    }
                },
            );
        }

        run_id
    }

    pub fn cancel_current(&self) {
        if let Some(cancellable) = self.current_cancellable.lock().unwrap().as_ref() {
            cancellable.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct StaticProvider(Vec<SearchHit>);

    impl SearchProvider for StaticProvider {
        fn name(&self) -> &'static str {
            "static"
        }

        fn search(&self, _query: &Query, _cancellable: &Cancellable, on_hit: &dyn Fn(Vec<SearchHit>)) -> Result<()> {
            on_hit(self.0.clone());
            Ok(())
        }
    }

    fn hit(uri: &str) -> SearchHit {
        SearchHit { uri: uri.to_string(), fts_rank: 1.0, snippet: None, modified: None, accessed: None, created: None }
    }

    #[test]
    fn dedups_uris_shared_across_providers() {
        let a = Arc::new(StaticProvider(vec![hit("file:///x"), hit("file:///y")]));
        let b = Arc::new(StaticProvider(vec![hit("file:///y"), hit("file:///z")]));
        let engine = SearchEngine::new(vec![a, b]);
        let pool = PoolRunner::named("search-engine-tests", 4);
        let context = Context::named("search-engine-tests");

        let collected = Arc::new(Mutex::new(Vec::new()));
        let c = collected.clone();
        let (tx, rx) = std::sync::mpsc::channel();
        let done = Arc::new(AtomicBool::new(false));
        let d = done.clone();
        engine.start(
            Query::new(""),
            &pool,
            &context,
            move |hits| c.lock().unwrap().extend(hits.into_iter().map(|h| h.uri)),
            move |_status| {
                d.store(true, Ordering::SeqCst);
                tx.send(()).unwrap();
            },
        );
        rx.recv_timeout(std::time::Duration::from_secs(2)).unwrap();

        let mut uris = collected.lock().unwrap().clone();
        uris.sort();
        assert_eq!(uris, vec!["file:///x", "file:///y", "file:///z"]);
    }

    #[test]
    fn restarting_a_run_reports_restarting_status() {
        struct SlowProvider;
        impl SearchProvider for SlowProvider {
            fn name(&self) -> &'static str {
                "slow"
            }
            fn search(&self, _q: &Query, cancellable: &Cancellable, _on_hit: &dyn Fn(Vec<SearchHit>)) -> Result<()> {
                std::thread::sleep(std::time::Duration::from_millis(100));
                cancellable.check()
            }
        }
        let engine = SearchEngine::new(vec![Arc::new(SlowProvider)]);
        let pool = PoolRunner::named("search-engine-restart-tests", 4);
        let context = Context::named("search-engine-restart-tests");

        let (tx1, rx1) = std::sync::mpsc::channel();
        engine.start(Query::new(""), &pool, &context, |_| {}, move |status| tx1.send(status).unwrap());
        let (tx2, rx2) = std::sync::mpsc::channel();
        engine.start(Query::new(""), &pool, &context, |_| {}, move |status| tx2.send(status).unwrap());

        let first = rx1.recv_timeout(std::time::Duration::from_secs(2)).unwrap();
        let second = rx2.recv_timeout(std::time::Duration::from_secs(2)).unwrap();
        assert_eq!(first, RunStatus::Restarting);
        assert_eq!(second, RunStatus::Normal);
    }
}
