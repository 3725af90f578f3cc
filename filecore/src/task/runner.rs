//! The two runner variants of spec.md §4.A.
//!
//! Both are process-wide singletons keyed by name, guarded by an internal
//! mutex — the same double-checked-locking shape as
//! `examples/other_examples/…saribmah-cocommand…search-manager.rs`'s
//! `FileSystemIndexManager::get_or_create_index`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Executes tasks in parallel on a bounded worker pool. The pool's upper
/// bound is live-adjustable via [`PoolRunner::set_task_limit`], backed by
/// `threadpool`'s `ThreadPool::set_num_threads`, which reconfigures the
/// pool without dropping already-queued jobs.
pub struct PoolRunner {
    pool: Mutex<threadpool::ThreadPool>,
    queued_listeners: Mutex<Vec<Box<dyn Fn() + Send + Sync>>>,
}

impl PoolRunner {
    fn new(task_limit: usize) -> Self {
        PoolRunner {
            pool: Mutex::new(threadpool::ThreadPool::new(task_limit.max(1))),
            queued_listeners: Mutex::new(Vec::new()),
        }
    }

    /// The named, process-wide pool runner singleton. Creating two with the
    /// same key returns the same object.
    pub fn named(key: &str, default_task_limit: usize) -> Arc<PoolRunner> {
        static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<PoolRunner>>>> = OnceLock::new();
        let registry = REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
        let mut registry = registry.lock();
        registry
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(PoolRunner::new(default_task_limit)))
            .clone()
    }

    pub fn default_pool() -> Arc<PoolRunner> {
        Self::named("default", 16)
    }

    /// Reconfigures the pool's parallelism, e.g. in response to the
    /// `task-limit` preference changing (§6).
    pub fn set_task_limit(&self, limit: usize) {
        self.pool.lock().set_num_threads(limit.max(1));
    }

    pub fn task_limit(&self) -> usize {
        self.pool.lock().max_count()
    }

    /// Subscribes to the `queued` signal, emitted before a job is handed to
    /// a worker. Test suites and observability layers use this.
    pub fn on_queued(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.queued_listeners.lock().push(Box::new(listener));
    }

    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        for listener in self.queued_listeners.lock().iter() {
            listener();
        }
        self.pool.lock().execute(job);
    }

    pub fn active_count(&self) -> usize {
        self.pool.lock().active_count()
    }
}

/// A single-threaded FIFO queue draining on a dedicated thread — the Rust
/// analogue of draining `g_idle_add` callbacks on a `GMainContext`. Only one
/// job executes at a time; each runs to completion before the next starts.
pub struct Context {
    sender: Sender<Job>,
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Context { sender: self.sender.clone() }
    }
}

impl Context {
    fn new() -> Self {
        let (sender, receiver) = unbounded::<Job>();
        std::thread::Builder::new()
            .name("filecore-context".into())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
            })
            .expect("failed to spawn context thread");
        Context { sender }
    }

    /// The named, process-wide context singleton.
    pub fn named(key: &str) -> Context {
        static REGISTRY: OnceLock<Mutex<HashMap<String, Context>>> = OnceLock::new();
        let registry = REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
        let mut registry = registry.lock();
        registry.entry(key.to_string()).or_insert_with(Context::new).clone()
    }

    pub fn main() -> Context {
        Self::named("main")
    }

    /// Enqueues `job` for FIFO execution on this context's thread.
    pub fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        // The context thread only ever exits if the sender side is fully
        // dropped, which can't happen while this `Context` (itself holding
        // a sender clone) is alive.
        let _ = self.sender.send(Box::new(job));
    }
}
