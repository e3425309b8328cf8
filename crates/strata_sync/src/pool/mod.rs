//! # Worker Thread Pool
//!
//! A fixed set of OS threads draining a mutex-guarded FIFO of tasks.
//!
//! Unlike the ring queues, workers block on a condition variable when idle:
//! wake-up latency is traded for zero idle CPU.
//!
//! ## Lifecycle
//!
//! ```text
//!   Running ──shutdown()──► Draining ──queue empty──► Joined
//!      │                        │
//!   enqueue ok              enqueue rejected
//! ```
//!
//! Shutdown is a graceful drain: every task accepted before `shutdown()` runs
//! to completion before the workers exit. Every caller of `shutdown()` waits
//! for that drain, not only the first one. `Drop` shuts down too, so no
//! accepted task is lost when the pool goes out of scope.
//!
//! A task may call `shutdown()` on its own pool. Its worker cannot finish the
//! drain while it is blocked there, so it waits only for the other workers;
//! it drains whatever is left once the task returns.
//!
//! ## Failure Boundary
//!
//! Each task runs inside `catch_unwind`. A panicking task is logged and
//! counted; its worker keeps serving the queue.

mod handle;

pub use handle::TaskHandle;

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::{Condvar, Mutex};

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use handle::panic_message;

/// A unit of work.
type Task = Box<dyn FnOnce() + Send + 'static>;

/// Counters for the pool. Snapshot via [`ThreadPool::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Tasks accepted by `enqueue` / `spawn`.
    pub submitted: u64,
    /// Tasks that ran to completion.
    pub completed: u64,
    /// Tasks that panicked.
    pub panicked: u64,
}

/// Queue contents, the shutdown flag and worker liveness, guarded together.
struct QueueState {
    tasks: VecDeque<Task>,
    shutdown: bool,
    /// Workers that have not yet left their loop.
    live_workers: usize,
    /// Workers currently blocked inside `shutdown()` from one of their tasks.
    workers_in_shutdown: usize,
}

/// State shared between the pool handle and its workers.
struct Shared {
    queue: Mutex<QueueState>,
    /// Signalled when a task is queued or shutdown begins.
    available: Condvar,
    /// Signalled when a worker leaves its loop or enters `shutdown()`.
    exited: Condvar,
    submitted: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            queue: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                shutdown: false,
                live_workers: 0,
                workers_in_shutdown: 0,
            }),
            available: Condvar::new(),
            exited: Condvar::new(),
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
        }
    }

    /// Sets the shutdown flag and wakes every worker. Returns `true` for the
    /// call that actually flipped the flag.
    fn begin_shutdown(&self) -> bool {
        let first = {
            let mut state = self.queue.lock();
            !std::mem::replace(&mut state.shutdown, true)
        };
        self.available.notify_all();
        first
    }

    /// Blocks until a task is available. `None` once shut down and drained,
    /// at which point the caller no longer counts as a live worker.
    fn next_task(&self) -> Option<Task> {
        let mut state = self.queue.lock();
        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            if state.shutdown {
                state.live_workers -= 1;
                self.exited.notify_all();
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /// Blocks until the drain is complete.
    ///
    /// From outside the pool that means every worker has left its loop. From
    /// a worker, the workers stuck in `shutdown()` themselves are not waited
    /// for; they finish the drain after their task returns.
    fn wait_drained(&self, from_worker: bool) {
        let mut state = self.queue.lock();
        if from_worker {
            state.workers_in_shutdown += 1;
            self.exited.notify_all();
            while state.live_workers > state.workers_in_shutdown {
                self.exited.wait(&mut state);
            }
            state.workers_in_shutdown -= 1;
        } else {
            while state.live_workers > 0 {
                self.exited.wait(&mut state);
            }
        }
    }

    fn execute(&self, task: Task, worker: usize) {
        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(()) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                self.panicked.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    worker,
                    panic = %panic_message(payload.as_ref()),
                    "task panicked; worker continues"
                );
            }
        }
    }
}

/// Worker thread main loop.
fn worker_loop(shared: &Shared, index: usize) {
    tracing::debug!(worker = index, "worker started");
    while let Some(task) = shared.next_task() {
        shared.execute(task, index);
    }
    tracing::debug!(worker = index, "worker exiting");
}

/// Fixed-size pool of worker threads.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use strata_sync::ThreadPool;
///
/// let pool = ThreadPool::new(4).unwrap();
/// let counter = Arc::new(AtomicUsize::new(0));
///
/// for _ in 0..100 {
///     let counter = Arc::clone(&counter);
///     pool.enqueue(move || {
///         counter.fetch_add(1, Ordering::Relaxed);
///     });
/// }
///
/// pool.shutdown();
/// assert_eq!(counter.load(Ordering::Relaxed), 100);
/// assert!(!pool.enqueue(|| {}));
/// ```
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_ids: Vec<ThreadId>,
    worker_count: usize,
}

impl ThreadPool {
    /// Starts a pool with `worker_count` workers and default naming.
    ///
    /// A count of zero is normalized to one.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] if the OS refuses to start a thread.
    pub fn new(worker_count: usize) -> PoolResult<Self> {
        Self::with_config(PoolConfig::with_workers(worker_count))
    }

    /// Starts a pool from a loaded [`PoolConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] if the OS refuses to start a thread. Any
    /// workers already started are shut down first.
    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        let worker_count = if config.workers == 0 {
            tracing::warn!("thread pool requested with zero workers; using one");
            1
        } else {
            config.workers
        };

        let shared = Arc::new(Shared::new());
        let mut workers = Vec::with_capacity(worker_count);

        for index in 0..worker_count {
            let mut builder =
                thread::Builder::new().name(format!("{}-{index}", config.thread_name));
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            // Counted before the thread starts so an early exit cannot
            // underflow the count.
            shared.queue.lock().live_workers += 1;
            let worker_shared = Arc::clone(&shared);
            match builder.spawn(move || worker_loop(&worker_shared, index)) {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    shared.queue.lock().live_workers -= 1;
                    shared.begin_shutdown();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(PoolError::Spawn { index, source });
                }
            }
        }

        tracing::info!(
            workers = worker_count,
            name = %config.thread_name,
            "thread pool started"
        );

        let worker_ids = workers.iter().map(|handle| handle.thread().id()).collect();

        Ok(Self {
            shared,
            workers: Mutex::new(workers),
            worker_ids,
            worker_count,
        })
    }

    /// Number of worker threads.
    #[inline]
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Number of tasks waiting for a worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().tasks.len()
    }

    /// Whether shutdown has begun.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.queue.lock().shutdown
    }

    /// Snapshot of the pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            submitted: self.shared.submitted.load(Ordering::Relaxed),
            completed: self.shared.completed.load(Ordering::Relaxed),
            panicked: self.shared.panicked.load(Ordering::Relaxed),
        }
    }

    /// Queues `task` and wakes one worker.
    ///
    /// Returns `false` (and drops the task unrun) if shutdown has begun.
    pub fn enqueue<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.shared.queue.lock();
            if state.shutdown {
                return false;
            }
            state.tasks.push_back(Box::new(task));
            self.shared.submitted.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.available.notify_one();
        true
    }

    /// Queues `task` and returns a handle to its result.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ShutDown`] if shutdown has begun.
    pub fn spawn<F, R>(&self, task: F) -> PoolResult<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::bounded(1);

        let accepted = self.enqueue(move || match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(value) => {
                // The handle may have been dropped; the result is discarded.
                let _ = sender.send(Ok(value));
            }
            Err(payload) => {
                let _ = sender.send(Err(panic_message(payload.as_ref())));
                // Let the worker's boundary count and log it as well.
                panic::resume_unwind(payload);
            }
        });

        if accepted {
            Ok(TaskHandle::new(receiver))
        } else {
            Err(PoolError::ShutDown)
        }
    }

    /// Stops accepting tasks, drains the queue, and joins every worker.
    ///
    /// Idempotent, and every call (concurrent or repeated) returns only after
    /// the drain. Safe to call from inside a task: the calling worker waits
    /// for the other workers, is not joined, and drains the rest itself once
    /// the task returns.
    pub fn shutdown(&self) {
        if self.shared.begin_shutdown() {
            tracing::info!(pending = self.pending(), "thread pool draining");
        }

        let current = thread::current().id();
        self.shared.wait_drained(self.worker_ids.contains(&current));

        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!("worker thread terminated abnormally");
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("worker_count", &self.worker_count)
            .field("pending", &self.pending())
            .field("stats", &self.stats())
            .finish()
    }
}
