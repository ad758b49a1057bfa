//! Pool construction, dispatch, and shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::PostError;
use crate::task::Task;
use crate::worker::{self, WorkerState};

type ThreadHook = Arc<dyn Fn() + Send + Sync>;

/// Builds a [`Pool`] with non-default tuning.
///
/// Every knob here configures construction, not post-construction behavior.
/// The pool's worker count and per-worker queue capacity are fixed for its
/// whole lifetime.
pub struct PoolBuilder {
    thread_count: usize,
    queue_capacity: usize,
    thread_name: String,
    on_thread_start: Option<ThreadHook>,
    on_thread_stop: Option<ThreadHook>,
}

impl PoolBuilder {
    /// Starts from the pool's defaults: auto-detected thread count,
    /// [`corepool_cfg::DEFAULT_QUEUE_CAPACITY`] per worker, threads named
    /// `"corepool-worker"`.
    pub fn new() -> Self {
        Self {
            thread_count: 0,
            queue_capacity: corepool_cfg::DEFAULT_QUEUE_CAPACITY,
            thread_name: "corepool-worker".to_string(),
            on_thread_start: None,
            on_thread_stop: None,
        }
    }

    /// Sets the number of worker threads. `0` means auto-detect from
    /// available hardware parallelism (coerced to `1` if detection itself
    /// yields `0`).
    pub fn thread_count(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }

    /// Sets each worker's ring queue capacity.
    ///
    /// # Panics
    ///
    /// [`Pool::build`] panics if this is not a power of two `>= 2`.
    pub fn queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Sets the thread name prefix; workers are named `"{prefix} ({i})"`.
    pub fn thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    /// Registers a hook run on each worker's own thread just after it starts.
    pub fn on_thread_start(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_thread_start = Some(Arc::new(hook));
        self
    }

    /// Registers a hook run on each worker's own thread just before it stops.
    pub fn on_thread_stop(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_thread_stop = Some(Arc::new(hook));
        self
    }

    /// Builds the pool, eagerly starting all worker threads.
    pub fn build(self) -> Pool {
        let thread_count = if self.thread_count == 0 {
            corepool_os::thread::available_parallelism().get()
        } else {
            self.thread_count
        };

        let shared: Arc<[WorkerState]> =
            (0..thread_count).map(|_| WorkerState::new(self.queue_capacity)).collect::<Vec<_>>().into();

        let handles = (0..thread_count)
            .map(|index| {
                let donor = (index + 1) % thread_count;
                let shared = shared.clone();
                let on_start = self.on_thread_start.clone();
                let on_stop = self.on_thread_stop.clone();

                thread::Builder::new()
                    .name(format!("{} ({index})", self.thread_name))
                    .spawn(move || worker::run(index, donor, shared, on_start, on_stop))
                    .expect("failed to spawn pool worker thread")
            })
            .collect();

        Pool { shared, handles, round_robin: AtomicUsize::new(0) }
    }
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A fixed-size collection of worker threads with a hybrid affinity-fast-path
/// plus round-robin dispatch policy.
///
/// Worker `i`'s steal donor is worker `(i + 1) mod N`, forming a ring.
pub struct Pool {
    shared: Arc<[WorkerState]>,
    handles: Vec<JoinHandle<()>>,
    round_robin: AtomicUsize,
}

impl Pool {
    /// Creates a pool with `thread_count` workers (`0` means auto-detect) and
    /// default tuning. Use [`PoolBuilder`] to customize queue capacity,
    /// thread naming, or lifecycle hooks.
    pub fn new(thread_count: usize) -> Self {
        PoolBuilder::new().thread_count(thread_count).build()
    }

    /// Number of worker threads in this pool.
    pub fn thread_count(&self) -> usize {
        self.shared.len()
    }

    /// Submits `handler` for execution.
    ///
    /// If the calling thread is itself one of this pool's workers, the
    /// handler is routed back to that same worker (the affinity fast path,
    /// maximizing cache locality for re-posted work). Otherwise it is routed
    /// by round robin across all workers.
    ///
    /// Returns [`PostError::QueueFull`] if the target worker's queue was
    /// observed full at claim time. Never retried internally, never spilled
    /// to a different worker, never blocks.
    pub fn post(&self, handler: impl FnOnce() + Send + 'static) -> Result<(), PostError> {
        self.post_to(self.dispatch_target(), handler)
    }

    /// Submits `handler` directly to worker `index`, bypassing the
    /// affinity/round-robin dispatcher.
    ///
    /// Exists for tests and callers that need to pin work to a specific
    /// worker deliberately (e.g. to exercise the steal path).
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.thread_count()`.
    pub fn post_to(&self, index: usize, handler: impl FnOnce() + Send + 'static) -> Result<(), PostError> {
        let task = Task::new(handler);
        self.shared[index].queue.push(task).map_err(|_| {
            log::warn!("post_to worker {index} observed a full queue");
            PostError::QueueFull
        })
    }

    /// The worker index `post` would route to right now: the calling
    /// thread's affinity if it is a worker, otherwise the next round-robin
    /// slot.
    fn dispatch_target(&self) -> usize {
        match worker::affinity() {
            Some(index) if index < self.shared.len() => index,
            _ => self.round_robin.fetch_add(1, Ordering::Relaxed) % self.shared.len(),
        }
    }

    /// Exposes [`Pool::dispatch_target`] without submitting anything, so the
    /// dispatcher's round-robin fairness can be tested independently of which
    /// worker ends up running a task. Once a task is actually posted,
    /// work-stealing may move its execution to a different worker than the
    /// one it was dispatched to, which is correct behavior and not something
    /// the dispatcher itself should be judged on.
    #[doc(hidden)]
    pub fn preview_dispatch_target(&self) -> usize {
        self.dispatch_target()
    }
}

impl Drop for Pool {
    /// Tears down workers in array order: each worker is asked to stop (it
    /// finishes draining its own queue and its donor's queue first) and
    /// joined before moving to the next.
    fn drop(&mut self) {
        for (index, handle) in self.handles.drain(..).enumerate() {
            self.shared[index].request_stop();
            if let Err(payload) = handle.join() {
                log::error!("worker {index} thread panicked during shutdown: {payload:?}");
            }
        }
    }
}
