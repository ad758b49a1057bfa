//! Worker lifecycle: one OS thread, one ring queue, one fixed steal donor.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::queue::RingQueue;
use crate::task::Task;

thread_local! {
    /// Set exactly once, at worker thread bootstrap, to that worker's index.
    /// Default `None` means "not a pool worker thread".
    static AFFINITY: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Reads the calling thread's affinity token.
///
/// `Some(i)` iff the calling thread is worker `i` of some pool.
pub(crate) fn affinity() -> Option<usize> {
    AFFINITY.with(Cell::get)
}

/// State shared between a worker's own thread and whoever posts to or steals
/// from it: the ring queue, plus a dedicated stop flag.
///
/// The stop flag is a dedicated atomic (Option B from the shutdown design
/// question) rather than an in-band terminal task, so that a full queue at
/// teardown can never deadlock shutdown.
pub(crate) struct WorkerState {
    pub(crate) queue: RingQueue<Task>,
    stop: AtomicBool,
}

impl WorkerState {
    pub(crate) fn new(queue_capacity: usize) -> Self {
        Self { queue: RingQueue::new(queue_capacity), stop: AtomicBool::new(false) }
    }

    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

type ThreadHook = Arc<dyn Fn() + Send + Sync>;

/// The worker main loop, run on the worker's own OS thread.
///
/// Until the stop flag is observed *and* both the worker's own queue and its
/// steal donor's queue are empty, repeatedly: try to pop a task from the
/// worker's own queue; on failure, try to steal one from the donor; on
/// failure, check the stop flag, break if set, otherwise sleep briefly and
/// retry. Checking the stop flag only after both attempts fail guarantees
/// every task posted before shutdown begins is executed (property #8).
pub(crate) fn run(
    index: usize,
    donor: usize,
    shared: Arc<[WorkerState]>,
    on_start: Option<ThreadHook>,
    on_stop: Option<ThreadHook>,
) {
    AFFINITY.with(|cell| cell.set(Some(index)));
    log::debug!("worker {index} starting");

    if let Some(hook) = &on_start {
        hook();
    }

    loop {
        if let Some(task) = shared[index].queue.pop() {
            invoke(index, task);
            continue;
        }

        if let Some(task) = shared[donor].queue.pop() {
            log::debug!("worker {index} stole a task from worker {donor}");
            invoke(index, task);
            continue;
        }

        if shared[index].stop.load(Ordering::Relaxed) {
            break;
        }

        thread::sleep(corepool_cfg::IDLE_SLEEP);
    }

    if let Some(hook) = &on_stop {
        hook();
    }
    log::debug!("worker {index} stopped");
}

/// Runs `task`, aborting the process on an uncaught panic.
///
/// `HandlerInternalFailure` is fatal by design: there is no result channel to
/// recover into, and letting the panic unwind past the worker loop would
/// silently drop every task still queued behind it.
fn invoke(index: usize, task: Task) {
    let result = panic::catch_unwind(AssertUnwindSafe(move || task.invoke()));
    if let Err(payload) = result {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic payload>".to_string());
        log::error!("worker {index} panicked, aborting process: {message}");
        process::abort();
    }
}
