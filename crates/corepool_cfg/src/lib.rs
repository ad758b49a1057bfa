//! Build-time tuning constants for the pool.
//!
//! These are plain `const` items rather than environment- or file-driven
//! configuration: the pool has no runtime config surface, only the knobs
//! `PoolBuilder` exposes before construction.

/// Default capacity of each worker's ring queue, used when
/// [`PoolBuilder::queue_capacity`] is not called.
///
/// [`PoolBuilder::queue_capacity`]: ../corepool_task/struct.PoolBuilder.html
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Size, in bytes, of the inline buffer a [`Task`] stores its closure in.
///
/// Closures that don't fit are rejected at compile time.
///
/// [`Task`]: ../corepool_task/struct.Task.html
pub const TASK_INLINE_SIZE: usize = 56;

/// Alignment, in bytes, a [`Task`]'s inline buffer guarantees.
///
/// [`Task`]: ../corepool_task/struct.Task.html
pub const TASK_ALIGN: usize = 8;

/// Cache line size assumed by [`CachePadded`].
///
/// [`CachePadded`]: ../corepool_os/utils/struct.CachePadded.html
pub const CACHE_LINE_SIZE: usize = 64;

/// How long an idle worker sleeps between failed pop/steal attempts.
pub const IDLE_SLEEP: core::time::Duration = core::time::Duration::from_millis(1);
