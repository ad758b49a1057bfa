/// Errors surfaced synchronously to a submitter.
///
/// This is the only recoverable error the pool produces. An oversized task
/// capture is a compile-time failure (see [`crate::task::Task::new`]); an
/// uncaught panic inside a handler is fatal to the process, not a `Result`.
#[derive(Debug, thiserror::Error)]
pub enum PostError {
    /// The target worker's queue was observed full at claim time.
    ///
    /// Not retried internally and never spilled to a peer worker. See the
    /// dispatcher policy on overflow.
    #[error("worker queue is full")]
    QueueFull,
}
