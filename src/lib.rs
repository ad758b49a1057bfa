//! A high-throughput thread pool: bounded lock-free per-worker queues, a
//! single fixed steal donor per worker, and a dispatcher that routes
//! re-posted work back to its originating worker and spreads everything
//! else by round robin.

pub use corepool_cfg as cfg;
pub use corepool_os as os;
pub use corepool_task::{Pool, PoolBuilder, PostError, Task};
