//! The core of the pool: the fixed-capacity task container, the bounded
//! lock-free ring queue, the worker loop, and the pool dispatcher.

mod error;
mod pool;
mod queue;
mod task;
mod worker;

pub use error::PostError;
pub use pool::{Pool, PoolBuilder};
pub use queue::RingQueue;
pub use task::Task;
