//! Low-level primitives shared by the bounded ring queue and the worker loop.
//!
//! - [`CachePadded`] : pads a value to a cache line to avoid false sharing
//!   between fields written by different threads (queue head vs. tail,
//!   worker-local counters).
//! - [`Backoff`] : exponential spin/snooze backoff for CAS retry loops.

// -----------------------------------------------------------------------------
// Modules

mod backoff;
mod cache_padded;

// -----------------------------------------------------------------------------
// Exports

pub use backoff::Backoff;
pub use cache_padded::CachePadded;
