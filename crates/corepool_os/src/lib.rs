//! Platform primitives shared by the queue and worker implementations in
//! `corepool_task`: cache-line padding, spin/snooze backoff, and thread
//! helpers.

// -----------------------------------------------------------------------------
// Modules

pub mod thread;
pub mod utils;
