//! Thread helpers built directly on `std::thread`.

use core::num::NonZero;

/// Returns an estimate of the default amount of parallelism a program should use.
///
/// Thin wrapper over [`std::thread::available_parallelism`] that falls back to
/// `1` instead of propagating the error, since a pool always needs at least
/// one worker thread.
pub fn available_parallelism() -> NonZero<usize> {
    std::thread::available_parallelism()
        .unwrap_or(unsafe_one())
}

#[expect(unsafe_code, reason = "`1` is non-zero")]
fn unsafe_one() -> NonZero<usize> {
    unsafe { NonZero::new_unchecked(1) }
}
