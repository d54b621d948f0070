/*!
 * Futex-Based Wait Backend
 *
 * Goes straight to the OS wait-on-address facility through the
 * atomic-wait crate. On Linux this is `futex(FUTEX_WAIT_PRIVATE)` /
 * `futex(FUTEX_WAKE_PRIVATE)` on the word itself; Windows, macOS and
 * FreeBSD map to their native equivalents.
 */

use super::traits::WaitBackend;
use std::sync::atomic::AtomicU32;

/// Native futex wait backend (the default).
///
/// # Performance
///
/// - Zero per-lock memory beyond the state word itself
/// - The kernel queues directly on the word address; no user-space
///   hash table in the way
pub struct FutexWait;

impl WaitBackend for FutexWait {
    #[inline]
    fn wait(addr: &AtomicU32, expected: u32) {
        atomic_wait::wait(addr, expected);
    }

    #[inline]
    fn wake_one(addr: &AtomicU32) {
        atomic_wait::wake_one(addr);
    }

    #[inline]
    fn wake_all(addr: &AtomicU32) {
        atomic_wait::wake_all(addr);
    }
}
