/*!
 * Wait Backend Contract
 */

use std::sync::atomic::AtomicU32;

/// A futex-style wait/wake facility on 32-bit atomics.
///
/// Implementations are stateless; the OS (or the parking lot) keys its
/// queues by the address of `addr`, which is why the locks built on top
/// must stay at a stable address while in use.
///
/// # Contract
///
/// - `wait` returns immediately when `*addr != expected`; otherwise it
///   blocks until a wake call on the same address. Spurious returns are
///   allowed, so callers always re-test the word in a loop.
/// - `wake_one` releases at most one sleeper, `wake_all` releases every
///   sleeper currently parked on `addr`. Both are no-ops when nobody is
///   parked.
/// - No ordering is implied by the backend itself. The locks establish
///   their happens-before edges with acquire/release operations on the
///   word; the backend only spares us the busy loop.
pub trait WaitBackend {
    /// Block until `addr` is observed holding a value other than
    /// `expected`, or a wake (possibly spurious) arrives.
    fn wait(addr: &AtomicU32, expected: u32);

    /// Wake at most one thread parked on `addr`.
    fn wake_one(addr: &AtomicU32);

    /// Wake every thread parked on `addr`.
    fn wake_all(addr: &AtomicU32);
}
