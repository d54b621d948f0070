/*!
 * Counted Condition Variable
 *
 * One 32-bit word, split in halves: the low half counts registered
 * waiters, the high half is a generation that each signal or broadcast
 * bumps. Waiters sleep on the whole word, so any generation bump
 * invalidates every stale observation; counting waiters lets signal and
 * broadcast skip the kernel entirely when nobody is asleep.
 *
 * In addition to [`wait`] on a [`Mutex`], [`wait_shared`] and
 * [`wait_update`] pair with the matching modes of a [`SuxMutex`].
 *
 * # Protocol
 *
 * A waiter increments the waiter half *before* releasing the mutex, so
 * any signaller that acquires the mutex afterwards is guaranteed to
 * observe a non-zero waiter count. The waiter then sleeps while the
 * word still holds its post-increment observation: a generation bump
 * that lands in between makes the park return immediately, a bump that
 * lands later comes with a wake for a parked thread. Either way no
 * wakeup is lost. On return the waiter deregisters and re-acquires the
 * mutex; as with any condition variable, callers re-test their
 * predicate in a loop.
 *
 * Keeping the waiter count live across signals is what allows waking a
 * crowd one thread at a time: releasing one sleeper leaves the others
 * counted, so the next signal still knows to wake.
 *
 * The generation half wraps at 2^16 bumps; a waiter would have to
 * sleep through exactly that many signals to mis-match, which is
 * treated as negligible the same way a wrapped sequence counter is.
 *
 * [`wait`]: CondVar::wait
 * [`wait_shared`]: CondVar::wait_shared
 * [`wait_update`]: CondVar::wait_update
 * [`Mutex`]: crate::Mutex
 * [`SuxMutex`]: crate::SuxMutex
 */

use crate::mutex::Mutex;
use crate::sux::SuxMutex;
use crate::tsan;
use crate::wait::{Backend, WaitBackend};
use std::sync::atomic::{AtomicU32, Ordering};

/// One registered waiter (low half).
const WAITER: u32 = 1;
/// One signalled generation (high half).
const EVENT: u32 = 1 << 16;
/// Mask of the waiter half.
const WAITER_MASK: u32 = EVENT - 1;

/// Slim condition variable.
///
/// Zero-initialised, address-stable while in use. Pairs with [`Mutex`]
/// and with both the shared and update modes of [`SuxMutex`].
pub struct CondVar {
    state: AtomicU32,
}

impl Default for CondVar {
    fn default() -> Self {
        Self::new()
    }
}

impl CondVar {
    /// Create a condition variable with no waiters.
    #[inline]
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(0),
        }
    }

    /// Register, then sleep while the word matches `observed`.
    #[inline]
    fn sleep(&self, observed: u32) {
        Backend::wait(&self.state, observed);
        self.state.fetch_sub(WAITER, Ordering::Relaxed);
    }

    /// Atomically release `mutex`, wait for a signal, and re-acquire.
    pub fn wait(&self, mutex: &Mutex) {
        let lk = self.state.fetch_add(WAITER, Ordering::Acquire) + WAITER;
        debug_assert_ne!(lk & WAITER_MASK, 0, "waiter count overflow");
        mutex.unlock();
        self.sleep(lk);
        mutex.lock();
    }

    /// [`Self::wait`] for a shared holder of a [`SuxMutex`].
    pub fn wait_shared(&self, mutex: &SuxMutex) {
        let lk = self.state.fetch_add(WAITER, Ordering::Acquire) + WAITER;
        debug_assert_ne!(lk & WAITER_MASK, 0, "waiter count overflow");
        mutex.unlock_shared();
        self.sleep(lk);
        mutex.lock_shared();
    }

    /// [`Self::wait`] for an update holder of a [`SuxMutex`].
    pub fn wait_update(&self, mutex: &SuxMutex) {
        let lk = self.state.fetch_add(WAITER, Ordering::Acquire) + WAITER;
        debug_assert_ne!(lk & WAITER_MASK, 0, "waiter count overflow");
        mutex.unlock_update();
        self.sleep(lk);
        mutex.lock_update();
    }

    /// Whether at least one waiter is registered and not yet released.
    #[inline]
    pub fn is_waiting(&self) -> bool {
        (self.state.load(Ordering::Acquire) & WAITER_MASK) != 0
    }

    /// Release one waiter. A no-op (no wake call) when nobody waits.
    pub fn signal(&self) {
        tsan::pre_signal(&self.state, 0);
        let lk = self.state.fetch_add(EVENT, Ordering::Release);
        if (lk & WAITER_MASK) != 0 {
            Backend::wake_one(&self.state);
        }
        tsan::post_signal(&self.state, 0);
    }

    /// Release every waiter. A no-op (no wake call) when nobody waits.
    pub fn broadcast(&self) {
        tsan::pre_signal(&self.state, 0);
        let lk = self.state.fetch_add(EVENT, Ordering::Release);
        if (lk & WAITER_MASK) != 0 {
            Backend::wake_all(&self.state);
        }
        tsan::post_signal(&self.state, 0);
    }
}

impl Drop for CondVar {
    fn drop(&mut self) {
        debug_assert_eq!(
            *self.state.get_mut() & WAITER_MASK,
            0,
            "condvar dropped with waiters"
        );
    }
}
