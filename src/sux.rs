/*!
 * Shared/Update/Exclusive Mutex
 *
 * A slim reader-writer lock with a third mode. At most one thread holds
 * the exclusive (X) mode, and then nothing else is granted. At most one
 * thread holds the update (U) mode, which coexists with any number of
 * shared (S) holders. U can be upgraded to X in place, and X downgraded
 * back to U.
 *
 * # Composition
 *
 * Two words, two OS wait queues:
 *
 * - an "outer" [`Mutex`], held for the whole duration of any U or X
 *   ownership; this is what serialises writers against each other
 * - an "inner" 32-bit word: bit 31 (`X`) flags an exclusive intent or
 *   grant, the low bits count S holders plus one while U is held
 *
 * Readers only ever touch the inner word. A reader that observes `X`
 * set does not join; it takes and immediately drops the outer mutex,
 * sleeping in the writer's queue if need be, and retries. That one
 * detour is what gives a waiting writer priority over new readers.
 *
 * The S count exists so releases make necessary and sufficient wake
 * calls: the last reader blocking an exclusive waiter (prior value
 * `X + 1`) wakes exactly one sleeper on the inner word; every other
 * shared release is silent.
 *
 * # Update mode
 *
 * U is "a writer that tolerates readers": it holds the outer mutex like
 * X does, but contributes an ordinary +1 to the inner count instead of
 * setting the flag, so shared acquires keep succeeding.
 */

use crate::mutex::Mutex;
use crate::wait::{Backend, WaitBackend};
use std::sync::atomic::{AtomicU32, Ordering};

/// Most significant bit of the inner word: exclusive mode intended or
/// held. The lock is exclusively held exactly when the word equals `X`.
const X: u32 = 1 << 31;

/// Slim shared/update/exclusive lock.
///
/// Like the plain [`Mutex`]: not re-entrant, not fair, address-stable
/// while in use. For a re-entrant variant with ownership tracking see
/// [`RecursiveSuxMutex`].
///
/// [`RecursiveSuxMutex`]: crate::RecursiveSuxMutex
pub struct SuxMutex {
    inner: AtomicU32,
    outer: Mutex,
}

impl Default for SuxMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl SuxMutex {
    /// Create an unlocked lock.
    #[inline]
    pub const fn new() -> Self {
        Self {
            inner: AtomicU32::new(0),
            outer: Mutex::new(),
        }
    }

    /// Whether the exclusive mode is held.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.inner.load(Ordering::Acquire) == X
    }

    /// Whether any mode is held or any writer is waiting.
    #[inline]
    pub fn is_locked_or_waiting(&self) -> bool {
        self.is_locked() || self.outer.is_locked_or_waiting()
    }

    // -- shared ------------------------------------------------------

    /// Try to acquire the shared mode; fails iff an exclusive grant or
    /// intent is present.
    #[inline]
    pub fn try_lock_shared(&self) -> bool {
        let mut lk = 0;
        loop {
            match self
                .inner
                .compare_exchange_weak(lk, lk + 1, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => return true,
                Err(cur) => {
                    if (cur & X) != 0 {
                        return false;
                    }
                    lk = cur;
                }
            }
        }
    }

    /// Acquire the shared mode.
    #[inline]
    pub fn lock_shared(&self) {
        if !self.try_lock_shared() {
            self.lock_shared_wait();
        }
    }

    /// A writer is present; queue behind it on the outer mutex, then
    /// retry. The outer mutex is dropped again right away: readers
    /// never hold it, they only borrow its wait queue.
    #[cold]
    fn lock_shared_wait(&self) {
        log::trace!("sux {:p}: shared acquire queueing behind writer", self);
        loop {
            self.outer.lock();
            let acquired = self.try_lock_shared();
            self.outer.unlock();
            if acquired {
                return;
            }
        }
    }

    /// Release the shared mode.
    #[inline]
    pub fn unlock_shared(&self) {
        let lk = self.inner.fetch_sub(1, Ordering::Release);
        debug_assert_ne!(lk & !X, 0, "unlock_shared without shared holders");
        if lk == X + 1 {
            // We were the last reader an exclusive waiter was waiting out.
            self.wake_inner();
        }
    }

    // -- update ------------------------------------------------------

    /// Try to acquire the update mode; fails iff another U or X holder
    /// (or X waiter) is present.
    #[inline]
    pub fn try_lock_update(&self) -> bool {
        if !self.outer.try_lock() {
            return false;
        }
        let _lk = self.inner.fetch_add(1, Ordering::Acquire);
        debug_assert!(_lk < X - 1, "shared count overflow");
        true
    }

    /// Acquire the update mode, blocking while another U or X holder is
    /// present. Shared holders do not block this.
    #[inline]
    pub fn lock_update(&self) {
        self.outer.lock();
        let _lk = self.inner.fetch_add(1, Ordering::Acquire);
        debug_assert!(_lk < X - 1, "shared count overflow");
    }

    /// Release the update mode.
    #[inline]
    pub fn unlock_update(&self) {
        let _lk = self.inner.fetch_sub(1, Ordering::Release);
        debug_assert_ne!(_lk, 0);
        debug_assert!(_lk < X);
        self.outer.unlock();
    }

    // -- exclusive ---------------------------------------------------

    /// Try to acquire the exclusive mode; fails if any other mode is
    /// held or any writer is queued.
    #[inline]
    pub fn try_lock(&self) -> bool {
        if !self.outer.try_lock() {
            return false;
        }
        if self
            .inner
            .compare_exchange(0, X, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            return true;
        }
        // Readers are present; a try-lock does not wait them out.
        self.outer.unlock();
        false
    }

    /// Acquire the exclusive mode, blocking out new readers while
    /// existing ones drain.
    #[inline]
    pub fn lock(&self) {
        self.outer.lock();
        self.lock_inner();
    }

    /// Release the exclusive mode.
    #[inline]
    pub fn unlock(&self) {
        debug_assert!(self.is_locked());
        self.inner.store(0, Ordering::Release);
        self.outer.unlock();
    }

    /// Set the exclusive flag; wait for existing readers if any.
    /// Caller must hold the outer mutex.
    #[inline]
    fn lock_inner(&self) {
        let lk = self.inner.fetch_or(X, Ordering::Acquire);
        if lk != 0 {
            self.lock_inner_wait(lk);
        }
    }

    /// Wait until the inner word reads exactly `X`, i.e. every shared
    /// holder present at the time of our exclusive intent has left.
    /// `lk` is the recent count of those holders.
    #[cold]
    fn lock_inner_wait(&self, mut lk: u32) {
        debug_assert!(lk < X);
        log::trace!("sux {:p}: exclusive waiting for {} readers", self, lk);
        lk |= X;
        loop {
            debug_assert!(lk > X);
            Backend::wait(&self.inner, lk);
            lk = self.inner.load(Ordering::Acquire);
            if lk == X {
                return;
            }
        }
    }

    #[cold]
    fn wake_inner(&self) {
        Backend::wake_one(&self.inner);
    }

    // -- conversions -------------------------------------------------

    /// Upgrade the update mode to exclusive, waiting for concurrent
    /// shared holders to drain. The caller must hold the update mode.
    #[inline]
    pub fn update_lock_upgrade(&self) {
        debug_assert!(self.outer.is_locked());
        let lk = self.inner.fetch_add(X - 1, Ordering::Acquire);
        if lk != 1 {
            self.lock_inner_wait(lk - 1);
        }
    }

    /// Downgrade the exclusive mode to update. Never blocks.
    ///
    /// Readers that queued on the outer mutex while X was set stay
    /// parked there until `unlock_update`; a downgrade is normally
    /// followed shortly by one.
    #[inline]
    pub fn lock_update_downgrade(&self) {
        debug_assert!(self.outer.is_locked());
        debug_assert!(self.is_locked());
        self.inner.store(1, Ordering::Release);
    }
}

impl Drop for SuxMutex {
    fn drop(&mut self) {
        debug_assert_eq!(*self.inner.get_mut(), 0, "sux mutex dropped while in use");
    }
}
