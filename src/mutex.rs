/*!
 * Futex Mutex
 *
 * A non-recursive mutex whose entire state is one 32-bit word: the most
 * significant bit says "held", the low 31 bits count every thread that
 * is inside the acquire path (holder included). Packing both into one
 * word makes acquire, release, and the release-time wake decision each
 * a single atomic instruction.
 *
 * # State word
 *
 * | bits   | meaning                                        |
 * |--------|------------------------------------------------|
 * | 31     | `HOLDER`: some thread owns the lock            |
 * | 0..31  | threads in the acquire path, holder included   |
 *
 * `state == 0` means unheld with nobody acquiring. A waiter registers
 * itself with one `fetch_add` and stays counted until it owns the lock,
 * so an unlock whose result differs from `HOLDER + 1` knows a waiter
 * may be parked and issues exactly one wake.
 *
 * # Ordering
 *
 * The release edge is the `fetch_sub` in [`Mutex::unlock`]; the acquire
 * edge is either the successful compare-exchange in [`Mutex::try_lock`]
 * or the acquire fence after the winning `fetch_or` in the wait loop.
 * Everything else is relaxed.
 */

use crate::config;
use crate::tsan;
use crate::wait::{Backend, WaitBackend};
use std::sync::atomic::{fence, AtomicU32, Ordering};

/// Most significant bit: the lock is held.
const HOLDER: u32 = 1 << 31;
/// One registered acquirer.
const WAITER: u32 = 1;

/// Slim futex-based mutex.
///
/// Not re-entrant, not fair, never poisons. The lock must stay at a
/// stable address while in use; all operations take `&self`, so safe
/// code cannot move it out from under a waiter.
///
/// # Performance
///
/// Uncontended `lock`/`unlock` is one compare-exchange and one
/// fetch-sub, with no syscall in either direction. Contended unlocks
/// wake at most one waiter.
pub struct Mutex {
    state: AtomicU32,
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Mutex {
    /// Create an unlocked mutex.
    #[inline]
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(0),
        }
    }

    /// Whether some thread currently holds the lock.
    #[inline]
    pub fn is_locked(&self) -> bool {
        (self.state.load(Ordering::Acquire) & HOLDER) != 0
    }

    /// Whether the lock is held or any thread is in the acquire path.
    #[inline]
    pub fn is_locked_or_waiting(&self) -> bool {
        self.state.load(Ordering::Acquire) != 0
    }

    /// Try to acquire the lock without blocking.
    #[inline]
    pub fn try_lock(&self) -> bool {
        tsan::pre_lock(&self.state, tsan::TRY_LOCK);
        let ok = self
            .state
            .compare_exchange(0, HOLDER | WAITER, Ordering::Acquire, Ordering::Relaxed)
            .is_ok();
        tsan::post_lock(
            &self.state,
            if ok { tsan::TRY_LOCK } else { tsan::TRY_LOCK_FAILED },
        );
        ok
    }

    /// Acquire the lock, parking on the OS wait queue under contention.
    #[inline]
    pub fn lock(&self) {
        if !self.try_lock() {
            self.wait_and_lock();
        }
    }

    /// Acquire the lock, spinning a bounded number of rounds before
    /// parking.
    ///
    /// The round count is process-wide; see [`SyncConfig`]. Worth it
    /// when critical sections are shorter than a context switch.
    ///
    /// [`SyncConfig`]: crate::SyncConfig
    #[inline]
    pub fn spin_lock(&self) {
        if !self.try_lock() {
            self.spin_wait_and_lock();
        }
    }

    /// Release the lock.
    ///
    /// Must be called exactly once by the holder; unlocking an unheld
    /// mutex is a debug assertion and undefined in release builds.
    #[inline]
    pub fn unlock(&self) {
        tsan::pre_unlock(&self.state, 0);
        let lk = self.state.fetch_sub(HOLDER + WAITER, Ordering::Release);
        debug_assert_ne!(lk & HOLDER, 0, "unlock of an unheld mutex");
        tsan::post_unlock(&self.state, 0);
        if lk != HOLDER + WAITER {
            // Somebody else is registered in the acquire path.
            self.wake_one();
        }
    }

    #[cold]
    fn wake_one(&self) {
        Backend::wake_one(&self.state);
    }

    /// Register as a waiter, then loop between parking and claiming.
    #[cold]
    fn wait_and_lock(&self) {
        let lk = self.state.fetch_add(WAITER, Ordering::Relaxed) + WAITER;
        debug_assert_ne!(lk & !HOLDER, 0, "waiter count overflow");
        log::trace!("mutex {:p}: contended, entering wait loop", self);
        self.lock_loop(lk);
    }

    /// Same as [`Self::wait_and_lock`], with a bounded spin phase in
    /// front of the park. The waiter registration survives the
    /// transition, so no unlock can miss us.
    #[cold]
    fn spin_wait_and_lock(&self) {
        let mut lk = self.state.fetch_add(WAITER, Ordering::Relaxed) + WAITER;
        debug_assert_ne!(lk & !HOLDER, 0, "waiter count overflow");

        let mut spin = config::spin_rounds();
        loop {
            if (lk & HOLDER) != 0 {
                lk = self.state.load(Ordering::Relaxed);
            } else {
                tsan::pre_lock(&self.state, tsan::TRY_LOCK);
                lk = self.state.fetch_or(HOLDER, Ordering::Relaxed);
                if (lk & HOLDER) == 0 {
                    fence(Ordering::Acquire);
                    tsan::post_lock(&self.state, tsan::TRY_LOCK);
                    return;
                }
                tsan::post_lock(&self.state, tsan::TRY_LOCK_FAILED);
                std::hint::spin_loop();
            }
            spin -= 1;
            if spin == 0 {
                break;
            }
        }

        self.lock_loop(lk);
    }

    /// The parked acquire loop. `lk` is the most recent observation of
    /// the state word; the caller has already registered its waiter
    /// count.
    fn lock_loop(&self, mut lk: u32) {
        loop {
            if (lk & HOLDER) != 0 {
                Backend::wait(&self.state, lk);
                lk = self.state.load(Ordering::Relaxed);
            } else {
                tsan::pre_lock(&self.state, tsan::TRY_LOCK);
                lk = self.state.fetch_or(HOLDER, Ordering::Relaxed);
                if (lk & HOLDER) == 0 {
                    // Our own registration is still counted.
                    debug_assert_ne!(lk, 0);
                    fence(Ordering::Acquire);
                    tsan::post_lock(&self.state, tsan::TRY_LOCK);
                    return;
                }
                // Lost the race; lk already reflects the current word.
                tsan::post_lock(&self.state, tsan::TRY_LOCK_FAILED);
            }
        }
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        debug_assert_eq!(*self.state.get_mut(), 0, "mutex dropped while in use");
    }
}
