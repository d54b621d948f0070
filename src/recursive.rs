/*!
 * Recursive Shared/Update/Exclusive Mutex
 *
 * Extends [`SuxMutex`] with re-entrancy for the U and X modes and with
 * an explicit owner identity. Shared mode stays non-recursive.
 *
 * The owner may differ from the thread that acquired the lock: the
 * `*_disowned` acquire variants leave the lock unowned so a completion
 * callback on another thread can adopt it with [`set_owner`] and
 * release it. This is the usage pattern of a database buffer pool,
 * where a page latch is taken by the thread that submits a write and
 * released by whichever thread handles the completion.
 *
 * # Bookkeeping
 *
 * Two fields next to the underlying lock:
 *
 * - `recursive`: X depth in the low 16 bits, U depth in the high 16
 *   bits; non-zero exactly while U or X is held. Guarded by the
 *   underlying lock's writer gate, touched only by the owner (or the
 *   thread becoming owner).
 * - `owner`: the owning [`ThreadId`] as a raw `AtomicU64`, `0` when
 *   none. Loaded (relaxed) by any thread for the `holding_*`
 *   predicates; a stale value can only send the reader down the
 *   non-recursive slow path, never the other way around.
 *
 * An upgrade folds the U depth into the X field (`recursive /=
 * RECURSIVE_U` after the underlying upgrade); a downgrade is the exact
 * inverse.
 *
 * [`set_owner`]: RecursiveSuxMutex::set_owner
 */

use crate::sux::SuxMutex;
use crate::thread_id::ThreadId;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

/// The multiplier in `recursive` for X locks.
const RECURSIVE_X: u32 = 1;
/// The multiplier in `recursive` for U locks.
const RECURSIVE_U: u32 = 1 << 16;
/// Mask extracting one mode's depth field.
const RECURSIVE_MASK: u32 = RECURSIVE_U - 1;
/// Maximum permitted recursion depth per mode.
const RECURSIVE_MAX: u32 = 0x7fff;

/// Re-entrant SUX lock with thread-of-ownership tracking.
pub struct RecursiveSuxMutex {
    lock: SuxMutex,
    /// Packed U/X recursion depths; see the module docs. Only read or
    /// written while `lock`'s writer gate is held by this thread, or by
    /// the owner itself.
    recursive: UnsafeCell<u32>,
    /// Raw owner id, 0 = disowned.
    owner: AtomicU64,
}

// The UnsafeCell is only touched under the writer gate (see above), and
// the remaining fields are atomics.
unsafe impl Send for RecursiveSuxMutex {}
unsafe impl Sync for RecursiveSuxMutex {}

impl Default for RecursiveSuxMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl RecursiveSuxMutex {
    /// Create an unlocked lock.
    #[inline]
    pub const fn new() -> Self {
        Self {
            lock: SuxMutex::new(),
            recursive: UnsafeCell::new(0),
            owner: AtomicU64::new(0),
        }
    }

    #[inline]
    fn recursion(&self) -> u32 {
        unsafe { *self.recursive.get() }
    }

    #[inline]
    fn set_recursion(&self, r: u32) {
        unsafe { *self.recursive.get() = r }
    }

    #[inline]
    fn owner_raw(&self) -> u64 {
        self.owner.load(Ordering::Relaxed)
    }

    /// Bump one mode's recursion depth. Caller must be the owner.
    #[inline]
    fn recurse(&self, unit: u32) {
        debug_assert_eq!(self.owner_raw(), ThreadId::current().to_raw());
        let r = self.recursion();
        debug_assert!(if unit == RECURSIVE_U {
            r != 0
        } else {
            (r & RECURSIVE_MASK) != 0
        });
        debug_assert!(((r / unit) & RECURSIVE_MASK) < RECURSIVE_MAX, "recursion overflow");
        self.set_recursion(r + unit);
    }

    /// First (non-recursive) grant: record depth 1 in `unit`'s field
    /// and optionally adopt ownership.
    #[inline]
    fn grant(&self, unit: u32, owner: Option<ThreadId>) {
        debug_assert_eq!(self.recursion(), 0);
        debug_assert_eq!(self.owner_raw(), 0);
        self.set_recursion(unit);
        if let Some(id) = owner {
            self.owner.store(id.to_raw(), Ordering::Relaxed);
        }
    }

    // -- status ------------------------------------------------------

    /// Whether the exclusive mode is held (by anyone).
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Whether any mode is held or any writer is waiting.
    #[inline]
    pub fn is_locked_or_waiting(&self) -> bool {
        self.lock.is_locked_or_waiting()
    }

    /// Whether the calling thread owns the U or X mode.
    #[inline]
    pub fn holding_u_or_x(&self) -> bool {
        let is_owner = self.owner_raw() == ThreadId::current().to_raw();
        debug_assert!(!is_owner || self.recursion() != 0);
        is_owner
    }

    /// Whether the calling thread owns the U mode (and not X).
    #[inline]
    pub fn holding_u(&self) -> bool {
        self.holding_u_or_x() && (self.recursion() & RECURSIVE_MASK) == 0
    }

    /// Whether the calling thread owns the X mode.
    #[inline]
    pub fn holding_x(&self) -> bool {
        self.holding_u_or_x() && (self.recursion() & RECURSIVE_MASK) != 0
    }

    /// Transfer ownership of a held U or X mode.
    ///
    /// `None` disowns the lock. Only the current owner, or a thread
    /// adopting a disowned lock, may call this.
    #[inline]
    pub fn set_owner(&self, owner: Option<ThreadId>) {
        debug_assert_ne!(self.recursion(), 0, "set_owner on an unheld lock");
        self.owner
            .store(owner.map_or(0, ThreadId::to_raw), Ordering::Relaxed);
    }

    // -- shared (non-recursive pass-through) -------------------------

    #[inline]
    pub fn try_lock_shared(&self) -> bool {
        self.lock.try_lock_shared()
    }

    #[inline]
    pub fn lock_shared(&self) {
        self.lock.lock_shared()
    }

    #[inline]
    pub fn unlock_shared(&self) {
        self.lock.unlock_shared()
    }

    // -- update ------------------------------------------------------

    /// Acquire the update mode, or bump its depth when the caller
    /// already owns U or X.
    pub fn lock_update(&self) {
        let id = ThreadId::current();
        if self.owner_raw() == id.to_raw() {
            self.recurse(RECURSIVE_U);
        } else {
            self.lock.lock_update();
            self.grant(RECURSIVE_U, Some(id));
        }
    }

    /// Acquire the update mode without taking ownership; the eventual
    /// owner calls [`set_owner`](Self::set_owner) before releasing.
    pub fn lock_update_disowned(&self) {
        debug_assert_ne!(self.owner_raw(), ThreadId::current().to_raw());
        self.lock.lock_update();
        self.grant(RECURSIVE_U, None);
    }

    /// Try to acquire the update mode (or recurse on it).
    pub fn try_lock_update(&self) -> bool {
        let id = ThreadId::current();
        if self.owner_raw() == id.to_raw() {
            self.recurse(RECURSIVE_U);
            return true;
        }
        if !self.lock.try_lock_update() {
            return false;
        }
        self.grant(RECURSIVE_U, Some(id));
        true
    }

    /// Try to acquire the update mode without taking ownership.
    pub fn try_lock_update_disowned(&self) -> bool {
        debug_assert_ne!(self.owner_raw(), ThreadId::current().to_raw());
        if !self.lock.try_lock_update() {
            return false;
        }
        self.grant(RECURSIVE_U, None);
        true
    }

    /// Bump the U depth; the caller must already own U or X.
    #[inline]
    pub fn lock_update_recursive(&self) {
        self.recurse(RECURSIVE_U);
    }

    /// Release one level of the update mode.
    pub fn unlock_update(&self) {
        self.release(RECURSIVE_U);
    }

    // -- exclusive ---------------------------------------------------

    /// Acquire the exclusive mode, or bump its depth when the caller
    /// already owns X.
    pub fn lock(&self) {
        let id = ThreadId::current();
        if self.owner_raw() == id.to_raw() {
            self.recurse(RECURSIVE_X);
        } else {
            self.lock.lock();
            self.grant(RECURSIVE_X, Some(id));
        }
    }

    /// Acquire the exclusive mode without taking ownership.
    pub fn lock_disowned(&self) {
        debug_assert_ne!(self.owner_raw(), ThreadId::current().to_raw());
        self.lock.lock();
        self.grant(RECURSIVE_X, None);
    }

    /// Try to acquire the exclusive mode (or recurse on it).
    pub fn try_lock(&self) -> bool {
        let id = ThreadId::current();
        if self.owner_raw() == id.to_raw() {
            self.recurse(RECURSIVE_X);
            return true;
        }
        if !self.lock.try_lock() {
            return false;
        }
        self.grant(RECURSIVE_X, Some(id));
        true
    }

    /// Try to acquire the exclusive mode without taking ownership.
    pub fn try_lock_disowned(&self) -> bool {
        debug_assert_ne!(self.owner_raw(), ThreadId::current().to_raw());
        if !self.lock.try_lock() {
            return false;
        }
        self.grant(RECURSIVE_X, None);
        true
    }

    /// Bump the X depth; the caller must already own X.
    #[inline]
    pub fn lock_recursive(&self) {
        self.recurse(RECURSIVE_X);
    }

    /// Release one level of the exclusive mode.
    pub fn unlock(&self) {
        self.release(RECURSIVE_X);
    }

    // -- conversions -------------------------------------------------

    /// Upgrade every held U level to X. The caller must own U and not X.
    pub fn update_lock_upgrade(&self) {
        debug_assert!(self.holding_u());
        self.lock.update_lock_upgrade();
        self.set_recursion(self.recursion() / RECURSIVE_U);
    }

    /// Downgrade every held X level to U. The caller must own X only.
    pub fn lock_update_downgrade(&self) {
        debug_assert!(self.holding_x());
        debug_assert!(self.recursion() <= RECURSIVE_MAX);
        self.set_recursion(self.recursion() * RECURSIVE_U);
        self.lock.lock_update_downgrade();
    }

    /// Acquire the exclusive mode, upgrading in place when the caller
    /// already owns U.
    ///
    /// Returns whether an upgrade happened, so the caller knows to
    /// downgrade rather than unlock when restoring the previous state.
    pub fn lock_upgraded(&self) -> bool {
        let id = ThreadId::current();
        if self.owner_raw() == id.to_raw() {
            debug_assert_ne!(self.recursion(), 0);
            if (self.recursion() & RECURSIVE_MASK) == 0 {
                self.update_lock_upgrade();
                return true;
            }
            self.recurse(RECURSIVE_X);
        } else {
            self.lock.lock();
            self.grant(RECURSIVE_X, Some(id));
        }
        false
    }

    // -- release -----------------------------------------------------

    fn release(&self, unit: u32) {
        #[cfg(debug_assertions)]
        {
            let owner = self.owner_raw();
            debug_assert!(
                owner == ThreadId::current().to_raw()
                    || (owner == 0 && self.recursion() == unit),
                "release by a non-owner"
            );
            debug_assert_ne!((self.recursion() / unit) & RECURSIVE_MASK, 0);
        }

        let r = self.recursion() - unit;
        self.set_recursion(r);
        if r == 0 {
            self.owner.store(0, Ordering::Relaxed);
            if unit == RECURSIVE_U {
                self.lock.unlock_update();
            } else {
                self.lock.unlock();
            }
        }
    }
}

impl Drop for RecursiveSuxMutex {
    fn drop(&mut self) {
        debug_assert_eq!(
            *self.recursive.get_mut(),
            0,
            "recursive sux mutex dropped while held"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_recursion_pairs_with_release() {
        let lock = RecursiveSuxMutex::new();

        lock.lock();
        assert!(lock.holding_x());
        for _ in 0..10 {
            lock.lock();
        }
        for _ in 0..10 {
            lock.unlock();
        }
        assert!(lock.holding_x());
        lock.unlock();

        assert!(!lock.holding_u_or_x());
        assert!(!lock.is_locked_or_waiting());
    }

    #[test]
    fn test_update_recursion_and_upgrade() {
        let lock = RecursiveSuxMutex::new();

        lock.lock_update();
        lock.lock_update();
        assert!(lock.holding_u());
        assert!(!lock.holding_x());

        lock.update_lock_upgrade();
        assert!(lock.holding_x());

        // Both levels were transformed; two exclusive releases.
        lock.unlock();
        assert!(lock.holding_x());
        lock.unlock();
        assert!(!lock.holding_u_or_x());
        assert!(!lock.is_locked_or_waiting());
    }

    #[test]
    fn test_downgrade_restores_update() {
        let lock = RecursiveSuxMutex::new();

        lock.lock();
        lock.lock_update_downgrade();
        assert!(lock.holding_u());
        // Shared coexists with the downgraded lock.
        thread::scope(|s| {
            s.spawn(|| {
                assert!(lock.try_lock_shared());
                lock.unlock_shared();
            })
            .join()
            .unwrap();
        });
        lock.unlock_update();
        assert!(!lock.is_locked_or_waiting());
    }

    #[test]
    fn test_lock_upgraded_variants() {
        let lock = RecursiveSuxMutex::new();

        // Fresh acquire: no upgrade reported.
        assert!(!lock.lock_upgraded());
        // Already exclusive: recursion, still no upgrade.
        assert!(!lock.lock_upgraded());
        lock.unlock();
        lock.unlock();

        // From update mode: upgrade reported.
        lock.lock_update();
        assert!(lock.lock_upgraded());
        assert!(lock.holding_x());
        lock.unlock();
        assert!(!lock.holding_u_or_x());
    }

    #[test]
    fn test_mixed_update_exclusive_recursion() {
        let lock = RecursiveSuxMutex::new();

        lock.lock();
        lock.lock_update();
        assert!(lock.holding_x());
        lock.unlock_update();
        lock.unlock();
        assert!(!lock.is_locked_or_waiting());
    }

    #[test]
    fn test_ownership_transfer() {
        let lock = RecursiveSuxMutex::new();

        lock.lock_disowned();
        assert!(!lock.holding_u_or_x());
        assert!(lock.is_locked());

        thread::scope(|s| {
            s.spawn(|| {
                lock.set_owner(Some(ThreadId::current()));
                assert!(lock.holding_x());
                lock.unlock();
            })
            .join()
            .unwrap();
        });

        assert!(!lock.is_locked_or_waiting());
    }

    #[test]
    fn test_disowned_release_without_owner() {
        let lock = RecursiveSuxMutex::new();

        assert!(lock.try_lock_update_disowned());
        thread::scope(|s| {
            s.spawn(|| {
                // Depth is exactly 1 and the lock is disowned, so a
                // foreign thread may release it directly.
                lock.unlock_update();
            })
            .join()
            .unwrap();
        });
        assert!(!lock.is_locked_or_waiting());
    }

    #[test]
    fn test_try_lock_respects_other_owner() {
        let lock = RecursiveSuxMutex::new();

        lock.lock();
        thread::scope(|s| {
            s.spawn(|| {
                assert!(!lock.try_lock());
                assert!(!lock.try_lock_update());
                assert!(!lock.try_lock_shared());
            })
            .join()
            .unwrap();
        });
        lock.unlock();
    }
}
