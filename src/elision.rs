/*!
 * Hardware Lock Elision
 *
 * Scoped guards that first try to run the critical section as a memory
 * transaction (x86 Restricted Transactional Memory) without taking the
 * lock at all. Inside the transaction the guard reads the lock word; an
 * unheld lock means the section proceeds speculatively, and any thread
 * that takes the lock for real writes that word and aborts us. On
 * abort, or on hardware without RTM, the guard simply takes the lock.
 *
 * Elision is a pure optimisation: correctness never depends on a
 * transaction committing, only on the fallback lock. There is no
 * forward-progress guarantee for the speculative path and no retry of
 * it either; one abort and the guard goes non-transactional.
 *
 * On non-x86 targets everything here compiles down to the plain
 * guards.
 */

use crate::mutex::Mutex;
use crate::sux::SuxMutex;

#[cfg(target_arch = "x86_64")]
mod rtm {
    use std::sync::atomic::{AtomicU8, Ordering};

    const UNPROBED: u8 = 0;
    const UNAVAILABLE: u8 = 1;
    const AVAILABLE: u8 = 2;

    static SUPPORT: AtomicU8 = AtomicU8::new(UNPROBED);

    /// One-time CPUID probe for Restricted Transactional Memory.
    pub(super) fn available() -> bool {
        match SUPPORT.load(Ordering::Relaxed) {
            UNPROBED => probe(),
            state => state == AVAILABLE,
        }
    }

    #[cold]
    fn probe() -> bool {
        let have = std::is_x86_feature_detected!("rtm");
        log::debug!(
            "hardware lock elision {}",
            if have { "enabled (rtm)" } else { "unavailable" }
        );
        SUPPORT.store(
            if have { AVAILABLE } else { UNAVAILABLE },
            Ordering::Relaxed,
        );
        have
    }

    /// `xbegin` leaves this value in eax when the transaction started;
    /// on abort, eax carries the abort status instead.
    const XBEGIN_STARTED: u32 = u32::MAX;

    // The RTM intrinsics are not stable, so the three instructions are
    // emitted as raw encodings. The default asm! memory clobber doubles
    // as the compiler barrier the transaction boundary needs.

    /// Begin a transaction. Returns false when it could not start or
    /// was aborted (control re-arrives here after an abort).
    #[inline]
    pub(super) unsafe fn begin() -> bool {
        let mut status: u32 = XBEGIN_STARTED;
        // xbegin with zero displacement: the abort handler is simply
        // the next instruction.
        core::arch::asm!(
            ".byte 0xc7, 0xf8, 0x00, 0x00, 0x00, 0x00",
            inout("eax") status,
            options(nostack),
        );
        status == XBEGIN_STARTED
    }

    /// Abort the running transaction; control resumes at [`begin`].
    /// A no-op outside a transaction.
    #[inline]
    pub(super) unsafe fn abort() {
        // xabort 0xff
        core::arch::asm!(".byte 0xc6, 0xf8, 0xff", options(nostack));
    }

    /// Commit the running transaction.
    #[inline]
    pub(super) unsafe fn end() {
        // xend
        core::arch::asm!(".byte 0x0f, 0x01, 0xd5", options(nostack));
    }
}

/// Whether this process can elide locks (probed once, then constant).
#[inline]
pub fn elision_available() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        rtm::available()
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}

macro_rules! elide_or {
    ($lock:expr, $held:ident, $fallback:expr) => {{
        #[cfg(target_arch = "x86_64")]
        if rtm::available() {
            unsafe {
                if rtm::begin() {
                    if $lock.$held() {
                        // A conflicting holder exists; roll back and
                        // take the lock outside the transaction.
                        // Control resumes at begin(), which then
                        // reports failure.
                        rtm::abort();
                    }
                    return Self {
                        lock: $lock,
                        elided: true,
                    };
                }
            }
        }
        $fallback;
        Self {
            lock: $lock,
            elided: false,
        }
    }};
}

macro_rules! commit_or {
    ($self:ident, $release:expr) => {
        if $self.elided {
            #[cfg(target_arch = "x86_64")]
            unsafe {
                rtm::end()
            };
        } else {
            $release;
        }
    };
}

/// Scoped exclusive section over a [`Mutex`], elided when possible.
pub struct TransactionalLockGuard<'a> {
    lock: &'a Mutex,
    elided: bool,
}

impl<'a> TransactionalLockGuard<'a> {
    /// Enter the critical section.
    #[inline]
    pub fn new(lock: &'a Mutex) -> Self {
        elide_or!(lock, is_locked_or_waiting, lock.lock())
    }

    /// Whether this section runs as a transaction instead of holding
    /// the lock.
    #[inline]
    pub fn was_elided(&self) -> bool {
        self.elided
    }
}

impl Drop for TransactionalLockGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        commit_or!(self, self.lock.unlock());
    }
}

/// Scoped shared section over a [`SuxMutex`], elided when possible.
///
/// The speculative path only needs "no exclusive holder": concurrent
/// shared or update holders never conflict with a reader, so their
/// presence does not force the lock to be taken.
pub struct TransactionalSharedLockGuard<'a> {
    lock: &'a SuxMutex,
    elided: bool,
}

impl<'a> TransactionalSharedLockGuard<'a> {
    /// Enter the shared section.
    #[inline]
    pub fn new(lock: &'a SuxMutex) -> Self {
        elide_or!(lock, is_locked, lock.lock_shared())
    }

    #[inline]
    pub fn was_elided(&self) -> bool {
        self.elided
    }
}

impl Drop for TransactionalSharedLockGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        commit_or!(self, self.lock.unlock_shared());
    }
}

/// Scoped update section over a [`SuxMutex`], elided when possible.
pub struct TransactionalUpdateLockGuard<'a> {
    lock: &'a SuxMutex,
    elided: bool,
}

impl<'a> TransactionalUpdateLockGuard<'a> {
    /// Enter the update section.
    #[inline]
    pub fn new(lock: &'a SuxMutex) -> Self {
        elide_or!(lock, is_locked_or_waiting, lock.lock_update())
    }

    #[inline]
    pub fn was_elided(&self) -> bool {
        self.elided
    }
}

impl Drop for TransactionalUpdateLockGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        commit_or!(self, self.lock.unlock_update());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;

    #[test]
    fn test_exclusive_guard_excludes() {
        let m = Mutex::new();
        let counter = AtomicU64::new(0);

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..1_000 {
                        let g = TransactionalLockGuard::new(&m);
                        let v = counter.load(Ordering::Relaxed);
                        counter.store(v + 1, Ordering::Relaxed);
                        drop(g);
                    }
                });
            }
        });

        assert_eq!(counter.load(Ordering::Relaxed), 4_000);
        assert!(!m.is_locked_or_waiting());
    }

    #[test]
    fn test_non_elided_guard_holds_lock() {
        let m = Mutex::new();
        let g = TransactionalLockGuard::new(&m);
        if !g.was_elided() {
            assert!(m.is_locked());
        }
        drop(g);
        assert!(!m.is_locked_or_waiting());
    }

    #[test]
    fn test_shared_guards_coexist() {
        let sux = SuxMutex::new();
        let g1 = TransactionalSharedLockGuard::new(&sux);
        let g2 = TransactionalSharedLockGuard::new(&sux);
        drop(g1);
        drop(g2);
        assert!(!sux.is_locked_or_waiting());
    }

    #[test]
    fn test_update_guard_releases() {
        let sux = SuxMutex::new();
        let g = TransactionalUpdateLockGuard::new(&sux);
        drop(g);
        assert!(!sux.is_locked_or_waiting());
    }
}
