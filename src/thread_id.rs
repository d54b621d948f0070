/*!
 * Compact Thread Identifiers
 *
 * [`RecursiveSuxMutex`] needs an owner identity that is totally
 * ordered, unique for the process lifetime, and cheap to load
 * atomically. `std::thread::ThreadId` offers no stable integer form, so
 * ids are handed out from a global counter on first use per thread.
 *
 * [`RecursiveSuxMutex`]: crate::RecursiveSuxMutex
 */

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: NonZeroU64 = NonZeroU64::new(NEXT_ID.fetch_add(1, Ordering::Relaxed))
        .expect("thread id space exhausted");
}

/// A process-unique identifier for an OS thread.
///
/// Never zero, so `0` serves as the "no owner" sentinel in an
/// `AtomicU64` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(NonZeroU64);

impl ThreadId {
    /// The id of the calling thread.
    #[inline]
    pub fn current() -> Self {
        Self(CURRENT.with(|id| *id))
    }

    #[inline]
    pub(crate) fn to_raw(self) -> u64 {
        self.0.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_stable_within_thread() {
        assert_eq!(ThreadId::current(), ThreadId::current());
    }

    #[test]
    fn test_unique_across_threads() {
        let mine = ThreadId::current();
        let theirs = thread::spawn(ThreadId::current).join().unwrap();
        assert_ne!(mine, theirs);
    }

    #[test]
    fn test_never_zero() {
        assert_ne!(ThreadId::current().to_raw(), 0);
    }
}
