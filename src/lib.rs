/*!
 * Slim Shared/Update/Exclusive Synchronization Primitives
 *
 * User-space locks built on a single OS capability: wait on a 32-bit
 * atomic until it changes, wake one or all sleepers on it. Every
 * primitive packs its entire state into one or two 32-bit words so the
 * common operations are single atomic read-modify-writes and the kernel
 * is only entered when a thread actually has to sleep.
 *
 * # Primitives
 *
 * - [`Mutex`]: non-recursive mutex with an optional bounded spin phase
 * - [`SuxMutex`]: reader-writer lock with a third "update" mode that
 *   excludes writers but coexists with readers
 * - [`RecursiveSuxMutex`]: re-entrant SUX lock that tracks the owning
 *   thread and supports ownership transfer
 * - [`CondVar`]: counted condition variable that waits with any mode of
 *   the mutexes above
 * - [`TransactionalLockGuard`] and friends: hardware lock elision
 *   (x86 RTM) with transparent fallback to the wrapped lock
 *
 * # Architecture
 *
 * The wait/wake backend is selected at build time behind the
 * [`wait::WaitBackend`] trait: the `futex` feature (default) goes
 * straight to the OS futex facility, the `parking` feature routes
 * through parking_lot_core for targets without one.
 *
 * # Performance
 *
 * - Uncontended lock and unlock are one compare-exchange / one
 *   fetch-sub; no syscalls
 * - Release paths wake the OS queue only when the state word proves a
 *   waiter may exist
 * - Writer priority over new readers comes from composition, not from
 *   extra queue bookkeeping: blocked readers momentarily contend on the
 *   same gate mutex the writer holds
 *
 * # Caveats
 *
 * These are address-stable primitives: sleeping threads wait on the
 * state word's address, so a lock must not be moved while any thread
 * uses it. All operations take `&self`, which makes that impossible to
 * get wrong from safe code. None of the locks is poisoning and none is
 * fair; waiters are released in no particular order.
 */

mod condvar;
mod config;
mod elision;
mod mutex;
mod recursive;
mod sux;
mod thread_id;
mod tsan;
pub mod wait;

pub use condvar::CondVar;
pub use config::{ConfigError, SyncConfig, DEFAULT_SPIN_ROUNDS, MAX_SPIN_ROUNDS};
pub use elision::{
    elision_available, TransactionalLockGuard, TransactionalSharedLockGuard,
    TransactionalUpdateLockGuard,
};
pub use mutex::Mutex;
pub use recursive::RecursiveSuxMutex;
pub use sux::SuxMutex;
pub use thread_id::ThreadId;
