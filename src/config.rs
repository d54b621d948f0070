/*!
 * Synchronization Configuration
 *
 * Process-wide tuning for the spin phase of [`Mutex::spin_lock`].
 *
 * [`Mutex::spin_lock`]: crate::Mutex::spin_lock
 */

use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

/// Default spin rounds before parking. 50 yielded the best NUMA
/// throughput on a Haswell-generation Xeon; shorter on machines where
/// the pause instruction is slow.
pub const DEFAULT_SPIN_ROUNDS: u32 = 50;

/// Upper bound on configurable spin rounds. Spinning longer than this
/// burns more cycles than the parked path ever would.
pub const MAX_SPIN_ROUNDS: u32 = 1 << 16;

/// The active spin-round count, shared by every mutex in the process.
static SPIN_ROUNDS: AtomicU32 = AtomicU32::new(DEFAULT_SPIN_ROUNDS);

/// Configuration errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("spin rounds must be non-zero; use lock() instead of spin_lock() to skip spinning")]
    ZeroSpinRounds,

    #[error("spin rounds {0} exceeds the maximum of {MAX_SPIN_ROUNDS}")]
    SpinRoundsTooLarge(u32),
}

/// Spin-phase configuration.
///
/// Installing a config is optional; the defaults are sensible. The
/// value is read once per contended `spin_lock`, so installing a new
/// config affects subsequent acquisitions immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Bounded spin iterations before falling back to the OS wait.
    pub spin_rounds: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            spin_rounds: DEFAULT_SPIN_ROUNDS,
        }
    }
}

impl SyncConfig {
    /// Configuration for workloads whose critical sections are almost
    /// always shorter than a context switch.
    pub const fn low_latency() -> Self {
        Self { spin_rounds: 125 }
    }

    /// Validate and publish this configuration process-wide.
    pub fn install(self) -> Result<(), ConfigError> {
        if self.spin_rounds == 0 {
            return Err(ConfigError::ZeroSpinRounds);
        }
        if self.spin_rounds > MAX_SPIN_ROUNDS {
            return Err(ConfigError::SpinRoundsTooLarge(self.spin_rounds));
        }
        SPIN_ROUNDS.store(self.spin_rounds, Ordering::Relaxed);
        Ok(())
    }
}

/// The currently installed spin-round count.
#[inline]
pub(crate) fn spin_rounds() -> u32 {
    SPIN_ROUNDS.load(Ordering::Relaxed)
}
