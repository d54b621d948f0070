/*!
 * Wait/Wake Backends
 *
 * The single OS capability every lock in this crate is built on: park a
 * thread until a 32-bit atomic stops holding an expected value, and wake
 * one or all threads parked on it.
 *
 * # Backend selection
 *
 * Selected at build time, so all dispatch is static:
 *
 * - `futex` feature (default): [`FutexWait`], a thin wrapper over the
 *   native wait-on-address facility (Linux `FUTEX_WAIT_PRIVATE`,
 *   Windows `WaitOnAddress`, macOS `__ulock_wait`, FreeBSD `_umtx_op`)
 * - `parking` feature: [`ParkingWait`], a futex emulation over
 *   parking_lot_core's global parking lot for everything else
 *
 * When both features are enabled the parking backend wins, which lets a
 * downstream crate force the portable path without disabling defaults.
 */

mod traits;

pub use traits::WaitBackend;

#[cfg(feature = "futex")]
mod futex;
#[cfg(feature = "futex")]
pub use futex::FutexWait;

#[cfg(feature = "parking")]
mod parking;
#[cfg(feature = "parking")]
pub use parking::ParkingWait;

/// The backend compiled into this build of the crate.
#[cfg(feature = "parking")]
pub(crate) type Backend = ParkingWait;
#[cfg(all(feature = "futex", not(feature = "parking")))]
pub(crate) type Backend = FutexWait;

#[cfg(not(any(feature = "futex", feature = "parking")))]
compile_error!("a wait backend is required: enable the `futex` (default) or `parking` feature");
