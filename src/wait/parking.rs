/*!
 * Parking-Lot Wait Backend
 *
 * Futex emulation over parking_lot_core for targets without a native
 * wait-on-address facility. The word address is the parking key; the
 * validate callback re-checks the expected value under the lot's bucket
 * lock, which closes the sleep/wake race exactly like the kernel does
 * for a real futex.
 */

use super::traits::WaitBackend;
use parking_lot_core::{ParkToken, UnparkToken};
use std::sync::atomic::{AtomicU32, Ordering};

/// Portable wait backend over parking_lot_core.
pub struct ParkingWait;

#[inline]
fn key(addr: &AtomicU32) -> usize {
    addr as *const AtomicU32 as usize
}

impl WaitBackend for ParkingWait {
    fn wait(addr: &AtomicU32, expected: u32) {
        unsafe {
            // The validate closure runs with the bucket locked; a wake
            // that happens after our caller's last load but before we
            // park is observed here and turns the park into a no-op.
            parking_lot_core::park(
                key(addr),
                || addr.load(Ordering::Relaxed) == expected,
                || {},
                |_, _| {},
                ParkToken(0),
                None,
            );
        }
    }

    fn wake_one(addr: &AtomicU32) {
        unsafe {
            parking_lot_core::unpark_one(key(addr), |_| UnparkToken(0));
        }
    }

    fn wake_all(addr: &AtomicU32) {
        unsafe {
            parking_lot_core::unpark_all(key(addr), UnparkToken(0));
        }
    }
}
