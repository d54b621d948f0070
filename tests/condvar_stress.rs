/*!
 * Condition Variable Stress Tests
 *
 * Broadcast releasing a crowd at once, and signal releasing the same
 * crowd one thread at a time.
 */

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;
use sux_sync::{CondVar, Mutex};

const N_THREADS: usize = 30;

#[test]
fn broadcast_releases_all() {
    let m = Mutex::new();
    let cv = CondVar::new();
    let critical = AtomicBool::new(false);

    thread::scope(|s| {
        for _ in 0..N_THREADS {
            s.spawn(|| {
                m.lock();
                while !critical.load(Ordering::Relaxed) {
                    cv.wait(&m);
                }
                m.unlock();
            });
        }

        // Let the waiters accumulate.
        thread::sleep(Duration::from_millis(100));

        m.lock();
        critical.store(true, Ordering::Relaxed);
        let waiting = cv.is_waiting();
        m.unlock();

        assert!(waiting);
        cv.broadcast();
    });

    assert!(!cv.is_waiting());
    assert!(!m.is_locked_or_waiting());
}

#[test]
fn signal_releases_one_by_one() {
    let m = Mutex::new();
    let cv = CondVar::new();
    let pending = AtomicU32::new(0);
    let served = AtomicU32::new(0);

    thread::scope(|s| {
        for _ in 0..N_THREADS {
            s.spawn(|| {
                m.lock();
                while pending.load(Ordering::Relaxed) == 0 {
                    cv.wait(&m);
                }
                // Consume exactly one grant, then leave.
                pending.fetch_sub(1, Ordering::Relaxed);
                served.fetch_add(1, Ordering::Relaxed);
                m.unlock();
            });
        }

        thread::sleep(Duration::from_millis(100));

        for _ in 0..N_THREADS {
            m.lock();
            pending.fetch_add(1, Ordering::Relaxed);
            m.unlock();
            cv.signal();
        }
    });

    assert_eq!(served.load(Ordering::Relaxed), N_THREADS as u32);
    assert_eq!(pending.load(Ordering::Relaxed), 0);
    assert!(!cv.is_waiting());
    assert!(!m.is_locked_or_waiting());
}

#[test]
fn repeated_broadcast_rounds() {
    const ROUNDS: usize = 20;

    let m = Mutex::new();
    let cv = CondVar::new();
    let critical = AtomicBool::new(false);

    for _ in 0..ROUNDS {
        thread::scope(|s| {
            for _ in 0..N_THREADS {
                s.spawn(|| {
                    m.lock();
                    while !critical.load(Ordering::Relaxed) {
                        cv.wait(&m);
                    }
                    m.unlock();
                });
            }

            m.lock();
            critical.store(true, Ordering::Relaxed);
            let waiting = cv.is_waiting();
            m.unlock();
            if waiting {
                cv.broadcast();
            }
        });

        assert!(!cv.is_waiting());
        critical.store(false, Ordering::Relaxed);
    }
}
