/*!
 * Lock Benchmarks
 *
 * Compare uncontended and contended acquire/release cost across the
 * mutex, the SUX modes, and the elision guards.
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use sux_sync::{Mutex, SuxMutex, TransactionalLockGuard};

fn bench_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended");

    let m = Mutex::new();
    group.bench_function("mutex_lock_unlock", |b| {
        b.iter(|| {
            m.lock();
            black_box(&m);
            m.unlock();
        });
    });

    group.bench_function("mutex_spin_lock_unlock", |b| {
        b.iter(|| {
            m.spin_lock();
            black_box(&m);
            m.unlock();
        });
    });

    let sux = SuxMutex::new();
    group.bench_function("sux_shared", |b| {
        b.iter(|| {
            sux.lock_shared();
            black_box(&sux);
            sux.unlock_shared();
        });
    });

    group.bench_function("sux_update", |b| {
        b.iter(|| {
            sux.lock_update();
            black_box(&sux);
            sux.unlock_update();
        });
    });

    group.bench_function("sux_exclusive", |b| {
        b.iter(|| {
            sux.lock();
            black_box(&sux);
            sux.unlock();
        });
    });

    group.bench_function("elision_guard", |b| {
        b.iter(|| {
            let g = TransactionalLockGuard::new(&m);
            black_box(g.was_elided());
        });
    });

    group.finish();
}

fn bench_contended_counter(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_counter");
    group.sample_size(10);

    for threads in [2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let m = Mutex::new();
                    let counter = AtomicU64::new(0);

                    thread::scope(|s| {
                        for _ in 0..threads {
                            s.spawn(|| {
                                for _ in 0..1_000 {
                                    m.lock();
                                    let v = counter.load(Ordering::Relaxed);
                                    counter.store(v + 1, Ordering::Relaxed);
                                    m.unlock();
                                }
                            });
                        }
                    });

                    black_box(counter.load(Ordering::Relaxed))
                });
            },
        );
    }

    group.finish();
}

fn bench_read_mostly(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_mostly");
    group.sample_size(10);

    for readers in [2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(readers),
            &readers,
            |b, &readers| {
                b.iter(|| {
                    let sux = SuxMutex::new();

                    thread::scope(|s| {
                        for _ in 0..readers {
                            s.spawn(|| {
                                for _ in 0..1_000 {
                                    sux.lock_shared();
                                    black_box(&sux);
                                    sux.unlock_shared();
                                }
                            });
                        }
                        s.spawn(|| {
                            for _ in 0..100 {
                                sux.lock();
                                black_box(&sux);
                                sux.unlock();
                            }
                        });
                    });
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_uncontended,
    bench_contended_counter,
    bench_read_mostly
);
criterion_main!(benches);
