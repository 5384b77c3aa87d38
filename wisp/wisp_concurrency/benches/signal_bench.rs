use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use wisp_concurrency::{RwSpinLock, Signal, SpinLock, ThreadPool};

fn bench_locks(c: &mut Criterion) {
    let spin = SpinLock::new(0u64);
    let rw = RwSpinLock::new(0u64);

    let mut group = c.benchmark_group("Spin Locks");

    group.bench_function("SpinLock uncontended", |b| {
        b.iter(|| {
            *spin.lock() += 1;
        });
    });

    group.bench_function("RwSpinLock read", |b| {
        b.iter(|| black_box(*rw.read()));
    });

    group.bench_function("RwSpinLock write", |b| {
        b.iter(|| {
            *rw.write() += 1;
        });
    });

    group.finish();
}

fn bench_signals(c: &mut Criterion) {
    let signal = Signal::<u64>::new();
    let total = Arc::new(AtomicU64::new(0));

    // Eight subscribers, a typical fan-out for a UI event
    let _connections: Vec<_> = (0..8)
        .map(|_| {
            let total = Arc::clone(&total);
            signal.connect(move |value| {
                total.fetch_add(value, Ordering::Relaxed);
            })
        })
        .collect();

    let mut group = c.benchmark_group("Signals");

    group.bench_function("fire to 8 subscribers", |b| {
        b.iter(|| signal.fire(black_box(1)));
    });

    group.bench_function("fire_isolated to 8 subscribers", |b| {
        b.iter(|| black_box(signal.fire_isolated(black_box(1))));
    });

    group.bench_function("connect and drop", |b| {
        b.iter(|| drop(signal.connect(|_| {})));
    });

    group.finish();
}

fn bench_pool(c: &mut Criterion) {
    let pool = match ThreadPool::new(4) {
        Ok(pool) => pool,
        Err(e) => panic!("failed to start bench pool: {}", e),
    };

    let mut group = c.benchmark_group("Thread Pool");

    group.bench_function("enqueue and wait", |b| {
        b.iter(|| {
            let handle = pool.enqueue(|| black_box(42u64)).unwrap();
            black_box(handle.wait().unwrap())
        });
    });

    group.bench_function("batch of 64", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..64u64)
                .map(|i| pool.enqueue(move || i * 2).unwrap())
                .collect();
            let sum: u64 = handles.into_iter().map(|h| h.wait().unwrap()).sum();
            black_box(sum)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_locks, bench_signals, bench_pool);
criterion_main!(benches);
