//! Benchmark for segment borrow/return.
//!
//! TARGET: acquire + release well under 100ns uncontended
//!
//! Run with: cargo bench --package segpool_core --bench pool_benchmark

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use segpool_core::SegmentPool;
use std::thread;

fn benchmark_acquire_release(c: &mut Criterion) {
    let pool = SegmentPool::initialize(16 * 1024 * 1024, 256).unwrap();

    c.bench_function("acquire_release_single", |b| {
        b.iter(|| {
            let segment = pool.acquire().unwrap();
            pool.release(black_box(segment)).unwrap();
        });
    });
}

fn benchmark_acquire_batch(c: &mut Criterion) {
    let pool = SegmentPool::initialize(16 * 1024 * 1024, 256).unwrap();
    let mut group = c.benchmark_group("acquire_batch");

    for batch in [8_usize, 64, 512] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_function(format!("batch_{batch}"), |b| {
            let mut held = Vec::with_capacity(batch);
            b.iter(|| {
                for _ in 0..batch {
                    held.push(pool.acquire().unwrap());
                }
                for segment in held.drain(..) {
                    pool.release(segment).unwrap();
                }
            });
        });
    }

    group.finish();
}

fn benchmark_contended(c: &mut Criterion) {
    let pool = SegmentPool::initialize(16 * 1024 * 1024, 256).unwrap();

    c.bench_function("acquire_release_4_threads_x1000", |b| {
        b.iter(|| {
            thread::scope(|scope| {
                for _ in 0..4 {
                    scope.spawn(|| {
                        for _ in 0..1000 {
                            let segment = pool.acquire().unwrap();
                            pool.release(segment).unwrap();
                        }
                    });
                }
            });
        });
    });
}

criterion_group!(
    benches,
    benchmark_acquire_release,
    benchmark_acquire_batch,
    benchmark_contended
);
criterion_main!(benches);
