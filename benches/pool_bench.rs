//! Benchmarks for pool admission and fan-out throughput.
//!
//! Covers:
//! - admission + drain of no-op tasks at several pool sizes
//! - the no-worker degenerate pool (pure inline execution)

use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use fleetpool::config::PoolOptions;
use fleetpool::core::{QueueFullPolicy, ThreadPool};

const TASKS_PER_ITER: u64 = 256;

fn bench_submit_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_join");
    group.throughput(Throughput::Elements(TASKS_PER_ITER));

    for workers in [1_usize, 4, 8] {
        let pool = ThreadPool::new(
            PoolOptions::unnamed(workers)
                .with_max_threads(workers)
                .with_cpu_check(false),
        )
        .expect("unnamed pool");
        pool.start().expect("start");

        group.bench_with_input(
            BenchmarkId::from_parameter(workers),
            &pool,
            |b, pool| {
                b.iter(|| {
                    let counter = Arc::new(AtomicU64::new(0));
                    for i in 0..TASKS_PER_ITER {
                        let counter = Arc::clone(&counter);
                        pool.add_task_with(
                            move || {
                                counter.fetch_add(black_box(i) + 1, Ordering::Relaxed);
                                Ok(())
                            },
                            "bench-task",
                            QueueFullPolicy::Block,
                        )
                        .expect("admission");
                    }
                    pool.join();
                    black_box(counter.load(Ordering::Relaxed))
                });
            },
        );

        pool.stop();
    }
    group.finish();
}

fn bench_inline_degenerate(c: &mut Criterion) {
    let pool = ThreadPool::new(PoolOptions::unnamed(0).with_max_threads(0)).expect("unnamed pool");
    let mut group = c.benchmark_group("inline_degenerate");
    group.throughput(Throughput::Elements(TASKS_PER_ITER));

    group.bench_function("run_on_caller", |b| {
        b.iter(|| {
            let counter = Arc::new(AtomicU64::new(0));
            for i in 0..TASKS_PER_ITER {
                let counter = Arc::clone(&counter);
                pool.add_task(
                    move || {
                        counter.fetch_add(black_box(i) + 1, Ordering::Relaxed);
                        Ok(())
                    },
                    "bench-task",
                )
                .expect("inline execution");
            }
            black_box(counter.load(Ordering::Relaxed))
        });
    });
    group.finish();
}

criterion_group!(benches, bench_submit_join, bench_inline_degenerate);
criterion_main!(benches);
