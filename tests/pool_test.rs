//! Integration tests for the thread pool.
//!
//! These tests exercise the observable pool behaviors end to end:
//! - baseline sizing and observers
//! - growth under queue saturation
//! - inline fallback and fail-fast backpressure
//! - exception containment and the per-pool metrics
//! - lifecycle laws (idempotent start, stop/start round trip)
//! - the no-worker degenerate mode

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use fleetpool::config::PoolOptions;
use fleetpool::core::{PoolError, QueueFullPolicy, ThreadPool};
use fleetpool::stats;

/// Poll a condition until it holds or the deadline passes.
fn wait_for(mut condition: impl FnMut() -> bool, deadline: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Submit a task that signals completion through `done` once released
/// through the returned gate sender.
fn submit_gated(pool: &ThreadPool, name: &str, done: &Arc<AtomicUsize>) -> crossbeam_channel::Sender<()> {
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(1);
    let done = Arc::clone(done);
    pool.add_task_with(
        move || {
            let _ = gate_rx.recv();
            done.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        name,
        QueueFullPolicy::Block,
    )
    .expect("blocking admission cannot fail");
    gate_tx
}

#[test]
fn baseline_sizing() {
    let pool = ThreadPool::new(
        PoolOptions::new("baseline-pool", 2)
            .with_max_threads(5)
            .with_cpu_check(false),
    )
    .expect("fresh name");
    pool.start().expect("start");

    assert_eq!(pool.len(), 2);
    assert_eq!(pool.pending_tasks(), 0);
    assert_eq!(pool.busy_threads(), 0);
    assert_eq!(pool.min_threads(), 2);
    assert_eq!(pool.max_threads(), 5);

    pool.stop();
    assert!(!pool.is_started());
}

#[test]
fn grows_under_saturation_and_completes_everything() {
    let pool = ThreadPool::new(
        PoolOptions::new("growth-pool", 1)
            .with_max_threads(3)
            .with_cpu_check(false),
    )
    .expect("fresh name");
    pool.start().expect("start");
    assert_eq!(pool.len(), 1);

    // Each gated task occupies a worker or a queue slot; saturating the
    // queue (capacity 3) forces one-worker-at-a-time growth up to the
    // ceiling, since the short-circuited CPU probe reads 0 < 90.
    let done = Arc::new(AtomicUsize::new(0));
    let gates: Vec<_> = (0..6)
        .map(|i| submit_gated(&pool, &format!("task-{i}"), &done))
        .collect();

    assert!(
        wait_for(|| pool.len() == 3, Duration::from_secs(5)),
        "pool should grow to max_threads"
    );
    assert!(wait_for(|| pool.busy_threads() == 3, Duration::from_secs(5)));

    for gate in &gates {
        let _ = gate.send(());
    }
    pool.join();
    assert_eq!(done.load(Ordering::SeqCst), 6);
    assert_eq!(pool.pending_tasks(), 0);

    pool.stop();
}

#[test]
fn inline_fallback_runs_on_the_caller() {
    let pool = ThreadPool::new(
        PoolOptions::new("inline-pool", 1)
            .with_max_threads(1)
            .with_cpu_check(false),
    )
    .expect("fresh name");
    pool.start().expect("start");

    let done = Arc::new(AtomicUsize::new(0));
    let running = submit_gated(&pool, "running", &done);
    assert!(wait_for(|| pool.busy_threads() == 1, Duration::from_secs(5)));
    let queued = submit_gated(&pool, "queued", &done);
    assert_eq!(pool.pending_tasks(), 1);

    // Queue full, pool at its ceiling: the inline policy runs the task on
    // this thread, synchronously, before the workers make any progress.
    let caller = thread::current().id();
    let ran_on = Arc::new(parking_lot::Mutex::new(None));
    let ran_on_clone = Arc::clone(&ran_on);
    pool.add_task_with(
        move || {
            *ran_on_clone.lock() = Some(thread::current().id());
            Ok(())
        },
        "overflow",
        QueueFullPolicy::Inline,
    )
    .expect("inline admission cannot fail");
    assert_eq!(*ran_on.lock(), Some(caller));
    assert_eq!(done.load(Ordering::SeqCst), 0);

    let _ = running.send(());
    let _ = queued.send(());
    pool.join();
    assert_eq!(done.load(Ordering::SeqCst), 2);
    pool.stop();
}

#[test]
fn fail_policy_surfaces_full() {
    let pool = ThreadPool::new(
        PoolOptions::new("full-pool", 1)
            .with_max_threads(1)
            .with_cpu_check(false),
    )
    .expect("fresh name");
    pool.start().expect("start");

    let done = Arc::new(AtomicUsize::new(0));
    let running = submit_gated(&pool, "running", &done);
    assert!(wait_for(|| pool.busy_threads() == 1, Duration::from_secs(5)));
    let queued = submit_gated(&pool, "queued", &done);

    let result = pool.add_task_with(|| Ok(()), "overflow", QueueFullPolicy::Fail);
    assert!(matches!(result, Err(PoolError::Full)));

    let _ = running.send(());
    let _ = queued.send(());
    pool.join();
    pool.stop();
}

#[test]
fn exceptions_are_contained_and_counted() {
    let pool = ThreadPool::new(
        PoolOptions::new("faulty-pool", 2)
            .with_max_threads(2)
            .with_cpu_check(false),
    )
    .expect("fresh name");
    pool.start().expect("start");

    for i in 0..10 {
        let fails = i % 4 == 0; // tasks 0, 4, 8
        pool.add_task_with(
            move || {
                if fails {
                    Err(anyhow::anyhow!("backend unavailable"))
                } else {
                    Ok(())
                }
            },
            format!("task-{i}"),
            QueueFullPolicy::Block,
        )
        .expect("blocking admission cannot fail");
    }
    pool.join();

    // Workers survive their tasks' failures.
    assert_eq!(pool.len(), 2);

    let stats = stats::global();
    assert_eq!(stats.counter_value("faulty-pool_task_exceptions"), Some(3));
    let working = stats.event_stats("faulty-pool_working_time").expect("registered");
    assert_eq!(working.count, 10);
    let queueing = stats.event_stats("faulty-pool_queueing_time").expect("registered");
    assert_eq!(queueing.count, 10);

    pool.stop();
}

#[test]
fn panics_are_contained_too() {
    let pool = ThreadPool::new(
        PoolOptions::new("panicky-pool", 1)
            .with_max_threads(1)
            .with_cpu_check(false),
    )
    .expect("fresh name");
    pool.start().expect("start");

    pool.add_task_with(|| panic!("wild pointer"), "exploding", QueueFullPolicy::Block)
        .expect("admission");
    pool.join();

    assert_eq!(pool.len(), 1, "the worker must survive the panic");
    assert_eq!(
        stats::global().counter_value("panicky-pool_task_exceptions"),
        Some(1)
    );

    pool.stop();
}

#[test]
fn start_is_idempotent() {
    let pool = ThreadPool::new(
        PoolOptions::new("idempotent-pool", 2)
            .with_max_threads(4)
            .with_cpu_check(false),
    )
    .expect("fresh name");
    pool.start().expect("first start");
    pool.start().expect("second start");
    assert_eq!(pool.len(), 2);
    pool.stop();
}

#[test]
fn stop_start_round_trip_restores_the_minimum() {
    let pool = ThreadPool::new(
        PoolOptions::new("roundtrip-pool", 2)
            .with_max_threads(4)
            .with_cpu_check(false),
    )
    .expect("fresh name");

    pool.start().expect("start");
    assert_eq!(pool.len(), 2);
    pool.stop();
    assert_eq!(pool.len(), 0);
    assert!(!pool.is_started());

    pool.start().expect("restart");
    assert_eq!(pool.len(), 2);

    // The gauges keep reflecting live state across the round trip.
    let stats = stats::global();
    assert_eq!(stats.gauge_value("roundtrip-pool_threads"), Some(2.0));
    assert_eq!(stats.gauge_value("roundtrip-pool_outstanding_tasks"), Some(0.0));
    assert!(stats.gauge_value("roundtrip-pool_cpu_use").is_some());

    pool.stop();
}

#[test]
fn metrics_exist_after_construction() {
    let pool = ThreadPool::new(PoolOptions::new("metered-pool", 1).with_cpu_check(false))
        .expect("fresh name");
    let stats = stats::global();
    for metric in [
        "metered-pool_outstanding_tasks",
        "metered-pool_threads",
        "metered-pool_cpu_use",
        "metered-pool_task_exceptions",
        "metered-pool_working_time",
        "metered-pool_queueing_time",
    ] {
        assert!(stats.is_registered(metric), "missing metric {metric}");
    }
    drop(pool);
}

#[test]
fn unnamed_pools_register_no_metrics() {
    let pool = ThreadPool::new(PoolOptions::unnamed(1).with_cpu_check(false)).expect("unnamed");
    pool.start().expect("start");
    assert!(!stats::global().is_registered("_threads"));
    assert_eq!(pool.busy_threads(), 0);
    pool.stop();
}

#[test]
fn no_worker_pool_runs_tasks_synchronously() {
    let pool = ThreadPool::new(PoolOptions::unnamed(0).with_max_threads(0)).expect("unnamed");
    pool.start().expect("start is a no-op for workers");
    assert_eq!(pool.len(), 0);

    let caller = thread::current().id();
    let ran_on = Arc::new(parking_lot::Mutex::new(None));
    let ran_on_clone = Arc::clone(&ran_on);
    pool.add_task(
        move || {
            *ran_on_clone.lock() = Some(thread::current().id());
            Ok(())
        },
        "synchronous",
    )
    .expect("inline execution");
    assert_eq!(*ran_on.lock(), Some(caller));

    pool.stop();
    assert_eq!(pool.len(), 0);
}

#[test]
fn coerces_max_threads_below_min() {
    let pool = ThreadPool::new(
        PoolOptions::new("coerced-pool", 4)
            .with_max_threads(2)
            .with_cpu_check(false),
    )
    .expect("fresh name");
    assert_eq!(pool.max_threads(), 4);
    pool.start().expect("start");
    assert_eq!(pool.len(), 4);
    pool.stop();
}

#[test]
fn join_waits_for_all_admitted_tasks() {
    let pool = ThreadPool::new(
        PoolOptions::new("joined-pool", 2)
            .with_max_threads(2)
            .with_cpu_check(false),
    )
    .expect("fresh name");
    pool.start().expect("start");

    let done = Arc::new(AtomicUsize::new(0));
    for i in 0..8 {
        let done = Arc::clone(&done);
        pool.add_task_with(
            move || {
                thread::sleep(Duration::from_millis(20));
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            format!("sleeper-{i}"),
            QueueFullPolicy::Block,
        )
        .expect("admission");
    }

    pool.join();
    assert_eq!(done.load(Ordering::SeqCst), 8);
    pool.stop();
}
