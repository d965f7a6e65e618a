//! The self-sizing thread pool.
//!
//! The pool owns a bounded task queue whose capacity equals `max_threads`.
//! Coupling capacity to the size ceiling makes admission saturation and
//! growth opportunity the same condition: a full queue is exactly the signal
//! that one more worker may be warranted, so the admission loop cannot
//! oscillate. Growth is one worker per saturation event and is suppressed
//! while the process CPU utilization is at or above the ceiling, which keeps
//! I/O-bound workloads expanding and CPU-bound workloads from bloating the
//! pool with context-switch overhead.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::PoolOptions;
use crate::registry;
use crate::stats::{self, StatsSink};
use crate::util::cpu::{CpuProbe, ProcessCpuProbe};

use super::error::PoolError;
use super::queue::TaskQueue;
use super::task::{execute_runnable, QueueFullPolicy, Runnable, Task};
use super::worker::Worker;

/// Workers idle for this long retire, provided the pool stays above
/// `min_threads`.
pub const IDLE_WORKER_TIMEOUT: Duration = Duration::from_secs(60);
/// Workers older than this retire after their next completed task, so the
/// pool can shrink even under sustained load and replacements are admitted
/// under a fresh CPU-pressure check.
pub const MAX_WORKER_AGE: Duration = Duration::from_secs(600);
/// Cadence at which blocking admission re-enters the growth check.
pub const BLOCKING_RETRY_INTERVAL: Duration = Duration::from_secs(1);
/// No growth while process CPU utilization is at or above this percentage.
pub const CPU_GROWTH_CEILING: f32 = 90.0;

/// The submission interface shared by [`ThreadPool`] and
/// [`SerialPool`](super::serial::SerialPool).
///
/// The batch fan-out layer depends on this interface, not on a concrete
/// pool, so the degenerate run-on-caller implementation is a drop-in.
pub trait TaskPool {
    /// Bring the pool to its operational worker count. Idempotent.
    fn start(&self) -> Result<(), PoolError>;
    /// Drain and terminate every worker, then wait for them.
    fn stop(&self);
    /// Block until every admitted task has been acknowledged.
    fn join(&self);
    /// Admit one task under the given queue-full policy.
    fn add_task(
        &self,
        task: Box<dyn Runnable>,
        name: &str,
        policy: QueueFullPolicy,
    ) -> Result<(), PoolError>;
}

/// Metric names derived once from the pool name.
pub(crate) struct MetricNames {
    pub(crate) outstanding_tasks: String,
    pub(crate) threads: String,
    pub(crate) cpu_use: String,
    pub(crate) task_exceptions: String,
    pub(crate) working_time: String,
    pub(crate) queueing_time: String,
}

impl MetricNames {
    fn new(pool: &str) -> Self {
        Self {
            outstanding_tasks: format!("{pool}_outstanding_tasks"),
            threads: format!("{pool}_threads"),
            cpu_use: format!("{pool}_cpu_use"),
            task_exceptions: format!("{pool}_task_exceptions"),
            working_time: format!("{pool}_working_time"),
            queueing_time: format!("{pool}_queueing_time"),
        }
    }
}

struct WorkerHandle {
    idle: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// State guarded by the pool lock: the live worker set and the started flag.
struct PoolCore {
    workers: HashMap<String, WorkerHandle>,
    started: bool,
}

/// Shared pool internals. Workers hold an `Arc` to this.
pub(crate) struct PoolInner {
    pub(crate) name: String,
    pub(crate) min_threads: usize,
    pub(crate) max_threads: usize,
    cpu_check: bool,
    pub(crate) queue: TaskQueue,
    core: Mutex<PoolCore>,
    /// Read-only snapshot of the live set, refreshed on every mutation.
    /// Observers read this without taking the pool lock; staleness is
    /// bounded by one mutation.
    workers_ro: RwLock<HashMap<String, Arc<AtomicBool>>>,
    probe: Arc<dyn CpuProbe>,
    pub(crate) stats: Arc<dyn StatsSink>,
    pub(crate) metric_names: Option<MetricNames>,
    worker_seq: AtomicU64,
    pub(crate) idle_timeout: Duration,
    pub(crate) max_worker_age: Duration,
}

impl PoolInner {
    pub(crate) fn is_named(&self) -> bool {
        !self.name.is_empty()
    }

    /// Process CPU percentage, short-circuited to zero when the check is
    /// disabled.
    pub(crate) fn cpu_usage(&self) -> f32 {
        if self.cpu_check {
            self.probe.cpu_usage()
        } else {
            0.0
        }
    }

    fn live_workers(&self) -> usize {
        self.workers_ro.read().len()
    }

    fn busy_workers(&self) -> usize {
        self.workers_ro
            .read()
            .values()
            .filter(|idle| !idle.load(Ordering::Acquire))
            .count()
    }

    /// Worker self-retirement. Declines at or below `min_threads`; after
    /// `stop` has drained the live set the count is zero, so a late
    /// retirement attempt always declines and the worker lives on to
    /// consume its sentinel.
    pub(crate) fn try_retire(&self, worker_name: &str) -> bool {
        let mut core = self.core.lock();
        if core.workers.len() <= self.min_threads {
            return false;
        }
        core.workers.remove(worker_name);
        self.refresh_snapshot(&core);
        true
    }

    fn refresh_snapshot(&self, core: &PoolCore) {
        let snapshot = core
            .workers
            .iter()
            .map(|(name, handle)| (name.clone(), Arc::clone(&handle.idle)))
            .collect();
        *self.workers_ro.write() = snapshot;
    }
}

/// Spawn one worker thread and enter it into the live set.
fn spawn_worker(inner: &Arc<PoolInner>, core: &mut PoolCore) -> io::Result<()> {
    let seq = inner.worker_seq.fetch_add(1, Ordering::Relaxed);
    let name = if inner.name.is_empty() {
        format!("worker-{seq}")
    } else {
        format!("{}-worker-{seq}", inner.name)
    };
    let idle = Arc::new(AtomicBool::new(true));
    let worker = Worker::new(name.clone(), Arc::clone(&idle), Arc::clone(inner));
    let thread = std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || worker.run())?;
    core.workers.insert(name.clone(), WorkerHandle { idle, thread });
    inner.refresh_snapshot(core);
    debug!(worker = %name, "worker spawned");
    Ok(())
}

fn register_metrics(inner: &Arc<PoolInner>) {
    let Some(names) = &inner.metric_names else {
        return;
    };
    let stats = &inner.stats;

    stats.register_gauge(&names.outstanding_tasks);
    let pool = Arc::downgrade(inner);
    stats.set_gauge_callback(
        &names.outstanding_tasks,
        Box::new(move || upgraded(&pool, |p| p.queue.len() as f64)),
    );

    stats.register_gauge(&names.threads);
    let pool = Arc::downgrade(inner);
    stats.set_gauge_callback(
        &names.threads,
        Box::new(move || upgraded(&pool, |p| p.live_workers() as f64)),
    );

    stats.register_gauge(&names.cpu_use);
    let pool = Arc::downgrade(inner);
    stats.set_gauge_callback(
        &names.cpu_use,
        Box::new(move || upgraded(&pool, |p| f64::from(p.cpu_usage()))),
    );

    stats.register_counter(&names.task_exceptions);
    stats.register_event(&names.working_time);
    stats.register_event(&names.queueing_time);
}

fn upgraded(pool: &Weak<PoolInner>, read: impl Fn(&PoolInner) -> f64) -> f64 {
    pool.upgrade().map_or(0.0, |inner| read(&inner))
}

/// A self-sizing pool of worker threads over a bounded FIFO queue.
///
/// Created directly from [`PoolOptions`] for unnamed or one-off pools, or —
/// for process-wide shared pools — through
/// [`registry::factory`](crate::registry::factory), which hands back the
/// canonical instance per name.
pub struct ThreadPool {
    inner: Arc<PoolInner>,
}

impl ThreadPool {
    /// Construct a pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::DuplicatePool`] when the options carry a name
    /// that is already registered; every distinct named pool must own a
    /// unique metric namespace. The registry factory never trips this: it
    /// returns the existing instance instead.
    pub fn new(options: PoolOptions) -> Result<Self, PoolError> {
        if !options.name.is_empty() && registry::is_registered(&options.name) {
            return Err(PoolError::DuplicatePool(options.name));
        }
        Ok(Self::unchecked(options))
    }

    /// Construction without the duplicate-name check, for the registry
    /// factory (which holds the registry lock and inserts atomically).
    pub(crate) fn unchecked(options: PoolOptions) -> Self {
        Self::build(
            options,
            stats::global(),
            Arc::new(ProcessCpuProbe::new()),
            IDLE_WORKER_TIMEOUT,
            MAX_WORKER_AGE,
        )
    }

    pub(crate) fn build(
        options: PoolOptions,
        stats: Arc<dyn StatsSink>,
        probe: Arc<dyn CpuProbe>,
        idle_timeout: Duration,
        max_worker_age: Duration,
    ) -> Self {
        let max_threads = options.resolved_max_threads();
        let metric_names = (!options.name.is_empty()).then(|| MetricNames::new(&options.name));
        let inner = Arc::new(PoolInner {
            name: options.name,
            min_threads: options.min_threads,
            max_threads,
            cpu_check: options.cpu_check,
            queue: TaskQueue::with_capacity(max_threads),
            core: Mutex::new(PoolCore {
                workers: HashMap::new(),
                started: false,
            }),
            workers_ro: RwLock::new(HashMap::new()),
            probe,
            stats,
            metric_names,
            worker_seq: AtomicU64::new(0),
            idle_timeout,
            max_worker_age,
        });
        if inner.metric_names.is_some() {
            register_metrics(&inner);
        }
        Self { inner }
    }

    /// Spawn the minimum worker complement. Idempotent once started.
    ///
    /// Individual spawn failures are logged and the pool continues with
    /// fewer workers.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] only when a nonzero minimum was
    /// requested and not a single worker could be created.
    pub fn start(&self) -> Result<(), PoolError> {
        let inner = &self.inner;
        let mut core = inner.core.lock();
        if core.started {
            return Ok(());
        }
        core.started = true;

        let mut spawned = 0_usize;
        let mut last_error = None;
        for _ in 0..inner.min_threads {
            match spawn_worker(inner, &mut core) {
                Ok(()) => spawned += 1,
                Err(error) => {
                    error!(pool = %inner.name, %error, "could not spawn worker thread");
                    last_error = Some(error);
                }
            }
        }
        if spawned == 0 {
            if let Some(error) = last_error {
                // Every spawn failed; the pool is unusable at this size.
                return Err(PoolError::Spawn(error));
            }
        }
        info!(pool = %inner.name, workers = spawned, "thread pool started");
        Ok(())
    }

    /// Drain and terminate every worker, then wait for them.
    ///
    /// The captured workers each receive one stop sentinel; FIFO ordering
    /// puts the sentinels behind every task already admitted, so in-flight
    /// work drains before the workers exit. A pool that was never started
    /// logs a warning and returns.
    pub fn stop(&self) {
        let inner = &self.inner;
        let captured: Vec<WorkerHandle> = {
            let mut core = inner.core.lock();
            if !core.started {
                warn!(pool = %inner.name, "tried to stop a thread pool that was not running");
                return;
            }
            let captured = core.workers.drain().map(|(_, handle)| handle).collect();
            inner.refresh_snapshot(&core);
            core.started = false;
            captured
        };

        for _ in &captured {
            inner.queue.push_sentinel();
        }

        self.join();

        for handle in captured {
            if handle.thread.join().is_err() {
                error!(pool = %inner.name, "worker thread panicked outside a task");
            }
        }
        info!(pool = %inner.name, "thread pool stopped");
    }

    /// Block until the queue's outstanding count reaches zero, i.e. every
    /// admitted task (and shutdown sentinel) has been acknowledged.
    pub fn join(&self) {
        self.inner.queue.join();
    }

    /// Admit a task under the default queue-full policy
    /// ([`QueueFullPolicy::Inline`]): callers never observe
    /// [`PoolError::Full`], the system degrades to running work on the
    /// caller instead.
    ///
    /// # Errors
    ///
    /// None under the default policy; the signature matches
    /// [`add_task_with`](Self::add_task_with).
    pub fn add_task<R: Runnable>(
        &self,
        task: R,
        name: impl Into<String>,
    ) -> Result<(), PoolError> {
        self.submit(Box::new(task), name.into(), QueueFullPolicy::default())
    }

    /// Admit a task under an explicit queue-full policy.
    ///
    /// # Errors
    ///
    /// [`PoolError::Full`] when the queue is saturated, the pool cannot
    /// grow, and the policy is [`QueueFullPolicy::Fail`].
    pub fn add_task_with<R: Runnable>(
        &self,
        task: R,
        name: impl Into<String>,
        policy: QueueFullPolicy,
    ) -> Result<(), PoolError> {
        self.submit(Box::new(task), name.into(), policy)
    }

    fn submit(
        &self,
        runnable: Box<dyn Runnable>,
        name: String,
        policy: QueueFullPolicy,
    ) -> Result<(), PoolError> {
        let inner = &self.inner;

        // A pool with no workers runs everything on the submitting thread.
        if inner.max_threads == 0 {
            run_on_caller(runnable, &name);
            return Ok(());
        }

        let mut task = Task::new(runnable, name);
        let mut core = inner.core.lock();
        loop {
            task.enqueued_at = Instant::now();
            task = match inner.queue.try_push(task) {
                Ok(()) => return Ok(()),
                Err(task) => task,
            };

            // Saturated. Add one worker if we are below the ceiling and the
            // process still has CPU headroom: workers waiting on I/O keep
            // CPU low and earn reinforcements, CPU-bound tasks do not.
            if core.workers.len() < inner.max_threads && inner.cpu_usage() < CPU_GROWTH_CEILING {
                match spawn_worker(inner, &mut core) {
                    Ok(()) => continue,
                    Err(error) => {
                        error!(pool = %inner.name, %error, "could not spawn worker thread");
                    }
                }
            }

            match policy {
                QueueFullPolicy::Inline => break,
                QueueFullPolicy::Block => {
                    task.enqueued_at = Instant::now();
                    task = match inner.queue.push_timeout(task, BLOCKING_RETRY_INTERVAL) {
                        Ok(()) => return Ok(()),
                        Err(task) => task,
                    };
                }
                QueueFullPolicy::Fail => return Err(PoolError::Full),
            }
        }
        drop(core);

        // Inline execution happens outside the pool lock.
        run_on_caller(task.runnable, &task.name);
        Ok(())
    }

    /// Number of tasks currently waiting in the queue.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.inner.queue.len()
    }

    /// Number of workers currently executing a task. Unnamed pools skip
    /// idle bookkeeping entirely and always read zero here.
    #[must_use]
    pub fn busy_threads(&self) -> usize {
        self.inner.busy_workers()
    }

    /// Number of live workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.live_workers()
    }

    /// True when no workers are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The pool name; empty for unnamed pools.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Workers kept alive at all times.
    #[must_use]
    pub fn min_threads(&self) -> usize {
        self.inner.min_threads
    }

    /// Ceiling the pool may grow to; also the queue capacity.
    #[must_use]
    pub fn max_threads(&self) -> usize {
        self.inner.max_threads
    }

    /// Whether `start` has run without a matching `stop`.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.core.lock().started
    }
}

impl TaskPool for ThreadPool {
    fn start(&self) -> Result<(), PoolError> {
        Self::start(self)
    }

    fn stop(&self) {
        Self::stop(self);
    }

    fn join(&self) {
        Self::join(self);
    }

    fn add_task(
        &self,
        task: Box<dyn Runnable>,
        name: &str,
        policy: QueueFullPolicy,
    ) -> Result<(), PoolError> {
        self.submit(task, name.to_string(), policy)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        let started = self.inner.core.lock().started;
        if started {
            debug!(pool = %self.inner.name, "thread pool dropped while started, stopping");
            self.stop();
        }
    }
}

/// Run a task on the submitting thread with the same containment the
/// workers apply: failures are logged, never propagated.
fn run_on_caller(runnable: Box<dyn Runnable>, name: &str) {
    if let Err(error) = execute_runnable(runnable) {
        error!(task = %name, error = %error, "task failed on the submitting thread");
    }
}
