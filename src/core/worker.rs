//! Worker thread body.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, error};

use super::pool::PoolInner;
use super::task::{execute_runnable, QueueItem, Task};

/// One worker bound to a single pool. Executes tasks serially from the
/// shared queue with full exception containment, and participates in size
/// regulation by retiring itself when idle or old.
pub(crate) struct Worker {
    name: String,
    /// Cleared while executing a task; written only by this worker.
    /// Unnamed pools skip idle bookkeeping entirely.
    idle: Arc<AtomicBool>,
    started_at: Instant,
    inner: Arc<PoolInner>,
}

impl Worker {
    pub(crate) fn new(name: String, idle: Arc<AtomicBool>, inner: Arc<PoolInner>) -> Self {
        Self {
            name,
            idle,
            started_at: Instant::now(),
            inner,
        }
    }

    pub(crate) fn run(self) {
        debug!(worker = %self.name, "worker started");
        loop {
            if self.inner.is_named() {
                self.idle.store(true, Ordering::Release);
            }

            match self.inner.queue.pop(self.inner.idle_timeout) {
                Ok(item) => {
                    if self.inner.is_named() {
                        self.idle.store(false, Ordering::Release);
                    }
                    match item {
                        QueueItem::Stop => {
                            // Sentinels are not tasks: no metric work, but
                            // the outstanding count drops in lockstep so a
                            // concurrent `join` can complete.
                            self.inner.queue.task_done();
                            debug!(worker = %self.name, "worker stopping on sentinel");
                            return;
                        }
                        QueueItem::Task(task) => {
                            self.process_task(task);
                            self.inner.queue.task_done();
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.inner.try_retire(&self.name) {
                        debug!(worker = %self.name, "idle worker retired");
                        return;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return,
            }

            // Old workers step aside once their current task is done, so
            // the pool can shrink even when it is never idle and any
            // replacement is admitted under a fresh CPU-pressure check.
            if self.started_at.elapsed() > self.inner.max_worker_age
                && self.inner.try_retire(&self.name)
            {
                debug!(worker = %self.name, "aged worker retired");
                return;
            }
        }
    }

    fn process_task(&self, task: Task) {
        let inner = &self.inner;
        let Task {
            runnable,
            name,
            enqueued_at,
        } = task;

        if let Some(names) = &inner.metric_names {
            inner
                .stats
                .record_event(&names.queueing_time, enqueued_at.elapsed().as_secs_f64());
        }

        let started = Instant::now();
        if let Err(error) = execute_runnable(runnable) {
            if let Some(names) = &inner.metric_names {
                inner.stats.increment_counter(&names.task_exceptions);
            }
            error!(worker = %self.name, task = %name, error = %error, "caught failure in worker thread");
        }

        if let Some(names) = &inner.metric_names {
            inner
                .stats
                .record_event(&names.working_time, started.elapsed().as_secs_f64());
        }
    }
}
