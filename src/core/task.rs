//! Task representation and queue-full backpressure policy.

use std::time::Instant;

/// A unit of work executed by a pool.
///
/// Callers curry whatever arguments the work needs into an `FnOnce` at
/// submission time; the blanket impl makes any
/// `FnOnce() -> anyhow::Result<()>` submittable directly.
pub trait Runnable: Send + 'static {
    /// Consume and execute the task, reporting failure to the worker.
    ///
    /// The return value never escapes the pool: workers log and count
    /// failures, then keep going.
    fn run(self: Box<Self>) -> anyhow::Result<()>;
}

impl<F> Runnable for F
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    fn run(self: Box<Self>) -> anyhow::Result<()> {
        (*self)()
    }
}

/// What `add_task` does when the queue is saturated and the pool cannot
/// grow any further.
///
/// The modes are mutually exclusive: inline execution supersedes blocking,
/// which is why this is an enum rather than a pair of flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueFullPolicy {
    /// Run the task on the submitting thread. Preserves progress when every
    /// worker is wedged on an external resource, at the cost of borrowing
    /// the caller. This is the default: callers never observe
    /// [`PoolError::Full`](crate::core::PoolError::Full) unless they opt in.
    #[default]
    Inline,
    /// Block, retrying admission every second so a stuck caller re-enters
    /// the growth/CPU check.
    Block,
    /// Fail fast with [`PoolError::Full`](crate::core::PoolError::Full).
    Fail,
}

/// A task admitted to the queue, stamped for the queueing-time histogram.
pub(crate) struct Task {
    pub(crate) runnable: Box<dyn Runnable>,
    pub(crate) name: String,
    pub(crate) enqueued_at: Instant,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("enqueued_at", &self.enqueued_at)
            .finish()
    }
}

impl Task {
    pub(crate) fn new(runnable: Box<dyn Runnable>, name: String) -> Self {
        Self {
            runnable,
            name,
            enqueued_at: Instant::now(),
        }
    }
}

/// Queue element: a real task, or the stop sentinel that tells a worker to
/// terminate. The tag keeps the sentinel unambiguous against any task.
pub(crate) enum QueueItem {
    Task(Task),
    Stop,
}

/// Execute a task at the containment boundary: a returned error comes back
/// as-is, a panic is captured and converted. A worker must not die because
/// one of its tasks failed, so this is the only place a task body is ever
/// invoked.
pub(crate) fn execute_runnable(runnable: Box<dyn Runnable>) -> anyhow::Result<()> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| runnable.run())) {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!(
            "task panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("opaque panic payload")
}
