//! Degenerate pool that runs every task on the caller.

use tracing::error;

use super::error::PoolError;
use super::pool::TaskPool;
use super::task::{execute_runnable, QueueFullPolicy, Runnable};

/// A pool-shaped executor that runs every task synchronously on the
/// submitting thread.
///
/// Useful in tests and single-threaded tools that still want to drive code
/// written against [`TaskPool`]. The default (lenient) mode emulates the
/// real pool's containment: failures are logged and swallowed. The strict
/// mode surfaces them as [`PoolError::Task`] instead.
#[derive(Debug, Clone, Copy)]
pub struct SerialPool {
    ignore_errors: bool,
}

impl SerialPool {
    /// Lenient serial pool: task failures are logged and swallowed, as the
    /// threaded pool would.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ignore_errors: true,
        }
    }

    /// Strict serial pool: task failures come back to the submitter.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            ignore_errors: false,
        }
    }
}

impl Default for SerialPool {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskPool for SerialPool {
    fn start(&self) -> Result<(), PoolError> {
        Ok(())
    }

    fn stop(&self) {}

    fn join(&self) {}

    fn add_task(
        &self,
        task: Box<dyn Runnable>,
        name: &str,
        _policy: QueueFullPolicy,
    ) -> Result<(), PoolError> {
        match execute_runnable(task) {
            Ok(()) => Ok(()),
            Err(source) => {
                error!(task = %name, error = %source, "serial pool task failed");
                if self.ignore_errors {
                    Ok(())
                } else {
                    Err(PoolError::Task {
                        name: name.to_string(),
                        source,
                    })
                }
            }
        }
    }
}
