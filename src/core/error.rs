//! Error types for pool operations.

use thiserror::Error;

/// Errors produced by pool admission, construction, and lifecycle.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The task queue is saturated and the submission allows neither
    /// blocking nor inline execution.
    #[error("task queue is full")]
    Full,
    /// A named pool with this name already exists in the registry.
    #[error("a thread pool named `{0}` already exists")]
    DuplicatePool(String),
    /// No worker threads could be spawned at all during `start`.
    #[error("could not spawn any worker threads")]
    Spawn(#[source] std::io::Error),
    /// A task failed on a strict serial pool.
    #[error("task `{name}` failed")]
    Task {
        /// Diagnostic name the task was submitted under.
        name: String,
        /// The failure returned (or unwound) by the task body.
        #[source]
        source: anyhow::Error,
    },
    /// Configuration validation failed.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(format!("{}", PoolError::Full), "task queue is full");
        assert_eq!(
            format!("{}", PoolError::DuplicatePool("db".into())),
            "a thread pool named `db` already exists"
        );
        let err = PoolError::Task {
            name: "fetch".into(),
            source: anyhow::anyhow!("connection reset"),
        };
        assert_eq!(format!("{err}"), "task `fetch` failed");
    }
}
