//! Core pool, worker, and task abstractions.

pub mod error;
pub mod pool;
mod queue;
pub mod serial;
pub mod task;
mod worker;

pub use error::PoolError;
pub use pool::{
    TaskPool, ThreadPool, BLOCKING_RETRY_INTERVAL, CPU_GROWTH_CEILING, IDLE_WORKER_TIMEOUT,
    MAX_WORKER_AGE,
};
pub use serial::SerialPool;
pub use task::{QueueFullPolicy, Runnable};
