//! # Fleetpool
//!
//! A self-sizing worker pool for parallelizing short-lived, predominantly
//! I/O-bound work such as agent-fleet data-store access.
//!
//! The pool starts at `min_threads` workers. Tasks are pushed onto a bounded
//! queue whose capacity equals `max_threads`; once the queue saturates, the
//! pool grows one worker at a time up to `max_threads`, but only while the
//! process CPU utilization stays below 90 %. Workers that sit idle for 60
//! seconds, or that have been alive for longer than 600 seconds, retire on
//! their own down to `min_threads`. The result is a pool that expands under
//! I/O-bound pressure and contracts under CPU-bound pressure or light load.
//!
//! ## Key Features
//!
//! - **CPU-aware growth**: saturation only adds workers while the process
//!   has CPU headroom, so CPU-bound workloads do not bloat the pool
//! - **Three backpressure modes**: run the task on the caller, block with
//!   periodic re-evaluation, or fail fast with [`PoolError::Full`]
//! - **Exception containment**: a failing or panicking task is logged and
//!   counted, never killing its worker or the submitter
//! - **Named-pool registry**: one canonical pool per name, shared
//!   process-wide, with per-pool gauges, counters, and timing events
//! - **Batched fan-out**: stream a large input through a pool in fixed-size
//!   batches via [`batch::BatchConverter`]
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! # fn main() -> Result<(), fleetpool::core::PoolError> {
//! let pool = fleetpool::registry::factory("datastore", 4)?;
//! pool.start()?;
//! for shard in 0..32_u32 {
//!     pool.add_task(move || {
//!         // fetch or write the shard here
//!         let _ = shard;
//!         Ok(())
//!     }, format!("shard-{shard}"))?;
//! }
//! pool.join();
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core pool, worker, and task abstractions.
pub mod core;
/// Configuration records for pools and batch conversion.
pub mod config;
/// Builders to construct registered pools from configuration.
pub mod builders;
/// Batched fan-out conversion on top of a pool.
pub mod batch;
/// Process-wide named-pool registry.
pub mod registry;
/// Metrics sink interface and the in-process registry implementation.
pub mod stats;
/// Shared utilities.
pub mod util;

pub use crate::batch::BatchConverter;
pub use crate::config::{BatchOptions, PoolOptions};
pub use crate::core::{PoolError, QueueFullPolicy, Runnable, SerialPool, TaskPool, ThreadPool};
