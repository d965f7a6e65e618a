//! Configuration records for pools and batch conversion.

pub mod batch;
pub mod pool;

pub use batch::BatchOptions;
pub use pool::{PoolOptions, PoolSpec, RegistryConfig};
