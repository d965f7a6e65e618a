//! Batch fan-out configuration.

use serde::{Deserialize, Serialize};

use crate::core::PoolError;

fn default_batch_size() -> usize {
    1000
}

fn default_pool_prefix() -> String {
    "batch_processor".to_string()
}

fn default_pool_size() -> usize {
    10
}

/// Sizing and pool selection for a
/// [`BatchConverter`](crate::batch::BatchConverter) fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Values are processed in batches of this size; the last batch may be
    /// shorter.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Registry name of the pool the batches are dispatched to.
    #[serde(default = "default_pool_prefix")]
    pub pool_prefix: String,
    /// Size of that pool. Zero means no threads at all: every batch is
    /// converted on the calling thread.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            pool_prefix: default_pool_prefix(),
            pool_size: default_pool_size(),
        }
    }
}

impl BatchOptions {
    /// Set the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the registry name of the dispatch pool.
    #[must_use]
    pub fn with_pool_prefix(mut self, pool_prefix: impl Into<String>) -> Self {
        self.pool_prefix = pool_prefix.into();
        self
    }

    /// Set the dispatch pool size (zero for serial conversion).
    #[must_use]
    pub const fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Validate the options.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidOptions`] when `batch_size` is zero.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.batch_size == 0 {
            return Err(PoolError::InvalidOptions(
                "batch_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
