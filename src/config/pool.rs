//! Pool configuration records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::PoolError;

const fn default_cpu_check() -> bool {
    true
}

/// Options for constructing a [`ThreadPool`](crate::core::ThreadPool).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolOptions {
    /// Pool name; prefixes worker thread names and metric names. Empty
    /// means unnamed: no registry entry, no metrics, no idle bookkeeping.
    pub name: String,
    /// Workers kept alive at all times.
    pub min_threads: usize,
    /// Ceiling the pool may grow to, which is also the queue capacity.
    /// `None` or any value below `min_threads` is coerced up to
    /// `min_threads`. Zero (with a zero minimum) means no workers at all:
    /// every task runs on the submitting thread.
    #[serde(default)]
    pub max_threads: Option<usize>,
    /// When false, the CPU probe is short-circuited to zero and growth is
    /// governed by queue saturation alone.
    #[serde(default = "default_cpu_check")]
    pub cpu_check: bool,
}

impl PoolOptions {
    /// Options for a named pool of at least `min_threads` workers.
    pub fn new(name: impl Into<String>, min_threads: usize) -> Self {
        Self {
            name: name.into(),
            min_threads,
            max_threads: None,
            cpu_check: true,
        }
    }

    /// Options for an unnamed pool (no registry entry, no metrics).
    #[must_use]
    pub fn unnamed(min_threads: usize) -> Self {
        Self::new("", min_threads)
    }

    /// Set the growth ceiling.
    #[must_use]
    pub const fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = Some(max_threads);
        self
    }

    /// Enable or disable the CPU growth check.
    #[must_use]
    pub const fn with_cpu_check(mut self, cpu_check: bool) -> Self {
        self.cpu_check = cpu_check;
        self
    }

    /// The effective ceiling after coercion: never below `min_threads`.
    #[must_use]
    pub fn resolved_max_threads(&self) -> usize {
        self.max_threads
            .map_or(self.min_threads, |max| max.max(self.min_threads))
    }
}

/// Sizing for one pool inside a [`RegistryConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSpec {
    /// Workers kept alive at all times.
    pub min_threads: usize,
    /// Growth ceiling; coerced like [`PoolOptions::max_threads`].
    #[serde(default)]
    pub max_threads: Option<usize>,
    /// CPU growth check toggle.
    #[serde(default = "default_cpu_check")]
    pub cpu_check: bool,
}

impl PoolSpec {
    /// Expand into full options under the given registry name.
    #[must_use]
    pub fn to_options(&self, name: &str) -> PoolOptions {
        PoolOptions {
            name: name.to_string(),
            min_threads: self.min_threads,
            max_threads: self.max_threads,
            cpu_check: self.cpu_check,
        }
    }
}

/// Root configuration mapping pool names to sizing specs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Map of pool name to spec.
    pub pools: HashMap<String, PoolSpec>,
}

impl RegistryConfig {
    /// Validate that the configuration describes at least one named pool.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidOptions`] when empty or when a pool name is the
    /// empty string (unnamed pools cannot be registered).
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.pools.is_empty() {
            return Err(PoolError::InvalidOptions(
                "at least one pool must be defined".into(),
            ));
        }
        if self.pools.keys().any(String::is_empty) {
            return Err(PoolError::InvalidOptions(
                "registered pools must be named".into(),
            ));
        }
        Ok(())
    }

    /// Parse a configuration from a JSON string and validate it.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidOptions`] on parse failure or invalid content.
    pub fn from_json_str(input: &str) -> Result<Self, PoolError> {
        let cfg: Self = serde_json::from_str(input)
            .map_err(|e| PoolError::InvalidOptions(format!("parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
