//! Construct registered pools from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RegistryConfig;
use crate::core::{PoolError, ThreadPool};
use crate::registry;

/// Register every pool in the configuration through the process-wide
/// factory and return them keyed by name. Pools that already exist are
/// returned as-is: first creation wins, the configured sizing is ignored.
///
/// # Errors
///
/// [`PoolError::InvalidOptions`] when the configuration fails validation.
pub fn build_pools(cfg: &RegistryConfig) -> Result<HashMap<String, Arc<ThreadPool>>, PoolError> {
    cfg.validate()?;
    let mut pools = HashMap::with_capacity(cfg.pools.len());
    for (name, spec) in &cfg.pools {
        let pool = registry::factory_with(spec.to_options(name))?;
        pools.insert(name.clone(), pool);
    }
    Ok(pools)
}
