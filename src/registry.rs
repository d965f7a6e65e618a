//! Process-wide named-pool registry.
//!
//! Different parts of a process share pools by name: the first creation
//! wins, and repeat lookups hand back the canonical instance with the
//! original sizing, ignoring any sizing arguments supplied later. This is
//! what guarantees a unique metric namespace per named pool. The registry
//! lock is independent of any per-pool lock; where both are taken, the
//! order is registry first, then pool.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::config::PoolOptions;
use crate::core::{PoolError, ThreadPool};

static POOLS: Lazy<Mutex<HashMap<String, Arc<ThreadPool>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Return the pool registered under `name`, creating it with `min_threads`
/// workers (and a matching ceiling) on first use.
///
/// # Errors
///
/// None today; the `Result` mirrors [`factory_with`].
pub fn factory(name: &str, min_threads: usize) -> Result<Arc<ThreadPool>, PoolError> {
    factory_with(PoolOptions::new(name, min_threads))
}

/// As [`factory`], with full control over the options.
///
/// Pools with an empty name bypass the registry entirely: every call
/// constructs a fresh unregistered pool.
///
/// # Errors
///
/// None today; kept fallible so construction-time validation can be added
/// without breaking callers.
pub fn factory_with(options: PoolOptions) -> Result<Arc<ThreadPool>, PoolError> {
    if options.name.is_empty() {
        return Ok(Arc::new(ThreadPool::unchecked(options)));
    }
    let mut pools = POOLS.lock();
    if let Some(pool) = pools.get(&options.name) {
        return Ok(Arc::clone(pool));
    }
    let name = options.name.clone();
    let pool = Arc::new(ThreadPool::unchecked(options));
    pools.insert(name, Arc::clone(&pool));
    Ok(pool)
}

/// Look up a registered pool without creating one.
#[must_use]
pub fn get(name: &str) -> Option<Arc<ThreadPool>> {
    POOLS.lock().get(name).cloned()
}

/// Whether a pool with this name is registered. Direct construction uses
/// this to reject duplicate metric namespaces.
pub(crate) fn is_registered(name: &str) -> bool {
    POOLS.lock().contains_key(name)
}

/// Drop every registered pool, stopping the ones that are running. Tests
/// use this to isolate registry state between cases.
pub fn reset_for_testing() {
    let pools: Vec<Arc<ThreadPool>> = {
        let mut map = POOLS.lock();
        map.drain().map(|(_, pool)| pool).collect()
    };
    for pool in pools {
        if pool.is_started() {
            pool.stop();
        }
    }
}
