//! Process-global pool handle.
//!
//! One pool per process, resolved by [`pool()`]: the Rust rendering of
//! the original's type-indexed singleton injection. The handle is stable
//! (an `Arc`) for as long as anyone holds it; [`shutdown()`] releases
//! the global slot and the pool stops once the last handle drops.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::pool::TaskPool;
use parking_lot::RwLock;
use std::sync::Arc;

static GLOBAL_POOL: RwLock<Option<Arc<TaskPool>>> = RwLock::new(None);

/// Initialize the global pool with the default config.
pub fn init() -> Result<()> {
    init_with_config(Config::default())
}

/// Initialize the global pool with `config`.
///
/// Returns [`Error::AlreadyInitialized`] if a pool is already bound.
pub fn init_with_config(config: Config) -> Result<()> {
    let mut slot = GLOBAL_POOL.write();
    if slot.is_some() {
        return Err(Error::AlreadyInitialized);
    }
    *slot = Some(Arc::new(TaskPool::new(&config)?));
    Ok(())
}

/// Resolve the global pool.
pub fn pool() -> Result<Arc<TaskPool>> {
    GLOBAL_POOL.read().clone().ok_or(Error::NotInitialized)
}

/// Unbind the global pool. The pool shuts down when the last
/// outstanding handle from [`pool()`] is dropped.
pub fn shutdown() {
    *GLOBAL_POOL.write() = None;
}
