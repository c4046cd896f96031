//! Process-wide registry mapping a thread to its dispatcher.
//!
//! Writes happen at dispatcher construction and drop, under one lock.
//! Lookups clone a weak ref and upgrade it, so a dispatcher that has
//! been dropped resolves to `None` instead of a dangling entry.

use super::DispatcherShared;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use std::thread::ThreadId;

static REGISTRY: OnceLock<Mutex<HashMap<ThreadId, Weak<DispatcherShared>>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<ThreadId, Weak<DispatcherShared>>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Register `shared` as the dispatcher for `thread`.
///
/// One live dispatcher per thread: registering over a live entry is an
/// error, not a silent shadow. A dead entry (dispatcher dropped without
/// deregistering, e.g. after a leaked handle) is replaced.
pub(crate) fn register(thread: ThreadId, shared: &Arc<DispatcherShared>) -> Result<()> {
    let mut map = registry().lock();
    if let Some(existing) = map.get(&thread) {
        if existing.upgrade().is_some() {
            return Err(Error::DispatcherExists);
        }
    }
    map.insert(thread, Arc::downgrade(shared));
    Ok(())
}

/// Remove the entry for `thread`, but only if it still points at
/// `shared`; a replacement registered after a failed drop race stays.
pub(crate) fn deregister(thread: ThreadId, shared: &Arc<DispatcherShared>) {
    let mut map = registry().lock();
    if let Some(existing) = map.get(&thread) {
        if Weak::as_ptr(existing) == Arc::as_ptr(shared) {
            map.remove(&thread);
        }
    }
}

/// Upgraded shared state for `thread`'s dispatcher, if one is live.
pub(crate) fn lookup(thread: ThreadId) -> Option<Arc<DispatcherShared>> {
    registry().lock().get(&thread).and_then(Weak::upgrade)
}

/// Weak ref for `thread`'s dispatcher, dangling if none is registered.
/// Captured by tasks as their resume context.
pub(crate) fn lookup_weak(thread: ThreadId) -> Weak<DispatcherShared> {
    registry()
        .lock()
        .get(&thread)
        .cloned()
        .unwrap_or_default()
}
