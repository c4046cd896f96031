//! Task lifecycle state.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a task: `Waiting → Executing → Ready`, strictly forward,
/// terminal at `Ready`. There is no cancellation or failure state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Queued, not yet pulled into a drain batch.
    Waiting = 0,
    /// Currently running on its dispatcher's thread.
    Executing = 1,
    /// Finished; the stored result (if any) is available.
    Ready = 2,
}

fn decode(raw: u8) -> TaskState {
    match raw {
        0 => TaskState::Waiting,
        1 => TaskState::Executing,
        _ => TaskState::Ready,
    }
}

/// State word plus the parking spot for `wait()`.
///
/// The state is an atomic so any thread can poll it without a lock; all
/// writes happen on the thread executing the task. Waiters block on the
/// condvar instead of spin-sleeping; `set_ready` notifies while holding
/// the condvar's mutex so a waiter cannot miss the final transition.
pub(crate) struct StateCell {
    state: AtomicU8,
    lock: Mutex<()>,
    ready: Condvar,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(TaskState::Waiting as u8),
            lock: Mutex::new(()),
            ready: Condvar::new(),
        }
    }

    pub(crate) fn get(&self) -> TaskState {
        decode(self.state.load(Ordering::Acquire))
    }

    /// Waiting → Executing. Called only by the draining thread.
    pub(crate) fn set_executing(&self) {
        self.state.store(TaskState::Executing as u8, Ordering::Release);
    }

    /// Executing → Ready. Called only by the draining thread, exactly once.
    pub(crate) fn set_ready(&self) {
        let _guard = self.lock.lock();
        self.state.store(TaskState::Ready as u8, Ordering::Release);
        self.ready.notify_all();
    }

    /// Block until the state reaches `Ready`.
    ///
    /// No timeout and no cancellation: if the owning dispatcher never
    /// drains, this blocks forever.
    pub(crate) fn wait(&self) {
        if self.get() == TaskState::Ready {
            return;
        }
        let mut guard = self.lock.lock();
        while self.get() != TaskState::Ready {
            self.ready.wait(&mut guard);
        }
    }
}

impl std::fmt::Debug for StateCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StateCell").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn starts_waiting() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), TaskState::Waiting);
    }

    #[test]
    fn forward_transitions() {
        let cell = StateCell::new();
        cell.set_executing();
        assert_eq!(cell.get(), TaskState::Executing);
        cell.set_ready();
        assert_eq!(cell.get(), TaskState::Ready);
    }

    #[test]
    fn wait_returns_immediately_when_ready() {
        let cell = StateCell::new();
        cell.set_executing();
        cell.set_ready();
        cell.wait();
    }

    #[test]
    fn wait_wakes_on_ready() {
        let cell = Arc::new(StateCell::new());
        let waiter = {
            let cell = cell.clone();
            thread::spawn(move || cell.wait())
        };

        cell.set_executing();
        cell.set_ready();
        waiter.join().unwrap();
        assert_eq!(cell.get(), TaskState::Ready);
    }
}
