//! Single-thread-owned task queue.
//!
//! A [`Dispatcher`] is owned by the thread that constructs it. Any thread
//! may submit tasks through a [`DispatcherHandle`]; only the owning
//! thread drains them with [`Dispatcher::dispatch`].

mod registry;

use crate::error::Result;
use crate::task::{FnTask, Priority, Task, TaskHandle};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

/// State shared between the owning dispatcher, its submission handles and
/// the resume contexts captured by tasks.
pub(crate) struct DispatcherShared {
    owner: ThreadId,
    pending: Mutex<VecDeque<TaskHandle>>,
    // pending + in-flight; a load-balancing heuristic, read relaxed
    depth: AtomicUsize,
}

impl DispatcherShared {
    fn new(owner: ThreadId) -> Self {
        Self {
            owner,
            pending: Mutex::new(VecDeque::new()),
            depth: AtomicUsize::new(0),
        }
    }

    /// Enqueue an erased task handle: `Low` at the tail, `High` at the
    /// head. Callable from any thread.
    fn push(&self, handle: TaskHandle) {
        let mut pending = self.pending.lock();
        match handle.priority() {
            Priority::Low => pending.push_back(handle),
            Priority::High => pending.push_front(handle),
        }
        self.depth.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_task<T, F>(self: &Arc<Self>, priority: Priority, func: F) -> Task<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        // The resume context is the *calling* thread's dispatcher, not
        // this one: continuations run back where the task came from.
        let raw = Arc::new(FnTask::new(func, priority, ResumeContext::current()));
        self.push(TaskHandle::new(raw.clone()));
        Task::from_raw(raw)
    }

    pub(crate) fn total_queued(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub(crate) fn owner(&self) -> ThreadId {
        self.owner
    }
}

/// A single-thread-owned task queue.
///
/// Construction registers the dispatcher for the current thread in the
/// process-wide registry; drop removes it. One live dispatcher per
/// thread.
///
/// Not `Send`: `dispatch()` belongs to the constructing thread.
pub struct Dispatcher {
    shared: Arc<DispatcherShared>,
    _not_send: PhantomData<*const ()>,
}

impl Dispatcher {
    /// Create and register the dispatcher for the current thread.
    ///
    /// Returns [`Error::DispatcherExists`] if this thread already has a
    /// live dispatcher.
    ///
    /// [`Error::DispatcherExists`]: crate::Error::DispatcherExists
    pub fn new() -> Result<Self> {
        let shared = Arc::new(DispatcherShared::new(thread::current().id()));
        registry::register(shared.owner, &shared)?;
        Ok(Self {
            shared,
            _not_send: PhantomData,
        })
    }

    /// Cloneable submission handle for use from other threads.
    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            shared: self.shared.clone(),
        }
    }

    /// Wrap `func` in a task and enqueue it. Returns a typed handle.
    pub fn add_task<T, F>(&self, priority: Priority, func: F) -> Task<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.shared.add_task(priority, func)
    }

    /// Drain the pending queue.
    ///
    /// Swaps the whole pending queue out under the lock, then executes
    /// the batch in order with no lock held. Tasks submitted while the
    /// batch runs land in the fresh pending queue and wait for the next
    /// call, so one drain is a point-in-time snapshot even when tasks
    /// keep resubmitting continuations here.
    ///
    /// Returns the number of tasks executed.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the owner. A panic in a
    /// task's callable unwinds out of this call uncaught.
    pub fn dispatch(&self) -> usize {
        assert_eq!(
            thread::current().id(),
            self.shared.owner,
            "dispatch() called from a thread that does not own this dispatcher"
        );

        let mut batch = {
            let mut pending = self.shared.pending.lock();
            mem::take(&mut *pending)
        };

        let executed = batch.len();
        for task in batch.drain(..) {
            task.invoke();
            self.shared.depth.fetch_sub(1, Ordering::Relaxed);
        }
        executed
    }

    /// Approximate queue depth (pending + in-flight).
    pub fn total_queued(&self) -> usize {
        self.shared.total_queued()
    }

    /// Handle for the current thread's dispatcher, if one is registered.
    pub fn current() -> Option<DispatcherHandle> {
        Self::for_thread(thread::current().id())
    }

    /// Handle for `thread`'s dispatcher, if one is registered.
    pub fn for_thread(thread: ThreadId) -> Option<DispatcherHandle> {
        registry::lookup(thread).map(|shared| DispatcherHandle { shared })
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        registry::deregister(self.shared.owner, &self.shared);
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("owner", &self.shared.owner)
            .field("total_queued", &self.total_queued())
            .finish()
    }
}

/// Cloneable, `Send + Sync` submission handle to a dispatcher.
///
/// Holds a strong ref to the dispatcher's shared state, so depth reads
/// and submissions stay memory-safe even after the owning [`Dispatcher`]
/// is dropped. A task submitted after the owner is gone is never drained.
#[derive(Clone)]
pub struct DispatcherHandle {
    shared: Arc<DispatcherShared>,
}

impl DispatcherHandle {
    /// Wrap `func` in a task and enqueue it on the target dispatcher.
    pub fn add_task<T, F>(&self, priority: Priority, func: F) -> Task<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.shared.add_task(priority, func)
    }

    /// Approximate queue depth (pending + in-flight).
    pub fn total_queued(&self) -> usize {
        self.shared.total_queued()
    }

    /// Identity of the owning thread.
    pub fn owner(&self) -> ThreadId {
        self.shared.owner()
    }
}

impl fmt::Debug for DispatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherHandle")
            .field("owner", &self.shared.owner)
            .field("total_queued", &self.total_queued())
            .finish()
    }
}

/// Where a task's continuation goes: a weak handle to the dispatcher of
/// the thread the task was created on.
///
/// Weak on purpose. If that dispatcher is gone by the time the task
/// completes, the continuation fails softly (it is dropped) instead of
/// dereferencing a stale registry entry.
pub(crate) struct ResumeContext {
    target: Weak<DispatcherShared>,
}

impl ResumeContext {
    /// Capture the current thread's dispatcher. Dangling if the thread
    /// has none; any continuation will then be dropped at completion.
    pub(crate) fn current() -> Self {
        Self {
            target: registry::lookup_weak(thread::current().id()),
        }
    }

    /// A context with no target. Continuations submitted through it are
    /// always dropped.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            target: Weak::new(),
        }
    }

    /// Resubmit follow-up work to the captured dispatcher. Returns
    /// `false` if the context no longer exists.
    pub(crate) fn submit<F>(&self, priority: Priority, func: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match self.target.upgrade() {
            Some(shared) => {
                shared.add_task(priority, func);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for ResumeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeContext")
            .field("live", &(self.target.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn registry_round_trip() {
        let handle = thread::spawn(|| {
            assert!(Dispatcher::current().is_none());
            let dispatcher = Dispatcher::new().unwrap();

            let found = Dispatcher::current().expect("registered");
            assert_eq!(found.owner(), thread::current().id());

            drop(dispatcher);
            assert!(Dispatcher::current().is_none());
        });
        handle.join().unwrap();
    }

    #[test]
    fn duplicate_registration_fails() {
        let handle = thread::spawn(|| {
            let _dispatcher = Dispatcher::new().unwrap();
            assert!(matches!(
                Dispatcher::new(),
                Err(crate::Error::DispatcherExists)
            ));
        });
        handle.join().unwrap();
    }

    #[test]
    fn cross_thread_submission() {
        let handle = thread::spawn(|| {
            let dispatcher = Dispatcher::new().unwrap();
            let (tx, rx) = mpsc::channel::<DispatcherHandle>();
            let (done_tx, done_rx) = mpsc::channel::<()>();

            let submitter = thread::spawn(move || {
                let target = rx.recv().unwrap();
                let task = target.add_task(Priority::Low, || 5);
                done_tx.send(()).unwrap();
                task.wait();
                assert_eq!(task.result(), Some(5));
            });

            tx.send(dispatcher.handle()).unwrap();
            done_rx.recv().unwrap();
            assert_eq!(dispatcher.total_queued(), 1);
            assert_eq!(dispatcher.dispatch(), 1);
            assert_eq!(dispatcher.total_queued(), 0);
            submitter.join().unwrap();
        });
        handle.join().unwrap();
    }

    #[test]
    fn depth_readable_after_owner_drop() {
        let handle = thread::spawn(|| {
            let dispatcher = Dispatcher::new().unwrap();
            let submission = dispatcher.handle();
            submission.add_task(Priority::Low, || ());
            drop(dispatcher);
            assert_eq!(submission.total_queued(), 1);
        });
        handle.join().unwrap();
    }
}
