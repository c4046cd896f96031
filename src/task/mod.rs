//! Task representation: priority tag, lifecycle state, stored result and
//! the single optional continuation.

mod state;

pub use state::TaskState;
pub(crate) use state::StateCell;

use crate::dispatcher::ResumeContext;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Submission priority. Two tiers only: `Low` appends to the tail of a
/// dispatcher's pending queue, `High` pushes to the head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Priority {
    /// Default tier; FIFO among `Low` tasks.
    Low = 0,
    /// Jumps the queue; the newest `High` task runs first.
    High = 1,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Low
    }
}

impl Priority {
    fn from_u8(raw: u8) -> Self {
        if raw == 0 {
            Priority::Low
        } else {
            Priority::High
        }
    }
}

/// Type-erased task surface used by queues and batch synchronization.
pub(crate) trait RawTask: Send + Sync {
    fn invoke(&self);
    fn state(&self) -> TaskState;
    fn wait(&self);
    fn priority(&self) -> Priority;
    fn set_priority(&self, priority: Priority);
}

/// Everything guarded by the per-task attach lock: the deferred callable,
/// its stored result and the single continuation slot.
struct FnTaskInner<T> {
    func: Option<Box<dyn FnOnce() -> T + Send>>,
    result: Option<T>,
    continuation: Option<Box<dyn FnOnce(T) + Send>>,
    continuation_attached: bool,
}

/// A deferred callable with a stored result and an optional continuation.
///
/// Captures, at construction, a resume context for the creating thread.
/// The continuation is resubmitted there, so follow-up work runs back
/// where the task came from, not on whichever worker executed it.
pub(crate) struct FnTask<T> {
    state: StateCell,
    priority: AtomicU8,
    origin: ResumeContext,
    inner: Mutex<FnTaskInner<T>>,
}

impl<T> FnTask<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn new<F>(func: F, priority: Priority, origin: ResumeContext) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self {
            state: StateCell::new(),
            priority: AtomicU8::new(priority as u8),
            origin,
            inner: Mutex::new(FnTaskInner {
                func: Some(Box::new(func)),
                result: None,
                continuation: None,
                continuation_attached: false,
            }),
        }
    }

    /// Attach the single allowed continuation.
    ///
    /// If the task already completed, `f` runs immediately on the calling
    /// thread with a clone of the stored result. Otherwise it is stashed
    /// and resubmitted by whichever thread finishes the task.
    ///
    /// # Panics
    ///
    /// Panics if a continuation is already attached.
    fn then<F>(&self, f: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        // The flag outlives the slot: `invoke` consumes the boxed
        // continuation, and the post-ready branch never fills it, so the
        // slot alone cannot reject a second attach after completion.
        assert!(
            !inner.continuation_attached,
            "task already has a continuation attached"
        );
        inner.continuation_attached = true;

        // The result is stored under this lock before the state flips to
        // Ready, so its presence is the completion test.
        match inner.result.clone() {
            Some(value) => {
                drop(inner);
                f(value);
            }
            None => inner.continuation = Some(Box::new(f)),
        }
    }

    fn result(&self) -> Option<T> {
        self.inner.lock().result.clone()
    }
}

impl<T> RawTask for FnTask<T>
where
    T: Clone + Send + 'static,
{
    /// Run the callable. Called exactly once, by a dispatcher drain, after
    /// the task has been pulled off the pending queue.
    ///
    /// Errors are not caught: a panicking callable unwinds out of the
    /// drain and the task never reaches `Ready`.
    fn invoke(&self) {
        self.state.set_executing();

        let func = match self.inner.lock().func.take() {
            Some(func) => func,
            None => return,
        };

        // The callable runs without any task lock held.
        let value = func();

        let mut inner = self.inner.lock();
        inner.result = Some(value.clone());

        if let Some(continuation) = inner.continuation.take() {
            // Hop back to the dispatcher of the thread that created this
            // task. If that context is gone, the continuation is dropped.
            self.origin
                .submit(Priority::Low, move || continuation(value));
        }

        // Still under the attach lock, so a concurrent `then` either saw
        // no result and got queued above, or sees the result and runs
        // synchronously. No window for a missed continuation.
        self.state.set_ready();
    }

    fn state(&self) -> TaskState {
        self.state.get()
    }

    fn wait(&self) {
        self.state.wait();
    }

    fn priority(&self) -> Priority {
        Priority::from_u8(self.priority.load(Ordering::Relaxed))
    }

    fn set_priority(&self, priority: Priority) {
        self.priority.store(priority as u8, Ordering::Relaxed);
    }
}

/// Typed handle to a submitted task.
///
/// Cloneable; the allocation is shared with the dispatcher's queue and
/// freed when the last holder drops it.
pub struct Task<T> {
    raw: Arc<FnTask<T>>,
}

impl<T> Task<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn from_raw(raw: Arc<FnTask<T>>) -> Self {
        Self { raw }
    }

    /// Block until the task completes. See the crate docs for the
    /// deadlock hazard when waiting on your own dispatcher's task.
    pub fn wait(&self) {
        self.raw.state.wait();
    }

    /// `true` once the task has finished.
    pub fn ready(&self) -> bool {
        self.raw.state.get() == TaskState::Ready
    }

    /// `true` while the task sits in a queue.
    pub fn waiting(&self) -> bool {
        self.raw.state.get() == TaskState::Waiting
    }

    /// `true` while the task is running.
    pub fn executing(&self) -> bool {
        self.raw.state.get() == TaskState::Executing
    }

    /// Current priority tag.
    pub fn priority(&self) -> Priority {
        RawTask::priority(&*self.raw)
    }

    /// Change the priority tag. An already-queued task keeps its queue
    /// position; only a later submission consults the new value.
    pub fn set_priority(&self, priority: Priority) {
        RawTask::set_priority(&*self.raw, priority);
    }

    /// Clone of the stored result, or `None` until the task completes.
    pub fn result(&self) -> Option<T> {
        self.raw.result()
    }

    /// Attach the single allowed continuation, run with the task's result
    /// on the dispatcher of the thread that created the task.
    ///
    /// Attached after completion, `f` runs immediately and synchronously
    /// on the calling thread instead.
    ///
    /// # Panics
    ///
    /// Panics if a continuation is already attached.
    pub fn then<F>(&self, f: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.raw.then(f);
    }

    /// Type-erased handle to the same task, for [`TaskQueue`] batching.
    ///
    /// [`TaskQueue`]: crate::pool::TaskQueue
    pub fn handle(&self) -> TaskHandle {
        TaskHandle {
            raw: self.raw.clone(),
        }
    }
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("state", &self.raw.state.get())
            .field(
                "priority",
                &Priority::from_u8(self.raw.priority.load(Ordering::Relaxed)),
            )
            .finish()
    }
}

/// Type-erased shared handle to a submitted task.
#[derive(Clone)]
pub struct TaskHandle {
    raw: Arc<dyn RawTask>,
}

impl TaskHandle {
    pub(crate) fn new(raw: Arc<dyn RawTask>) -> Self {
        Self { raw }
    }

    pub(crate) fn invoke(&self) {
        self.raw.invoke();
    }

    /// Block until the task completes.
    pub fn wait(&self) {
        self.raw.wait();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.raw.state()
    }

    /// `true` once the task has finished.
    pub fn ready(&self) -> bool {
        self.raw.state() == TaskState::Ready
    }

    /// `true` while the task sits in a queue.
    pub fn waiting(&self) -> bool {
        self.raw.state() == TaskState::Waiting
    }

    /// `true` while the task is running.
    pub fn executing(&self) -> bool {
        self.raw.state() == TaskState::Executing
    }

    /// Current priority tag.
    pub fn priority(&self) -> Priority {
        self.raw.priority()
    }

    /// Change the priority tag; does not reposition a queued task.
    pub fn set_priority(&self, priority: Priority) {
        self.raw.set_priority(priority);
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("state", &self.state())
            .field("priority", &self.priority())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached<T, F>(f: F, priority: Priority) -> Arc<FnTask<T>>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        Arc::new(FnTask::new(f, priority, ResumeContext::detached()))
    }

    #[test]
    fn invoke_stores_result() {
        let task = detached(|| 42, Priority::Low);
        assert_eq!(task.state(), TaskState::Waiting);
        assert_eq!(task.result(), None);

        task.invoke();

        assert_eq!(task.state(), TaskState::Ready);
        assert_eq!(task.result(), Some(42));
    }

    #[test]
    fn then_after_completion_runs_synchronously() {
        let task = detached(|| 21, Priority::Low);
        task.invoke();

        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        task.then(move |value| *sink.lock() = Some(value * 2));

        assert_eq!(*seen.lock(), Some(42));
    }

    #[test]
    #[should_panic(expected = "already has a continuation")]
    fn second_then_panics() {
        let task = detached(|| (), Priority::Low);
        task.then(|_| {});
        task.then(|_| {});
    }

    #[test]
    fn continuation_dropped_without_resume_context() {
        // Created with no dispatcher on the thread: the continuation has
        // nowhere to go, but the task itself still completes.
        let task = detached(|| 7, Priority::Low);
        task.then(|_| panic!("must not run"));
        task.invoke();
        assert_eq!(task.state(), TaskState::Ready);
        assert_eq!(task.result(), Some(7));
    }

    #[test]
    fn priority_is_mutable() {
        let task = detached(|| (), Priority::Low);
        assert_eq!(RawTask::priority(&*task), Priority::Low);
        RawTask::set_priority(&*task, Priority::High);
        assert_eq!(RawTask::priority(&*task), Priority::High);
    }
}
