//! Cooperative per-thread task dispatcher with a load-balanced worker
//! pool.
//!
//! Two layers:
//!
//! - [`Dispatcher`]: a single-thread-owned task queue. Any thread
//!   submits; only the owning thread drains, by calling
//!   [`Dispatcher::dispatch`] at points of its choosing. Two priority
//!   tiers: [`Priority::High`] tasks jump to the head of the queue.
//! - [`TaskPool`]: N worker threads, each running its own private
//!   dispatcher in a drain-and-park loop. Submissions go to the worker
//!   with the shallowest queue. No work-stealing.
//!
//! Tasks are plain `FnOnce() -> T` closures. The returned [`Task`]
//! handle exposes the tri-state lifecycle (waiting, executing, ready),
//! the stored result, and [`Task::then`] for attaching one continuation,
//! which runs on the dispatcher of the thread that *created* the task —
//! follow-up work comes back to where it was submitted from.
//!
//! # Quick start
//!
//! ```
//! use conveyor::{Config, Priority, TaskPool};
//!
//! let pool = TaskPool::new(&Config::default()).unwrap();
//!
//! let task = pool.add_task(Priority::Low, || 6 * 7);
//! task.wait();
//! assert_eq!(task.result(), Some(42));
//! ```
//!
//! Or drive a dispatcher by hand on the current thread:
//!
//! ```
//! use conveyor::{Dispatcher, Priority};
//!
//! let dispatcher = Dispatcher::new().unwrap();
//! let task = dispatcher.add_task(Priority::Low, || "done");
//! assert!(task.waiting());
//!
//! dispatcher.dispatch();
//! assert!(task.ready());
//! ```
//!
//! # Hazards, by design
//!
//! - [`Task::wait`] has no timeout. Waiting on a task whose dispatcher
//!   never drains — including your own dispatcher's task from the owning
//!   thread — blocks forever.
//! - A panicking task unwinds out of the drain uncaught; the task never
//!   reaches ready and any waiter blocks forever. Failures are loud or
//!   hanging, never silently degraded.
//! - A continuation whose originating dispatcher has been dropped is
//!   itself dropped.

#![warn(missing_docs, missing_debug_implementations)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pool;
pub mod prelude;
pub mod runtime;

mod task;
mod util;

pub use config::{Config, ConfigBuilder};
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use error::{Error, Result};
pub use pool::{TaskPool, TaskQueue};
pub use runtime::{init, init_with_config, pool, shutdown};
pub use task::{Priority, Task, TaskHandle, TaskState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_dispatcher_round_trip() {
        std::thread::spawn(|| {
            let dispatcher = Dispatcher::new().unwrap();
            let task = dispatcher.add_task(Priority::Low, || 1 + 1);
            assert!(!task.ready());
            dispatcher.dispatch();
            assert_eq!(task.result(), Some(2));
        })
        .join()
        .unwrap();
    }

    #[test]
    fn pool_round_trip() {
        let config = Config::builder().num_threads(2).build().unwrap();
        let pool = TaskPool::new(&config).unwrap();

        let task = pool.add_task(Priority::Low, || "hello".to_string());
        task.wait();
        assert_eq!(task.result().as_deref(), Some("hello"));
    }
}
