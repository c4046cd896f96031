//! Multi-worker thread pool with depth-balanced submission.
//!
//! Each worker thread owns a private [`Dispatcher`] created inside the
//! thread, so its registry entry belongs to that thread. New tasks go to
//! the worker with the shallowest queue; there is no work-stealing, an
//! idle worker never pulls from a busier one.

mod worker;

use crate::config::Config;
use crate::dispatcher::{Dispatcher, DispatcherHandle};
use crate::error::{Error, Result};
use crate::task::{Priority, Task, TaskHandle};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use worker::{WorkerHandle, WorkerId};

/// Caller-held list of task handles for batch synchronization with
/// [`TaskPool::wait_queue`].
#[derive(Debug, Default)]
pub struct TaskQueue {
    handles: Vec<TaskHandle>,
}

impl TaskQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handle.
    pub fn push(&mut self, handle: TaskHandle) {
        self.handles.push(handle);
    }

    /// Number of handles held.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// `true` when no handles are held.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Fixed pool of worker threads, one private dispatcher per worker.
///
/// Dropping the pool sets the shutdown flag, unparks every worker and
/// joins every worker thread; each join is that worker's acknowledgment
/// that it observed the flag and exited its loop. Tasks still queued at
/// shutdown are dropped undrained.
pub struct TaskPool {
    workers: Vec<WorkerHandle>,
    shutdown: Arc<AtomicBool>,
}

impl TaskPool {
    /// Spawn the worker threads and wait for each to register its
    /// dispatcher.
    ///
    /// The constructor collects every worker's [`DispatcherHandle`] over
    /// a channel before returning, so the balancing scan only ever sees
    /// fully registered workers.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let num_threads = config.worker_threads();
        let shutdown = Arc::new(AtomicBool::new(false));

        let (handle_tx, handle_rx) =
            crossbeam_channel::bounded::<(WorkerId, DispatcherHandle)>(num_threads);

        let mut threads: Vec<(WorkerId, thread::JoinHandle<()>)> =
            Vec::with_capacity(num_threads);

        for id in 0..num_threads {
            let name = format!("{}-{}", config.thread_name_prefix, id);
            let mut builder = thread::Builder::new().name(name);
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let tx = handle_tx.clone();
            let flag = shutdown.clone();
            let idle_park = config.idle_park_timeout;

            let spawned = builder.spawn(move || {
                // A fresh thread cannot already own a dispatcher.
                let dispatcher = match Dispatcher::new() {
                    Ok(dispatcher) => dispatcher,
                    Err(_) => return,
                };
                if tx.send((id, dispatcher.handle())).is_err() {
                    return;
                }
                drop(tx);
                worker::run(dispatcher, flag, idle_park);
            });

            match spawned {
                Ok(thread) => threads.push((id, thread)),
                Err(err) => {
                    Self::stop_threads(&shutdown, threads);
                    return Err(Error::executor(format!("failed to spawn worker: {err}")));
                }
            }
        }
        drop(handle_tx);

        let mut registered: Vec<(WorkerId, DispatcherHandle)> = Vec::with_capacity(num_threads);
        for _ in 0..num_threads {
            match handle_rx.recv() {
                Ok(pair) => registered.push(pair),
                Err(_) => {
                    Self::stop_threads(&shutdown, threads);
                    return Err(Error::executor("worker exited during startup"));
                }
            }
        }
        // Handles arrive in completion order; worker ids are 0..n.
        registered.sort_by_key(|(id, _)| *id);

        let workers = threads
            .into_iter()
            .zip(registered)
            .map(|((id, thread), (_, dispatcher))| {
                let unparker = thread.thread().clone();
                WorkerHandle {
                    id,
                    thread: Some(thread),
                    unparker,
                    dispatcher,
                }
            })
            .collect();

        Ok(Self { workers, shutdown })
    }

    fn stop_threads(
        shutdown: &Arc<AtomicBool>,
        threads: Vec<(WorkerId, thread::JoinHandle<()>)>,
    ) {
        shutdown.store(true, Ordering::Release);
        for (_, thread) in threads {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }

    /// Submit a task to the least-loaded worker and unpark it.
    pub fn add_task<T, F>(&self, priority: Priority, func: F) -> Task<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let target = &self.workers[self.select_worker()];
        let task = target.dispatcher.add_task(priority, func);
        target.unparker.unpark();
        task
    }

    /// Submit a task and also record its erased handle in `queue` for a
    /// later [`TaskPool::wait_queue`].
    pub fn add_task_to_queue<T, F>(
        &self,
        queue: &mut TaskQueue,
        priority: Priority,
        func: F,
    ) -> Task<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let task = self.add_task(priority, func);
        queue.push(task.handle());
        task
    }

    /// Block until every task in `queue` is ready, then clear it.
    ///
    /// The waits are sequential, so the total time is bounded by the
    /// last task to finish, not the sum, once tasks run concurrently.
    pub fn wait_queue(&self, queue: &mut TaskQueue) {
        for handle in &queue.handles {
            handle.wait();
        }
        queue.handles.clear();
    }

    /// Number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Sum of the workers' queue depths, a best-effort snapshot.
    pub fn total_queued(&self) -> usize {
        self.workers
            .iter()
            .map(|worker| worker.dispatcher.total_queued())
            .sum()
    }

    fn select_worker(&self) -> usize {
        pick_least_loaded(
            self.workers
                .iter()
                .map(|worker| worker.dispatcher.total_queued()),
        )
        .unwrap_or(0)
    }

    /// Signal shutdown and join every worker. Called by `Drop`; safe to
    /// call early, after which submitted tasks are never executed.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Release);

        for worker in &self.workers {
            worker.unparker.unpark();
        }

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                let _ = thread.join();
            }
        }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depths: Vec<(WorkerId, usize)> = self
            .workers
            .iter()
            .map(|w| (w.id, w.dispatcher.total_queued()))
            .collect();
        f.debug_struct("TaskPool")
            .field("num_workers", &self.workers.len())
            .field("total_queued", &self.total_queued())
            .field("worker_depths", &depths)
            .finish()
    }
}

/// Index of the worker a new task should go to, given instantaneous
/// queue depths. The first worker wins outright when already idle
/// (skipping the scan); otherwise the smallest depth wins, first seen on
/// ties.
fn pick_least_loaded(depths: impl IntoIterator<Item = usize>) -> Option<usize> {
    let mut depths = depths.into_iter();
    let first = depths.next()?;
    if first == 0 {
        return Some(0);
    }

    let mut best = 0;
    let mut best_depth = first;
    for (offset, depth) in depths.enumerate() {
        if depth < best_depth {
            best = offset + 1;
            best_depth = depth;
        }
    }
    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_first_worker_skips_scan() {
        assert_eq!(pick_least_loaded([0, 3, 5]), Some(0));
    }

    #[test]
    fn shallowest_queue_wins() {
        assert_eq!(pick_least_loaded([3, 0, 5]), Some(1));
        assert_eq!(pick_least_loaded([4, 2, 1]), Some(2));
    }

    #[test]
    fn ties_break_to_first_seen() {
        assert_eq!(pick_least_loaded([3, 2, 2]), Some(1));
        assert_eq!(pick_least_loaded([2, 2, 2]), Some(0));
    }

    #[test]
    fn no_workers() {
        assert_eq!(pick_least_loaded(Vec::new()), None);
    }
}
