use conveyor::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn many_small_tasks() {
    let config = Config::builder().num_threads(4).build().unwrap();
    let pool = TaskPool::new(&config).unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    let mut queue = TaskQueue::new();

    for i in 0..10_000usize {
        let counter = counter.clone();
        let priority = if i % 7 == 0 {
            Priority::High
        } else {
            Priority::Low
        };
        pool.add_task_to_queue(&mut queue, priority, move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }

    pool.wait_queue(&mut queue);
    assert_eq!(counter.load(Ordering::Relaxed), 10_000);
}

#[test]
fn repeated_pool_lifecycles() {
    for _ in 0..10 {
        let config = Config::builder().num_threads(2).build().unwrap();
        let pool = TaskPool::new(&config).unwrap();

        let mut queue = TaskQueue::new();
        for _ in 0..50 {
            pool.add_task_to_queue(&mut queue, Priority::Low, || {});
        }
        pool.wait_queue(&mut queue);
    }
}

#[test]
fn chained_continuations_across_the_pool() {
    let config = Config::builder().num_threads(2).build().unwrap();
    let pool = TaskPool::new(&config).unwrap();

    // Worker threads own dispatchers, so a continuation attached from a
    // task body hops back onto that worker's own queue and still runs.
    let done = Arc::new(AtomicUsize::new(0));
    let mut queue = TaskQueue::new();

    for _ in 0..100 {
        let done = done.clone();
        pool.add_task_to_queue(&mut queue, Priority::Low, move || {
            let inner = conveyor::Dispatcher::current()
                .expect("worker threads always have a dispatcher");
            let done = done.clone();
            let follow_up = inner.add_task(Priority::Low, move || {
                done.fetch_add(1, Ordering::Relaxed);
            });
            drop(follow_up);
        });
    }

    pool.wait_queue(&mut queue);

    // The follow-ups were queued on worker dispatchers; their loops keep
    // draining until shutdown, so spin until they all land.
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    while done.load(Ordering::Relaxed) != 100 {
        assert!(std::time::Instant::now() < deadline, "follow-ups never ran");
        std::thread::yield_now();
    }
}
