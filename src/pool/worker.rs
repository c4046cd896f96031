//! Worker thread loop.

use crate::dispatcher::Dispatcher;
use crate::util::Backoff;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub(crate) type WorkerId = usize;

/// Pool-side record of one worker thread.
pub(crate) struct WorkerHandle {
    pub(crate) id: WorkerId,
    pub(crate) thread: Option<JoinHandle<()>>,
    pub(crate) unparker: std::thread::Thread,
    pub(crate) dispatcher: crate::dispatcher::DispatcherHandle,
}

/// Worker loop body, entered after the worker registered its dispatcher.
///
/// Drains the dispatcher; when it stays empty, backs off (spin, yield,
/// bounded park) until unparked by a submission or by shutdown. Exits
/// once the shutdown flag is observed. A panicking task unwinds out of
/// `dispatch()` and kills this worker; that is deliberate (task failures
/// are not modeled).
pub(crate) fn run(dispatcher: Dispatcher, shutdown: Arc<AtomicBool>, idle_park: Duration) {
    let mut backoff = Backoff::new(idle_park);

    loop {
        if shutdown.load(Ordering::Acquire) {
            break;
        }

        let executed = dispatcher.dispatch();

        if executed == 0 && dispatcher.total_queued() == 0 {
            backoff.idle();
        } else {
            backoff.reset();
        }
    }
}
