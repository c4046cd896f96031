//! Idle backoff for the worker loop.

use std::hint::spin_loop;
use std::thread;
use std::time::Duration;

/// Escalating wait used by a worker whose dispatcher came up empty:
/// spin, then yield, then park with a bounded timeout. An unpark (new
/// submission or shutdown) cuts the park short.
#[derive(Debug)]
pub(crate) struct Backoff {
    step: usize,
    park_timeout: Duration,
}

impl Backoff {
    const MAX_SPINS: usize = 6;
    const MAX_YIELDS: usize = 10;

    pub(crate) fn new(park_timeout: Duration) -> Self {
        Self {
            step: 0,
            park_timeout,
        }
    }

    /// Reset after useful work was found.
    pub(crate) fn reset(&mut self) {
        self.step = 0;
    }

    /// Perform one escalation step.
    pub(crate) fn idle(&mut self) {
        if self.step < Self::MAX_SPINS {
            for _ in 0..(1 << self.step) {
                spin_loop();
            }
        } else if self.step < Self::MAX_YIELDS {
            thread::yield_now();
        } else {
            thread::park_timeout(self.park_timeout);
        }

        if self.step <= Self::MAX_YIELDS {
            self.step += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalates_to_park_and_resets() {
        let mut backoff = Backoff::new(Duration::from_micros(10));

        // Walks through spin and yield phases into parking without panic.
        for _ in 0..(Backoff::MAX_YIELDS + 3) {
            backoff.idle();
        }
        assert!(backoff.step > Backoff::MAX_YIELDS);

        backoff.reset();
        assert_eq!(backoff.step, 0);
    }
}
