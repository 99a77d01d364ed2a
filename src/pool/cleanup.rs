//! Background cleanup worker for the blocking pool

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Periodic worker that runs a sweep callback every `interval`.
///
/// The worker sleeps on a condvar so a stop request wakes it immediately;
/// dropping the driver signals stop and joins the thread, so it never
/// outlives the pool or holds up process exit.
pub(crate) struct CleanupDriver {
    signal: Arc<StopSignal>,
    worker: Option<JoinHandle<()>>,
}

impl CleanupDriver {
    pub(crate) fn spawn<F>(interval: Duration, mut sweep: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let signal = Arc::new(StopSignal {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        });

        let thread_signal = Arc::clone(&signal);
        let worker = std::thread::spawn(move || {
            tracing::debug!(?interval, "cleanup worker started");
            loop {
                let mut stopped = thread_signal.stopped.lock();
                if !*stopped {
                    thread_signal.wake.wait_for(&mut stopped, interval);
                }
                if *stopped {
                    break;
                }
                drop(stopped);
                sweep();
            }
            tracing::debug!("cleanup worker stopped");
        });

        Self {
            signal,
            worker: Some(worker),
        }
    }

    /// Signal the worker to stop and wait for it to finish
    pub(crate) fn stop(self) {
        // Drop does the work.
    }
}

impl Drop for CleanupDriver {
    fn drop(&mut self) {
        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
