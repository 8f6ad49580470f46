//! One-shot delayed callbacks.
//!
//! Bots use these for greetings, timed announcements and similar chores that
//! must not block the receive loop.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use log::debug;
use tokio::{
    runtime::{Builder, Handle, Runtime},
    task::{self, JoinHandle},
    time::sleep,
};

use crate::{
    error::{ChatNetError, Result},
    panic::catch_logged,
};

/// Runs callbacks after a delay on a private single-worker runtime.
///
/// Callbacks run on blocking threads, so they may freely call blocking
/// connection operations. Dropping the scheduler abandons pending callbacks.
///
/// ```
/// use std::{sync::mpsc, time::Duration};
///
/// use chatnet::Scheduler;
///
/// let scheduler = Scheduler::new()?;
/// let (tx, rx) = mpsc::channel();
/// scheduler.schedule(Duration::from_millis(10), move || tx.send(42).unwrap_or(()));
/// assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(42));
/// # Ok::<(), chatnet::ChatNetError>(())
/// ```
pub struct Scheduler {
    handle: Handle,
    runtime: Option<Runtime>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.debug_struct("Scheduler").finish_non_exhaustive() }
}

impl Scheduler {
    /// Start the scheduler's runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ChatNetError::Io`] if the runtime cannot be built.
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("chatnet-timer")
            .enable_time()
            .build()
            .map_err(ChatNetError::Io)?;
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    /// Run `callback` once `delay` has elapsed.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> ScheduledTask
    where
        F: FnOnce() + Send + 'static,
    {
        let started = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&started);
        let handle = self.handle.spawn(async move {
            sleep(delay).await;
            flag.store(true, Ordering::Release);
            if task::spawn_blocking(move || catch_logged("scheduled callback", callback))
                .await
                .is_err()
            {
                debug!("scheduled callback was abandoned");
            }
        });
        ScheduledTask { handle, started }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Handle to a pending callback.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
    started: Arc<AtomicBool>,
}

impl ScheduledTask {
    /// Prevent the callback from running. Returns `false` if it has already
    /// started or finished.
    pub fn cancel(&self) -> bool {
        if self.started.load(Ordering::Acquire) || self.handle.is_finished() {
            return false;
        }
        self.handle.abort();
        true
    }

    /// Whether the callback has run or been cancelled.
    #[must_use]
    pub fn is_finished(&self) -> bool { self.handle.is_finished() }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn callbacks_run_after_their_delay() {
        let scheduler = Scheduler::new().expect("runtime builds");
        let (tx, rx) = mpsc::channel();
        let started = std::time::Instant::now();
        let _task = scheduler.schedule(Duration::from_millis(50), move || {
            tx.send(started.elapsed()).expect("receiver alive");
        });
        let elapsed = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("callback should run");
        assert!(elapsed >= Duration::from_millis(50));
    }

    #[test]
    fn cancelled_callbacks_never_run() {
        let scheduler = Scheduler::new().expect("runtime builds");
        let (tx, rx) = mpsc::channel::<()>();
        let task = scheduler.schedule(Duration::from_millis(200), move || {
            tx.send(()).expect("receiver alive");
        });
        assert!(task.cancel());
        assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());
        assert!(task.is_finished());
        assert!(!task.cancel());
    }

    #[test]
    fn a_panicking_callback_does_not_stop_the_scheduler() {
        let scheduler = Scheduler::new().expect("runtime builds");
        let _boom = scheduler.schedule(Duration::ZERO, || panic!("boom"));
        let (tx, rx) = mpsc::channel();
        let _next = scheduler.schedule(Duration::from_millis(20), move || tx.send(()).expect("receiver alive"));
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
