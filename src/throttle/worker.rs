//! The pacing loop run on the throttle's worker thread.

use std::{
    sync::{Arc, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use tracing::{debug, error, trace};

use super::{Queue, Shared};
use crate::{
    connection::{Connection, ConnectionState},
    panic::catch_logged,
};

/// Whether the worker should keep serving.
enum Flow {
    Continue,
    /// The session changed; start over with fresh credit.
    Ended,
    Stop,
}

struct Pacer<'a> {
    shared: &'a Shared,
    inner: &'a Arc<dyn Connection>,
    /// Outstanding releases. Allowed to dip below zero after a pause.
    credit: i64,
    last_pause: Instant,
}

/// Worker entry point. A panic in the loop closes the connection, since no
/// queued send could be delivered afterwards.
pub(super) fn run(shared: &Arc<Shared>, inner: &Arc<dyn Connection>) {
    let finished = catch_logged("throttle worker", || {
        Pacer {
            shared,
            inner,
            credit: 0,
            last_pause: Instant::now(),
        }
        .serve();
    });
    if finished.is_none() {
        error!(connection = %inner.id(), "throttle worker died, closing connection");
        inner.close();
    }
    debug!(connection = %inner.id(), "throttle worker stopped");
}

impl Pacer<'_> {
    fn queue(&self) -> MutexGuard<'_, Queue> { self.shared.queue() }

    fn wait<'g>(&self, queue: MutexGuard<'g, Queue>) -> MutexGuard<'g, Queue> {
        self.shared
            .wake
            .wait(queue)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn serve(&mut self) {
        while let Some(session) = self.await_session() {
            self.credit = 0;
            self.last_pause = Instant::now();
            if let Flow::Stop = self.drain_session(session) {
                break;
            }
        }
    }

    /// Block until the connection is connected and return the session tag.
    fn await_session(&self) -> Option<u64> {
        let mut queue = self.queue();
        loop {
            if queue.shutdown {
                return None;
            }
            match self.inner.state() {
                ConnectionState::Connected => return Some(queue.session),
                ConnectionState::Closed => return None,
                ConnectionState::Disconnected => queue = self.wait(queue),
            }
        }
    }

    /// Release queued lines until `session` ends.
    fn drain_session(&mut self, session: u64) -> Flow {
        loop {
            {
                let mut queue = self.queue();
                loop {
                    if queue.shutdown {
                        return Flow::Stop;
                    }
                    if queue.session != session || self.inner.state() != ConnectionState::Connected {
                        return Flow::Ended;
                    }
                    if !queue.pending.is_empty() && !queue.clustering {
                        break;
                    }
                    queue = self.wait(queue);
                }
            }

            let idle = self.last_pause.elapsed();
            let aged = i64::try_from(idle.as_millis() >> 10).unwrap_or(i64::MAX);
            self.credit = self.credit.saturating_sub(aged).max(0);

            while self.has_pending() {
                let released = self.burst(session);
                self.last_pause = Instant::now();
                trace!(released, credit = self.credit, "burst released");
                match self.pause(session) {
                    Flow::Continue => self.credit -= 1,
                    ended => return ended,
                }
            }
        }
    }

    fn has_pending(&self) -> bool { !self.queue().pending.is_empty() }

    /// Send up to one burst of `session`'s lines, honouring the credit limit.
    fn burst(&mut self, session: u64) -> u32 {
        let burst = self.shared.config.burst;
        let limit = i64::from(self.shared.config.limit);
        let mut released = 0;
        while (burst == 0 || released < burst) && (limit == 0 || self.credit < limit) {
            let line = {
                let mut queue = self.queue();
                if queue.session != session {
                    break;
                }
                queue.pending.pop_front()
            };
            let Some(line) = line else {
                break;
            };
            if !self.inner.send_line(&line) {
                debug!(connection = %self.inner.id(), "throttled line was not delivered");
            }
            released += 1;
            self.credit += 1;
        }
        released
    }

    /// Sleep for the configured delay. Shutdown or a state change cuts it
    /// short.
    fn pause(&self, session: u64) -> Flow {
        let delay = self.shared.config.delay;
        let started = Instant::now();
        let mut queue = self.queue();
        loop {
            if queue.shutdown {
                return Flow::Stop;
            }
            if queue.session != session {
                return Flow::Ended;
            }
            let elapsed = started.elapsed();
            if elapsed >= delay {
                return Flow::Continue;
            }
            queue = self
                .shared
                .wake
                .wait_timeout(queue, delay.saturating_sub(elapsed).max(Duration::from_millis(1)))
                .map_or_else(|poisoned| poisoned.into_inner().0, |(queue, _)| queue);
        }
    }
}
