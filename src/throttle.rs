//! Decorator that paces outbound chat sends.
//!
//! Lines beginning with `SEND:` are queued and released by a dedicated
//! worker thread in bursts, with a pause between bursts and a credit counter
//! that ages by roughly one unit per second of idle time. Every other line,
//! such as logins or arena changes, bypasses the queue. The queue belongs to
//! a single session: it is discarded on the thread that ends the session,
//! before the state change returns.

use std::{
    collections::VecDeque,
    fmt,
    net::SocketAddr,
    sync::{
        Arc,
        Condvar,
        Mutex,
        MutexGuard,
        PoisonError,
        Weak,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, trace, warn};

use crate::{
    config::ThrottleConfig,
    connection::{Connection, ConnectionId, ConnectionState, StateListener, StateRelay},
    error::{ChatNetError, Result},
    metrics,
};

mod worker;

const SEND_PREFIX: &str = "SEND:";

/// Whether `line` is a chat send subject to pacing.
fn is_throttled_line(line: &str) -> bool {
    line.len() > SEND_PREFIX.len()
        && line
            .get(..SEND_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SEND_PREFIX))
}

#[derive(Default)]
struct Queue {
    pending: VecDeque<String>,
    clustering: bool,
    shutdown: bool,
    /// Bumped on every state change. Lines are only released while it
    /// matches the value the worker saw when the session started.
    session: u64,
}

/// State shared between the decorator and its worker.
struct Shared {
    queue: Mutex<Queue>,
    wake: Condvar,
    config: ThrottleConfig,
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, Queue> { self.queue.lock().unwrap_or_else(PoisonError::into_inner) }

    /// Record a state change and wake the worker. The queue lock is held
    /// while notifying so a worker between its checks and its wait cannot
    /// miss it. Leaving `Connected` drops the backlog.
    fn session_changed(&self, throttle: ConnectionId, state: ConnectionState) {
        let dropped = {
            let mut queue = self.queue();
            queue.session = queue.session.wrapping_add(1);
            let dropped = if state == ConnectionState::Connected {
                0
            } else {
                let dropped = queue.pending.len();
                queue.pending.clear();
                dropped
            };
            self.wake.notify_all();
            dropped
        };
        if dropped > 0 {
            warn!(%throttle, dropped, "session ended, discarding throttled lines");
            metrics::add_throttle_dropped(dropped);
        }
    }
}

/// Wakes the worker on every state change of the throttle.
struct Waker {
    throttle: ConnectionId,
    shared: Weak<Shared>,
}

impl StateListener for Waker {
    fn on_state_change(&self, source: &dyn Connection, state: ConnectionState) {
        if source.id() != self.throttle {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            trace!(throttle = %self.throttle, %state, "waking throttle worker");
            shared.session_changed(self.throttle, state);
        }
    }
}

/// Connection decorator that rate-limits chat sends.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use chatnet::{Connection, ConnectionExt, MessageThrottle, TcpConnection};
///
/// let root: Arc<dyn Connection> = Arc::new(TcpConnection::default());
/// let throttle = MessageThrottle::new(root)?;
/// {
///     let _cluster = throttle.cluster();
///     throttle.send_public_message("one")?;
///     throttle.send_public_message("two")?;
/// }
/// # Ok::<(), chatnet::ChatNetError>(())
/// ```
pub struct MessageThrottle {
    id: ConnectionId,
    inner: Arc<dyn Connection>,
    relay: Arc<StateRelay>,
    shared: Arc<Shared>,
    throttling: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for MessageThrottle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageThrottle")
            .field("id", &self.id)
            .field("config", &self.shared.config)
            .field("throttling", &self.is_throttling())
            .field("pending", &self.pending_len())
            .finish_non_exhaustive()
    }
}

impl MessageThrottle {
    /// Wrap `inner` with the default pacing.
    ///
    /// # Errors
    ///
    /// Returns [`ChatNetError::Io`] if the worker thread cannot be spawned.
    pub fn new(inner: Arc<dyn Connection>) -> Result<Arc<Self>> { Self::with_config(inner, ThrottleConfig::default()) }

    /// Wrap `inner` with explicit pacing.
    ///
    /// # Errors
    ///
    /// Returns [`ChatNetError::Io`] if the worker thread cannot be spawned.
    pub fn with_config(inner: Arc<dyn Connection>, config: ThrottleConfig) -> Result<Arc<Self>> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            wake: Condvar::new(),
            config,
        });
        let throttle = Arc::new_cyclic(|this: &Weak<Self>| {
            let outer: Weak<dyn Connection> = this.clone();
            Self {
                id: ConnectionId::next(),
                relay: StateRelay::attach(&inner, outer),
                inner: Arc::clone(&inner),
                shared: Arc::clone(&shared),
                throttling: AtomicBool::new(true),
                worker: Mutex::new(None),
            }
        });
        throttle.relay.register(Arc::new(Waker {
            throttle: throttle.id,
            shared: Arc::downgrade(&shared),
        }));

        let handle = thread::Builder::new()
            .name("chatnet-throttle".into())
            .spawn(move || worker::run(&shared, &inner))
            .map_err(ChatNetError::Io)?;
        *throttle
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        debug!(throttle = %throttle.id, ?config, "throttle started");
        Ok(throttle)
    }

    #[must_use]
    pub fn inner(&self) -> &Arc<dyn Connection> { &self.inner }

    #[must_use]
    pub fn config(&self) -> ThrottleConfig { self.shared.config }

    /// Hold the worker back until [`send_cluster`](Self::send_cluster).
    pub fn begin_cluster(&self) { self.shared.queue().clustering = true; }

    /// Release everything queued since [`begin_cluster`](Self::begin_cluster).
    pub fn send_cluster(&self) {
        let mut queue = self.shared.queue();
        queue.clustering = false;
        if !queue.pending.is_empty() {
            self.shared.wake.notify_all();
        }
    }

    /// Begin a cluster that is sent when the guard drops.
    #[must_use = "the cluster is sent as soon as the guard is dropped"]
    pub fn cluster(&self) -> ClusterGuard<'_> {
        self.begin_cluster();
        ClusterGuard { throttle: self }
    }

    pub fn enable_throttle(&self) { self.set_throttle(true); }

    /// Stop queueing new sends. Lines already queued are still paced out,
    /// and sends keep queueing behind them until the backlog drains.
    pub fn disable_throttle(&self) { self.set_throttle(false); }

    pub fn set_throttle(&self, enabled: bool) { self.throttling.store(enabled, Ordering::Release); }

    #[must_use]
    pub fn is_throttling(&self) -> bool { self.throttling.load(Ordering::Acquire) }

    /// Number of lines waiting for release.
    #[must_use]
    pub fn pending_len(&self) -> usize { self.shared.queue().pending.len() }
}

impl Drop for MessageThrottle {
    fn drop(&mut self) {
        {
            let mut queue = self.shared.queue();
            queue.shutdown = true;
            self.shared.wake.notify_all();
        }
        let handle = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // The last handle may be released on the worker thread itself.
        if let Some(handle) = handle.filter(|handle| handle.thread().id() != thread::current().id()) {
            if handle.join().is_err() {
                debug!(throttle = %self.id, "throttle worker ended by panic");
            }
        }
        self.relay.detach(&self.inner);
    }
}

impl Connection for MessageThrottle {
    fn id(&self) -> ConnectionId { self.id }

    fn connect(&self, address: SocketAddr) -> Result<bool> { self.inner.connect(address) }

    fn disconnect(&self) -> bool { self.inner.disconnect() }

    fn close(&self) -> bool { self.inner.close() }

    fn join(&self, timeout: Option<Duration>) -> Result<bool> { self.inner.join(timeout) }

    fn state(&self) -> ConnectionState { self.inner.state() }

    fn exec_while_state(&self, expected: ConnectionState, action: &mut dyn FnMut()) -> bool {
        self.inner.exec_while_state(expected, action)
    }

    fn register_state_listener(&self, listener: Arc<dyn StateListener>) -> bool { self.relay.register(listener) }

    fn remove_state_listener(&self, listener: &Arc<dyn StateListener>) -> bool { self.relay.remove(listener) }

    fn send_line(&self, line: &str) -> bool {
        if line.is_empty() {
            return false;
        }
        if is_throttled_line(line) {
            let mut queue = self.shared.queue();
            if self.is_throttling() || !queue.pending.is_empty() {
                if self.inner.state() != ConnectionState::Connected {
                    return false;
                }
                queue.pending.push_back(line.to_owned());
                trace!(throttle = %self.id, pending = queue.pending.len(), "queued line");
                if !queue.clustering {
                    self.shared.wake.notify_all();
                }
                return true;
            }
        }
        self.inner.send_line(line)
    }

    fn receive_line(&self) -> Option<String> { self.inner.receive_line() }
}

/// Ends a cluster on drop. See [`MessageThrottle::cluster`].
pub struct ClusterGuard<'a> {
    throttle: &'a MessageThrottle,
}

impl Drop for ClusterGuard<'_> {
    fn drop(&mut self) { self.throttle.send_cluster(); }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("SEND:PUB:hi", true)]
    #[case("send:pub:hi", true)]
    #[case("SEND:", false)]
    #[case("SENDPUB:hi", false)]
    #[case("GO:pub", false)]
    #[case("LOGIN:1;x:a:b", false)]
    fn only_chat_sends_are_paced(#[case] line: &str, #[case] throttled: bool) {
        assert_eq!(is_throttled_line(line), throttled);
    }
}
