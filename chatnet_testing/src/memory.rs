//! In-memory root connection with scripted input.

use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{
        Arc,
        Condvar,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use chatnet::{
    ChatNetError,
    Connection,
    ConnectionId,
    ConnectionState,
    Result,
    StateListener,
    connection::ListenerList,
};

enum Scripted {
    Line(String),
    Hangup,
}

#[derive(Default)]
struct Wire {
    inbound: VecDeque<Scripted>,
    sent: Vec<String>,
    sent_at: Vec<Instant>,
    peer: Option<SocketAddr>,
}

/// Root connection backed by queues instead of a socket.
///
/// Lines pushed with [`push_inbound`](Self::push_inbound) are returned by
/// `receive_line`; lines passed to `send_line` are recorded. State
/// transitions notify listeners exactly as a real transport would.
pub struct MemoryConnection {
    id: ConnectionId,
    state: Mutex<ConnectionState>,
    state_changed: Condvar,
    wire: Mutex<Wire>,
    wire_changed: Condvar,
    listeners: ListenerList<dyn StateListener>,
    refuse_next: AtomicBool,
    read_timeout: Duration,
}

impl Default for MemoryConnection {
    fn default() -> Self { Self::new() }
}

impl MemoryConnection {
    /// Connection whose reads give up after 50 ms without input.
    pub fn new() -> Self { Self::with_read_timeout(Duration::from_millis(50)) }

    pub fn with_read_timeout(read_timeout: Duration) -> Self {
        Self {
            id: ConnectionId::next(),
            state: Mutex::new(ConnectionState::Disconnected),
            state_changed: Condvar::new(),
            wire: Mutex::new(Wire::default()),
            wire_changed: Condvar::new(),
            listeners: ListenerList::new(),
            refuse_next: AtomicBool::new(false),
            read_timeout,
        }
    }

    fn wire(&self) -> MutexGuard<'_, Wire> { self.wire.lock().unwrap_or_else(PoisonError::into_inner) }

    fn current(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move from `from` to `to` and notify. Returns `false` if the state was
    /// not `from`.
    fn transition(&self, from: &[ConnectionState], to: ConnectionState) -> bool {
        {
            let mut state = self.current();
            if !from.contains(&state) {
                return false;
            }
            *state = to;
            self.state_changed.notify_all();
        }
        if to != ConnectionState::Connected {
            let mut wire = self.wire();
            wire.inbound.clear();
            wire.peer = None;
            self.wire_changed.notify_all();
        }
        for listener in self.listeners.snapshot().iter() {
            listener.on_state_change(self, to);
        }
        true
    }

    /// Queue a line for `receive_line`.
    pub fn push_inbound(&self, line: impl Into<String>) {
        self.wire().inbound.push_back(Scripted::Line(line.into()));
        self.wire_changed.notify_all();
    }

    /// Make the peer hang up once the queued lines have been read.
    pub fn push_hangup(&self) {
        self.wire().inbound.push_back(Scripted::Hangup);
        self.wire_changed.notify_all();
    }

    /// Make the next `connect` fail as if the peer refused it.
    pub fn refuse_next_connect(&self) { self.refuse_next.store(true, Ordering::SeqCst); }

    /// Address passed to the last successful `connect`.
    pub fn peer(&self) -> Option<SocketAddr> { self.wire().peer }

    /// Everything sent so far.
    pub fn sent(&self) -> Vec<String> { self.wire().sent.clone() }

    /// When each line in [`sent`](Self::sent) went out.
    pub fn send_times(&self) -> Vec<Instant> { self.wire().sent_at.clone() }

    pub fn clear_sent(&self) {
        let mut wire = self.wire();
        wire.sent.clear();
        wire.sent_at.clear();
    }

    /// Wait until at least `count` lines were sent or `timeout` elapses, then
    /// return what was sent.
    pub fn wait_for_sent(&self, count: usize, timeout: Duration) -> Vec<String> {
        let deadline = Instant::now() + timeout;
        let mut wire = self.wire();
        while wire.sent.len() < count {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            wire = self
                .wire_changed
                .wait_timeout(wire, deadline - now)
                .map_or_else(|poisoned| poisoned.into_inner().0, |(wire, _)| wire);
        }
        wire.sent.clone()
    }
}

impl Connection for MemoryConnection {
    fn id(&self) -> ConnectionId { self.id }

    fn connect(&self, address: SocketAddr) -> Result<bool> {
        let state = self.state();
        if state != ConnectionState::Disconnected {
            return Err(ChatNetError::IllegalState(state));
        }
        if self.refuse_next.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        self.wire().peer = Some(address);
        Ok(self.transition(&[ConnectionState::Disconnected], ConnectionState::Connected))
    }

    fn disconnect(&self) -> bool { self.transition(&[ConnectionState::Connected], ConnectionState::Disconnected) }

    fn close(&self) -> bool {
        self.disconnect();
        self.transition(&[ConnectionState::Disconnected], ConnectionState::Closed)
    }

    fn join(&self, timeout: Option<Duration>) -> Result<bool> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut state = self.current();
        let initial = *state;
        if initial == ConnectionState::Closed {
            return Err(ChatNetError::IllegalState(initial));
        }
        while *state == initial {
            state = match deadline {
                None => self.state_changed.wait(state).unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(false);
                    }
                    self.state_changed
                        .wait_timeout(state, deadline - now)
                        .map_or_else(|poisoned| poisoned.into_inner().0, |(state, _)| state)
                }
            };
        }
        Ok(true)
    }

    fn state(&self) -> ConnectionState { *self.current() }

    fn exec_while_state(&self, expected: ConnectionState, action: &mut dyn FnMut()) -> bool {
        if self.state() != expected {
            return false;
        }
        action();
        true
    }

    fn register_state_listener(&self, listener: Arc<dyn StateListener>) -> bool { self.listeners.add(listener) }

    fn remove_state_listener(&self, listener: &Arc<dyn StateListener>) -> bool { self.listeners.remove(listener) }

    fn send_line(&self, line: &str) -> bool {
        if line.is_empty() || self.state() != ConnectionState::Connected {
            return false;
        }
        let mut wire = self.wire();
        wire.sent.push(line.to_owned());
        wire.sent_at.push(Instant::now());
        drop(wire);
        self.wire_changed.notify_all();
        true
    }

    fn receive_line(&self) -> Option<String> {
        if self.state() != ConnectionState::Connected {
            return None;
        }
        let deadline = Instant::now() + self.read_timeout;
        let mut wire = self.wire();
        loop {
            match wire.inbound.pop_front() {
                Some(Scripted::Line(line)) => return Some(line),
                Some(Scripted::Hangup) => {
                    drop(wire);
                    self.disconnect();
                    return None;
                }
                None => {}
            }
            let now = Instant::now();
            if now >= deadline || self.state() != ConnectionState::Connected {
                return None;
            }
            wire = self
                .wire_changed
                .wait_timeout(wire, deadline - now)
                .map_or_else(|poisoned| poisoned.into_inner().0, |(wire, _)| wire);
        }
    }
}
