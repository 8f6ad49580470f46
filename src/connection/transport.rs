//! Blocking TCP transport.
//!
//! Lock discipline: `connect` takes the write level first and a nested read
//! second, so two threads racing to connect serialise instead of both
//! holding reads and deadlocking on the upgrade. `disconnect` shuts the
//! socket down before taking the write level, which unblocks any thread
//! parked in `receive_line` so that it leaves its read level. Reader and
//! writer paths drop their read level before reacting to an I/O failure.
//! Listeners are notified after the write level is released and before the
//! read level is, then a signal is posted for `join`.

use std::{
    io::{self, Write},
    net::{Shutdown, SocketAddr, TcpStream},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, error, info, trace, warn};

use super::{
    Connection,
    ConnectionId,
    ConnectionState,
    LineBuffer,
    ListenerList,
    StateListener,
};
use crate::{
    config::ConnectionConfig,
    error::{ChatNetError, Result},
    metrics,
    sync::SignalLock,
};

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }

/// Why socket setup failed.
enum SetupError {
    /// The peer could not be reached; the connection stays usable.
    Connect(io::Error),
    /// Local socket configuration failed; the connection is closed.
    Socket(io::Error),
}

enum ReadOutcome {
    Line(String),
    TimedOut,
    Ended(Option<io::Error>),
}

/// Root connection speaking newline-terminated lines over TCP.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use chatnet::{Connection, ConnectionConfig, TcpConnection};
///
/// let connection = Arc::new(TcpConnection::new(ConnectionConfig::default()));
/// if connection.connect("127.0.0.1:5005".parse()?)? {
///     connection.send_line("NOOP");
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct TcpConnection {
    id: ConnectionId,
    config: ConnectionConfig,
    lock: SignalLock,
    state: Mutex<ConnectionState>,
    stream: Mutex<Option<Arc<TcpStream>>>,
    input: Mutex<LineBuffer>,
    output: Mutex<()>,
    listeners: ListenerList<dyn StateListener>,
}

impl Default for TcpConnection {
    fn default() -> Self { Self::new(ConnectionConfig::default()) }
}

impl TcpConnection {
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            id: ConnectionId::next(),
            lock: SignalLock::new(),
            state: Mutex::new(ConnectionState::Disconnected),
            stream: Mutex::new(None),
            input: Mutex::new(LineBuffer::new(config.buffer_size())),
            output: Mutex::new(()),
            listeners: ListenerList::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ConnectionConfig { &self.config }

    /// Address of the connected peer, if any.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        guard(&self.stream)
            .as_ref()
            .and_then(|stream| stream.peer_addr().ok())
    }

    fn current_stream(&self) -> Option<Arc<TcpStream>> { guard(&self.stream).clone() }

    fn set_state(&self, state: ConnectionState) { *guard(&self.state) = state; }

    fn notify(&self, state: ConnectionState) {
        for listener in self.listeners.snapshot().iter() {
            listener.on_state_change(self, state);
        }
        self.lock.post_signal();
    }

    fn open_stream(&self, address: SocketAddr) -> std::result::Result<TcpStream, SetupError> {
        let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
            .map_err(SetupError::Socket)?;
        self.config.apply(&socket).map_err(SetupError::Socket)?;
        let target = address.into();
        match self.config.handshake_timeout() {
            Some(timeout) => socket.connect_timeout(&target, timeout),
            None => socket.connect(&target),
        }
        .map_err(SetupError::Connect)?;
        let stream: TcpStream = socket.into();
        stream
            .set_nodelay(self.config.is_nodelay())
            .map_err(SetupError::Socket)?;
        Ok(stream)
    }

    /// Take the stream out of its slot and shut it down. Requires the write
    /// level.
    fn teardown(&self) {
        if let Some(stream) = guard(&self.stream).take() {
            if let Err(error) = stream.shutdown(Shutdown::Both) {
                trace!(connection = %self.id, %error, "socket already shut down");
            }
            metrics::dec_connections();
        }
        guard(&self.input).clear();
    }

    fn read_line(&self) -> Option<ReadOutcome> {
        let _read = self.lock.read();
        if self.state() != ConnectionState::Connected {
            return None;
        }
        let stream = self.current_stream()?;
        let mut reader: &TcpStream = &stream;
        let mut input = guard(&self.input);
        loop {
            if let Some(line) = input.next_line() {
                return Some(ReadOutcome::Line(line));
            }
            match input.fill_from(&mut reader) {
                Ok(0) => return Some(ReadOutcome::Ended(None)),
                Ok(_) => {}
                Err(error)
                    if matches!(
                        error.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Some(ReadOutcome::TimedOut);
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Some(ReadOutcome::Ended(Some(error))),
            }
        }
    }

    fn write_line(&self, line: &str) -> Option<io::Result<()>> {
        let _read = self.lock.read();
        if self.state() != ConnectionState::Connected {
            return None;
        }
        let stream = self.current_stream()?;
        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line.as_bytes());
        frame.push(b'\n');
        let _output = guard(&self.output);
        let mut writer: &TcpStream = &stream;
        Some(writer.write_all(&frame).and_then(|()| writer.flush()))
    }
}

impl Connection for TcpConnection {
    fn id(&self) -> ConnectionId { self.id }

    fn connect(&self, address: SocketAddr) -> Result<bool> {
        let write = self.lock.write();
        let _read = self.lock.read();
        let state = self.state();
        if state != ConnectionState::Disconnected {
            return Err(ChatNetError::IllegalState(state));
        }
        let outcome = match self.open_stream(address) {
            Ok(stream) => {
                *guard(&self.stream) = Some(Arc::new(stream));
                guard(&self.input).clear();
                self.set_state(ConnectionState::Connected);
                metrics::inc_connections();
                info!(connection = %self.id, %address, "connected");
                Some(ConnectionState::Connected)
            }
            Err(SetupError::Connect(error)) => {
                warn!(connection = %self.id, %address, %error, "connection attempt failed");
                None
            }
            Err(SetupError::Socket(error)) => {
                error!(connection = %self.id, %address, %error, "socket setup failed, closing");
                self.set_state(ConnectionState::Closed);
                Some(ConnectionState::Closed)
            }
        };
        drop(write);
        if let Some(state) = outcome {
            self.notify(state);
        }
        Ok(outcome == Some(ConnectionState::Connected))
    }

    fn disconnect(&self) -> bool {
        if self.state() != ConnectionState::Connected {
            return false;
        }
        // Wake any reader parked on the socket before waiting for the write level.
        let Some(stream) = self.current_stream() else {
            return false;
        };
        if let Err(error) = stream.shutdown(Shutdown::Both) {
            trace!(connection = %self.id, %error, "socket already shut down");
        }

        let write = self.lock.write();
        let _read = self.lock.read();
        let same_session = guard(&self.stream)
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &stream));
        if !same_session || self.state() != ConnectionState::Connected {
            return false;
        }
        self.set_state(ConnectionState::Disconnected);
        self.teardown();
        drop(write);
        info!(connection = %self.id, "disconnected");
        self.notify(ConnectionState::Disconnected);
        true
    }

    fn close(&self) -> bool {
        if self.state() == ConnectionState::Closed {
            return false;
        }
        self.disconnect();

        let write = self.lock.write();
        let _read = self.lock.read();
        let mut changes = Vec::with_capacity(2);
        match self.state() {
            ConnectionState::Closed => return false,
            ConnectionState::Connected => {
                // Reconnected by another thread in the meantime.
                self.set_state(ConnectionState::Disconnected);
                self.teardown();
                changes.push(ConnectionState::Disconnected);
            }
            ConnectionState::Disconnected => {}
        }
        self.set_state(ConnectionState::Closed);
        changes.push(ConnectionState::Closed);
        drop(write);
        info!(connection = %self.id, "closed");
        for state in changes {
            self.notify(state);
        }
        true
    }

    fn join(&self, timeout: Option<Duration>) -> Result<bool> {
        let _read = self.lock.read();
        let initial = self.state();
        if initial == ConnectionState::Closed {
            return Err(ChatNetError::IllegalState(initial));
        }
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            let remaining = match deadline {
                None => None,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(false);
                    }
                    Some(deadline - now)
                }
            };
            self.lock.wait_for_signal(remaining);
            if self.state() != initial {
                return Ok(true);
            }
        }
    }

    fn state(&self) -> ConnectionState { *guard(&self.state) }

    fn exec_while_state(&self, expected: ConnectionState, action: &mut dyn FnMut()) -> bool {
        let _read = self.lock.read();
        if self.state() != expected {
            return false;
        }
        action();
        true
    }

    fn register_state_listener(&self, listener: Arc<dyn StateListener>) -> bool { self.listeners.add(listener) }

    fn remove_state_listener(&self, listener: &Arc<dyn StateListener>) -> bool { self.listeners.remove(listener) }

    fn send_line(&self, line: &str) -> bool {
        if line.is_empty() {
            return false;
        }
        match self.write_line(line) {
            None => false,
            Some(Ok(())) => {
                trace!(connection = %self.id, line, "sent");
                metrics::inc_lines(metrics::Direction::Outbound);
                true
            }
            Some(Err(error)) => {
                warn!(connection = %self.id, %error, "write failed, disconnecting");
                self.disconnect();
                false
            }
        }
    }

    fn receive_line(&self) -> Option<String> {
        match self.read_line()? {
            ReadOutcome::Line(line) => {
                trace!(connection = %self.id, line = %line, "received");
                metrics::inc_lines(metrics::Direction::Inbound);
                Some(line)
            }
            ReadOutcome::TimedOut => None,
            ReadOutcome::Ended(error) => {
                match error {
                    Some(error) => warn!(connection = %self.id, %error, "read failed, disconnecting"),
                    None => debug!(connection = %self.id, "peer closed the stream"),
                }
                self.disconnect();
                None
            }
        }
    }
}
