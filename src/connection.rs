//! The connection abstraction shared by the transport and its decorators.
//!
//! A [`Connection`] moves single-line protocol messages over a stream and
//! owns a three-state lifecycle:
//!
//! ```text
//! Disconnected --connect--> Connected --disconnect--> Disconnected
//!       \                        |
//!        \-------close-----------+--------------------> Closed (terminal)
//! ```
//!
//! [`TcpConnection`] is the root transport. Decorators such as
//! [`MessageThrottle`](crate::MessageThrottle) and
//! [`PreprocessingConnection`](crate::PreprocessingConnection) wrap another
//! connection, forward lifecycle operations to it, and re-announce its state
//! changes to their own listeners through a [`StateRelay`] so that listeners
//! always observe the connection they registered on.

use std::{
    fmt,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use crate::error::Result;

pub(crate) mod ext;
mod framing;
mod listeners;
mod relay;
mod transport;

pub use ext::{CLIENT_NAME, ConnectionExt, MAX_ARENA_ID, MAX_FREQUENCY};
pub use framing::LineBuffer;
pub use listeners::ListenerList;
pub use relay::StateRelay;
pub use transport::TcpConnection;

/// Lifecycle state of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not connected; `connect` may be called.
    Disconnected,
    /// A session is established.
    Connected,
    /// Terminal; no further operation succeeds.
    Closed,
}

impl ConnectionState {
    /// Lower-case name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a connection or decorator.
///
/// State relays compare identities to recognise which connection a
/// notification came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl ConnectionId {
    /// Create a [`ConnectionId`] with the provided value.
    #[must_use]
    pub fn new(id: u64) -> Self { Self(id) }

    /// Allocate a fresh identifier.
    #[must_use]
    pub fn next() -> Self { Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "conn-{}", self.0) }
}

/// Observer of connection state changes.
///
/// `source` is the connection the listener registered on. Listeners run on
/// the thread that performed the transition, while that thread still holds
/// the connection's read lock; they may call back into the connection but
/// must not block on another thread that is itself transitioning it.
pub trait StateListener: Send + Sync {
    fn on_state_change(&self, source: &dyn Connection, state: ConnectionState);
}

/// A line-oriented, stateful chat connection.
///
/// All methods take `&self`; implementations are shared between the reader
/// thread, the throttle worker and application code behind an `Arc`.
pub trait Connection: Send + Sync {
    /// Identity used by state relays.
    fn id(&self) -> ConnectionId;

    /// Open a session to `address`.
    ///
    /// Returns `Ok(true)` once connected and `Ok(false)` when the attempt
    /// failed. A refused or unreachable peer leaves the connection
    /// disconnected; any other setup failure closes it.
    ///
    /// # Errors
    ///
    /// Returns [`ChatNetError::IllegalState`](crate::ChatNetError::IllegalState)
    /// unless the connection is disconnected.
    fn connect(&self, address: SocketAddr) -> Result<bool>;

    /// End the current session. Returns `true` if a session was ended.
    fn disconnect(&self) -> bool;

    /// Disconnect if needed and enter the terminal state. Returns `false` if
    /// the connection was already closed.
    fn close(&self) -> bool;

    /// Block until the state changes or `timeout` elapses. `None` waits
    /// without a bound. Returns `true` if the state changed.
    ///
    /// # Errors
    ///
    /// Returns [`ChatNetError::IllegalState`](crate::ChatNetError::IllegalState)
    /// if the connection is closed, since it can never change again.
    fn join(&self, timeout: Option<Duration>) -> Result<bool>;

    fn state(&self) -> ConnectionState;

    /// Run `action` while holding the read lock, provided the state equals
    /// `expected`. Returns whether `action` ran.
    fn exec_while_state(&self, expected: ConnectionState, action: &mut dyn FnMut()) -> bool;

    /// Returns `false` if the listener was already registered.
    fn register_state_listener(&self, listener: Arc<dyn StateListener>) -> bool;

    /// Returns `false` if the listener was not registered.
    fn remove_state_listener(&self, listener: &Arc<dyn StateListener>) -> bool;

    /// Send one line. The terminator is appended by the transport. Returns
    /// `false` if the line was empty, the connection is not connected, or
    /// the write failed.
    fn send_line(&self, line: &str) -> bool;

    /// Receive the next line without its terminator. Returns `None` when the
    /// connection is not connected, the read timed out, or the session ended.
    fn receive_line(&self) -> Option<String>;
}
