//! Connection and throttle configuration.
//!
//! Both types are plain values built with chained setters. Values that would
//! be unusable (zero timeouts, undersized buffers) are normalised when the
//! setter runs so a built configuration is always safe to hand to a
//! connection.

use std::{net::SocketAddr, time::Duration};

use socket2::Socket;

/// Smallest input buffer a connection accepts.
pub const MIN_INPUT_BUFFER: usize = 16;

/// Socket and framing options applied by [`TcpConnection`](crate::TcpConnection).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use chatnet::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .socket_timeout(Some(Duration::from_secs(60)))
///     .nodelay(true);
/// assert_eq!(config.read_timeout(), Some(Duration::from_secs(60)));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    socket_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    bind_address: Option<SocketAddr>,
    input_buffer_size: usize,
    nodelay: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            socket_timeout: Some(Duration::from_secs(300)),
            connect_timeout: None,
            bind_address: None,
            input_buffer_size: 1024,
            nodelay: false,
        }
    }
}

impl ConnectionConfig {
    /// Read timeout applied to the socket. `None` or a zero duration blocks
    /// indefinitely.
    #[must_use]
    pub fn socket_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.socket_timeout = timeout.filter(|value| !value.is_zero());
        self
    }

    /// Upper bound on the TCP handshake. `None` leaves it to the OS.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout.filter(|value| !value.is_zero());
        self
    }

    /// Bind the local end of the socket before connecting.
    #[must_use]
    pub fn bind_address(mut self, address: Option<SocketAddr>) -> Self {
        self.bind_address = address;
        self
    }

    /// Capacity of the inbound line buffer, clamped to [`MIN_INPUT_BUFFER`].
    ///
    /// Lines longer than this are delivered in buffer-sized pieces.
    #[must_use]
    pub fn input_buffer_size(mut self, size: usize) -> Self {
        self.input_buffer_size = size.max(MIN_INPUT_BUFFER);
        self
    }

    /// Configure `TCP_NODELAY` on the socket.
    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }

    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> { self.socket_timeout }

    #[must_use]
    pub fn handshake_timeout(&self) -> Option<Duration> { self.connect_timeout }

    #[must_use]
    pub fn local_address(&self) -> Option<SocketAddr> { self.bind_address }

    #[must_use]
    pub fn buffer_size(&self) -> usize { self.input_buffer_size }

    #[must_use]
    pub fn is_nodelay(&self) -> bool { self.nodelay }

    /// Apply the pre-connect options to `socket`.
    pub(crate) fn apply(&self, socket: &Socket) -> std::io::Result<()> {
        if let Some(address) = self.bind_address {
            socket.bind(&address.into())?;
        }
        socket.set_read_timeout(self.socket_timeout)?;
        Ok(())
    }
}

/// Pacing parameters for [`MessageThrottle`](crate::MessageThrottle).
///
/// A zero `burst` or `limit` disables that bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Messages released per burst.
    pub burst: u32,
    /// Credit ceiling; a burst stops once this many releases are outstanding.
    pub limit: u32,
    /// Pause between bursts.
    pub delay: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            burst: 3,
            limit: 6,
            delay: Duration::from_millis(1250),
        }
    }
}

impl ThrottleConfig {
    #[must_use]
    pub fn burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_match_protocol_expectations() {
        let config = ConnectionConfig::default();
        assert_eq!(config.read_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.buffer_size(), 1024);
        assert!(!config.is_nodelay());

        let throttle = ThrottleConfig::default();
        assert_eq!((throttle.burst, throttle.limit), (3, 6));
        assert_eq!(throttle.delay, Duration::from_millis(1250));
    }

    #[rstest]
    #[case(0, MIN_INPUT_BUFFER)]
    #[case(4, MIN_INPUT_BUFFER)]
    #[case(4096, 4096)]
    fn buffer_size_is_clamped(#[case] requested: usize, #[case] expected: usize) {
        let config = ConnectionConfig::default().input_buffer_size(requested);
        assert_eq!(config.buffer_size(), expected);
    }

    #[test]
    fn zero_timeouts_mean_no_timeout() {
        let config = ConnectionConfig::default()
            .socket_timeout(Some(Duration::ZERO))
            .connect_timeout(Some(Duration::ZERO));
        assert_eq!(config.read_timeout(), None);
        assert_eq!(config.handshake_timeout(), None);
    }
}
