//! Shared utilities for integration tests.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use chatnet::{Connection, ConnectionConfig, TcpConnection};
use chatnet_testing::StubServer;
use rstest::fixture;

/// Generous bound for anything that should happen promptly.
pub const PATIENCE: Duration = Duration::from_secs(5);

/// A localhost address nothing is listening on.
pub fn refused_address() -> SocketAddr {
    let listener =
        TcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0)).expect("failed to bind port");
    listener.local_addr().expect("bound listener has an address")
}

#[fixture]
pub fn server() -> StubServer { StubServer::start().expect("stub server starts") }

/// Root transport with a short read timeout so tests never hang on reads.
pub fn tcp_connection() -> Arc<TcpConnection> {
    Arc::new(TcpConnection::new(
        ConnectionConfig::default().socket_timeout(Some(Duration::from_millis(200))),
    ))
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Read lines until `count` arrived or `timeout` elapsed.
pub fn receive_lines(connection: &dyn Connection, count: usize, timeout: Duration) -> Vec<String> {
    let deadline = Instant::now() + timeout;
    let mut lines = Vec::new();
    while lines.len() < count && Instant::now() < deadline {
        if let Some(line) = connection.receive_line() {
            lines.push(line);
        }
    }
    lines
}
