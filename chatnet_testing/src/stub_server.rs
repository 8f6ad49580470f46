//! A minimal line server on localhost.

use std::{
    io::{self, BufRead, BufReader, Write},
    net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread,
    time::{Duration, Instant},
};

#[derive(Default)]
struct Peer {
    client: Option<TcpStream>,
    accepted: usize,
    received: Vec<String>,
}

struct Inner {
    peer: Mutex<Peer>,
    changed: Condvar,
}

impl Inner {
    fn peer(&self) -> MutexGuard<'_, Peer> { self.peer.lock().unwrap_or_else(PoisonError::into_inner) }

    fn wait_until(&self, timeout: Duration, done: impl Fn(&Peer) -> bool) -> MutexGuard<'_, Peer> {
        let deadline = Instant::now() + timeout;
        let mut peer = self.peer();
        while !done(&peer) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            peer = self
                .changed
                .wait_timeout(peer, deadline - now)
                .map_or_else(|poisoned| poisoned.into_inner().0, |(peer, _)| peer);
        }
        peer
    }
}

/// Accepts clients one at a time and records the lines they send.
///
/// A new client replaces the previous one. The accept thread runs for the
/// life of the process, which is fine for tests.
pub struct StubServer {
    address: SocketAddr,
    inner: Arc<Inner>,
}

impl StubServer {
    /// Bind an ephemeral localhost port and start accepting.
    ///
    /// # Errors
    ///
    /// Returns any error from binding the listener.
    pub fn start() -> io::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))?;
        let address = listener.local_addr()?;
        let inner = Arc::new(Inner {
            peer: Mutex::new(Peer::default()),
            changed: Condvar::new(),
        });
        let acceptor = Arc::clone(&inner);
        thread::Builder::new()
            .name("stub-server".into())
            .spawn(move || accept_loop(&listener, &acceptor))?;
        Ok(Self { address, inner })
    }

    pub fn address(&self) -> SocketAddr { self.address }

    /// Wait until `count` clients have been accepted in total.
    pub fn wait_for_clients(&self, count: usize, timeout: Duration) -> bool {
        self.inner.wait_until(timeout, |peer| peer.accepted >= count).accepted >= count
    }

    /// Wait until at least `count` lines were received, then return them.
    pub fn wait_for_lines(&self, count: usize, timeout: Duration) -> Vec<String> {
        self.inner
            .wait_until(timeout, |peer| peer.received.len() >= count)
            .received
            .clone()
    }

    /// Write `payload` verbatim to the current client.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::NotConnected`] when no client is attached.
    pub fn send_raw(&self, payload: &[u8]) -> io::Result<()> {
        let peer = self.inner.peer();
        let mut client = peer
            .client
            .as_ref()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        client.write_all(payload)?;
        client.flush()
    }

    /// Send `line` followed by a newline.
    ///
    /// # Errors
    ///
    /// See [`send_raw`](Self::send_raw).
    pub fn send_line(&self, line: &str) -> io::Result<()> { self.send_raw(format!("{line}\n").as_bytes()) }

    /// Close the current client's socket.
    pub fn hang_up(&self) {
        if let Some(client) = self.inner.peer().client.take() {
            let _ = client.shutdown(Shutdown::Both);
        }
    }
}

fn accept_loop(listener: &TcpListener, inner: &Arc<Inner>) {
    for stream in listener.incoming() {
        let Ok(stream) = stream else {
            continue;
        };
        let Ok(reader) = stream.try_clone() else {
            continue;
        };
        {
            let mut peer = inner.peer();
            if let Some(previous) = peer.client.replace(stream) {
                let _ = previous.shutdown(Shutdown::Both);
            }
            peer.accepted += 1;
            inner.changed.notify_all();
        }
        let recorder = Arc::clone(inner);
        thread::spawn(move || {
            for line in BufReader::new(reader).lines() {
                let Ok(line) = line else {
                    break;
                };
                recorder.peer().received.push(line);
                recorder.changed.notify_all();
            }
        });
    }
}
