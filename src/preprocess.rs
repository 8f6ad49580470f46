//! Decorator that runs pluggable hooks over every line in both directions.

use std::{
    net::SocketAddr,
    sync::{Arc, Weak},
    time::Duration,
};

use tracing::trace;

use crate::{
    connection::{Connection, ConnectionId, ConnectionState, ListenerList, StateListener, StateRelay},
    error::Result,
};

/// Hook invoked on each line passing through a [`PreprocessingConnection`].
///
/// `connection` is the decorator itself. Returning `None` stops the line:
/// an outbound line is not sent and an inbound line is not returned.
pub trait MessagePreprocessor: Send + Sync {
    fn process_outbound(&self, connection: &Arc<dyn Connection>, line: String) -> Option<String>;

    fn process_inbound(&self, connection: &Arc<dyn Connection>, line: String) -> Option<String>;
}

/// Connection decorator applying an ordered list of preprocessors.
pub struct PreprocessingConnection {
    id: ConnectionId,
    inner: Arc<dyn Connection>,
    relay: Arc<StateRelay>,
    this: Weak<PreprocessingConnection>,
    preprocessors: ListenerList<dyn MessagePreprocessor>,
}

impl PreprocessingConnection {
    pub fn new(inner: Arc<dyn Connection>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let outer: Weak<dyn Connection> = this.clone();
            Self {
                id: ConnectionId::next(),
                relay: StateRelay::attach(&inner, outer),
                inner,
                this: this.clone(),
                preprocessors: ListenerList::new(),
            }
        })
    }

    #[must_use]
    pub fn inner(&self) -> &Arc<dyn Connection> { &self.inner }

    /// Append a preprocessor. Returns `false` if it is already registered.
    pub fn register_preprocessor(&self, preprocessor: Arc<dyn MessagePreprocessor>) -> bool {
        self.preprocessors.add(preprocessor)
    }

    pub fn remove_preprocessor(&self, preprocessor: &Arc<dyn MessagePreprocessor>) -> bool {
        self.preprocessors.remove(preprocessor)
    }

    fn handle(&self) -> Option<Arc<dyn Connection>> {
        self.this.upgrade().map(|this| this as Arc<dyn Connection>)
    }
}

impl Drop for PreprocessingConnection {
    fn drop(&mut self) { self.relay.detach(&self.inner); }
}

impl Connection for PreprocessingConnection {
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
        let Some(handle) = self.handle() else {
            return self.inner.send_line(line);
        };
        let mut line = line.to_owned();
        for preprocessor in self.preprocessors.snapshot().iter() {
            match preprocessor.process_outbound(&handle, line) {
                Some(next) => line = next,
                None => {
                    trace!(connection = %self.id, "outbound line dropped by preprocessor");
                    return false;
                }
            }
        }
        self.inner.send_line(&line)
    }

    fn receive_line(&self) -> Option<String> {
        let mut line = self.inner.receive_line()?;
        let Some(handle) = self.handle() else {
            return Some(line);
        };
        for preprocessor in self.preprocessors.snapshot().iter() {
            line = preprocessor.process_inbound(&handle, line)?;
        }
        Some(line)
    }
}
