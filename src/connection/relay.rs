//! Re-announces an inner connection's state changes on behalf of a decorator.

use std::sync::{Arc, Weak};

use tracing::trace;

use super::{Connection, ConnectionId, ConnectionState, ListenerList, StateListener};

/// State listener installed by a decorator on the connection it wraps.
///
/// The relay ignores notifications whose source is not the wrapped
/// connection and forwards the rest to the decorator's own listeners with the
/// decorator as the source. It holds the decorator weakly, so dropping the
/// decorator silences the relay.
pub struct StateRelay {
    inner: ConnectionId,
    outer: Weak<dyn Connection>,
    listeners: ListenerList<dyn StateListener>,
}

impl StateRelay {
    /// Build a relay for `outer` and register it on `inner`.
    ///
    /// Decorators call this from [`Arc::new_cyclic`], passing their own weak
    /// handle as `outer`.
    pub fn attach(inner: &Arc<dyn Connection>, outer: Weak<dyn Connection>) -> Arc<Self> {
        let relay = Arc::new(Self {
            inner: inner.id(),
            outer,
            listeners: ListenerList::new(),
        });
        inner.register_state_listener(relay.clone());
        relay
    }

    /// Unregister from `inner`. Decorators call this when dropped.
    pub fn detach(self: &Arc<Self>, inner: &Arc<dyn Connection>) -> bool {
        let listener: Arc<dyn StateListener> = self.clone();
        inner.remove_state_listener(&listener)
    }

    pub fn register(&self, listener: Arc<dyn StateListener>) -> bool { self.listeners.add(listener) }

    pub fn remove(&self, listener: &Arc<dyn StateListener>) -> bool { self.listeners.remove(listener) }
}

impl StateListener for StateRelay {
    fn on_state_change(&self, source: &dyn Connection, state: ConnectionState) {
        if source.id() != self.inner {
            return;
        }
        let Some(outer) = self.outer.upgrade() else {
            return;
        };
        trace!(inner = %self.inner, outer = %outer.id(), %state, "relaying state change");
        for listener in self.listeners.snapshot().iter() {
            listener.on_state_change(outer.as_ref(), state);
        }
    }
}
