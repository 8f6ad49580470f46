//! Listeners and handlers that remember what they saw.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chatnet::{Connection, ConnectionId, ConnectionState, Event, EventHandler, EventKind, StateListener};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }

/// State listener recording `(source, state)` pairs in arrival order.
#[derive(Default)]
pub struct RecordingListener {
    seen: Mutex<Vec<(ConnectionId, ConnectionState)>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn seen(&self) -> Vec<(ConnectionId, ConnectionState)> { lock(&self.seen).clone() }

    /// States only, for listeners registered on a single connection.
    pub fn states(&self) -> Vec<ConnectionState> { lock(&self.seen).iter().map(|(_, state)| *state).collect() }
}

impl StateListener for RecordingListener {
    fn on_state_change(&self, source: &dyn Connection, state: ConnectionState) {
        lock(&self.seen).push((source.id(), state));
    }
}

/// One dispatched event as a [`RecordingHandler`] saw it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Kind level the handler was invoked for.
    pub level: EventKind,
    /// The event's own kind.
    pub kind: EventKind,
    /// Wire form of the event when it was handled.
    pub message: String,
}

/// Event handler accepting a fixed set of kinds.
pub struct RecordingHandler {
    kinds: Vec<EventKind>,
    suppress: bool,
    seen: Mutex<Vec<RecordedEvent>>,
}

impl RecordingHandler {
    pub fn new(kinds: &[EventKind]) -> Arc<Self> {
        Arc::new(Self {
            kinds: kinds.to_vec(),
            suppress: false,
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Handler that also suppresses every outbound event it handles.
    pub fn suppressing(kinds: &[EventKind]) -> Arc<Self> {
        Arc::new(Self {
            kinds: kinds.to_vec(),
            suppress: true,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<RecordedEvent> { lock(&self.seen).clone() }

    pub fn messages(&self) -> Vec<String> { lock(&self.seen).iter().map(|event| event.message.clone()).collect() }

    pub fn count(&self) -> usize { lock(&self.seen).len() }
}

impl EventHandler for RecordingHandler {
    fn accepts(&self, kind: EventKind) -> bool { self.kinds.contains(&kind) }

    fn handle_event(&self, kind: EventKind, event: &mut Event) {
        lock(&self.seen).push(RecordedEvent {
            level: kind,
            kind: event.kind(),
            message: event.to_message().into_owned(),
        });
        if self.suppress {
            event.suppress();
        }
    }
}
