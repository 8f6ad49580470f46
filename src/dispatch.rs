//! Routes typed events to registered handlers.
//!
//! Handlers register per [`EventKind`]. Dispatching an event visits its kind
//! and then each ancestor up to [`EventKind::Any`], so a handler registered
//! for a broad kind sees every narrower event exactly once. Handler lists are
//! copy-on-write: handlers may register or remove handlers, including
//! themselves, while a dispatch is running.

use std::{fmt, sync::Arc};

use tracing::trace;

use crate::{
    connection::{Connection, ListenerList},
    event::{Event, EventKind, InboundEvent, OutboundEvent},
    metrics,
    preprocess::MessagePreprocessor,
    translator::MessageTranslator,
};

/// Receiver of dispatched events.
///
/// One handler may serve several kinds; `accepts` declares which. The
/// dispatcher calls `handle_event` with the kind level being dispatched,
/// which for broad registrations differs from `event.kind()`.
pub trait EventHandler: Send + Sync {
    fn accepts(&self, kind: EventKind) -> bool;

    fn handle_event(&self, kind: EventKind, event: &mut Event);
}

struct FnHandler<F> {
    kind: EventKind,
    handler: F,
}

impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&mut Event) + Send + Sync,
{
    fn accepts(&self, kind: EventKind) -> bool { kind == self.kind }

    fn handle_event(&self, _kind: EventKind, event: &mut Event) { (self.handler)(event); }
}

/// Wrap a closure as a handler for a single kind.
///
/// ```
/// use chatnet::{EventDispatcher, EventKind, dispatch::handler_fn};
///
/// let dispatcher = EventDispatcher::new();
/// let handler = handler_fn(EventKind::LoginResponse, |event| {
///     println!("login response: {}", event.to_message());
/// });
/// assert!(dispatcher.register_handler(EventKind::LoginResponse, handler));
/// ```
pub fn handler_fn<F>(kind: EventKind, handler: F) -> Arc<dyn EventHandler>
where
    F: Fn(&mut Event) + Send + Sync + 'static,
{
    Arc::new(FnHandler { kind, handler })
}

/// Translator plus per-kind handler tables.
pub struct EventDispatcher {
    translator: Arc<MessageTranslator>,
    handlers: [ListenerList<dyn EventHandler>; EventKind::ALL.len()],
}

impl Default for EventDispatcher {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<_> = EventKind::ALL
            .iter()
            .map(|kind| (*kind, self.handler_count(*kind)))
            .filter(|(_, count)| *count > 0)
            .collect();
        f.debug_struct("EventDispatcher")
            .field("handlers", &counts)
            .finish_non_exhaustive()
    }
}

impl EventDispatcher {
    /// Dispatcher with the built-in translations.
    #[must_use]
    pub fn new() -> Self { Self::with_translator(Arc::new(MessageTranslator::new())) }

    #[must_use]
    pub fn with_translator(translator: Arc<MessageTranslator>) -> Self {
        Self {
            translator,
            handlers: std::array::from_fn(|_| ListenerList::new()),
        }
    }

    #[must_use]
    pub fn translator(&self) -> &Arc<MessageTranslator> { &self.translator }

    fn table(&self, kind: EventKind) -> &ListenerList<dyn EventHandler> { &self.handlers[kind.index()] }

    /// Register `handler` for `kind`.
    ///
    /// Returns `false` if the handler does not accept `kind` or is already
    /// registered for it.
    pub fn register_handler(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> bool {
        handler.accepts(kind) && self.table(kind).add(handler)
    }

    /// Register `handler` for every kind it accepts. Returns how many
    /// registrations were added.
    pub fn register_handler_ex(&self, handler: &Arc<dyn EventHandler>) -> usize {
        EventKind::ALL
            .iter()
            .filter(|kind| self.register_handler(**kind, Arc::clone(handler)))
            .count()
    }

    /// Remove `handler` from the table for `kind`, or failing that from the
    /// nearest ancestor table holding it.
    pub fn remove_handler(&self, kind: EventKind, handler: &Arc<dyn EventHandler>) -> bool {
        kind.lineage().any(|level| self.table(level).remove(handler))
    }

    /// Remove `handler` from every table. Returns how many removals happened.
    pub fn remove_handler_ex(&self, handler: &Arc<dyn EventHandler>) -> usize {
        EventKind::ALL
            .iter()
            .filter(|kind| self.table(**kind).remove(handler))
            .count()
    }

    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize { self.table(kind).len() }

    /// Deliver `event` to the handlers of its kind and of each ancestor kind.
    pub fn dispatch_event(&self, event: &mut Event) {
        let kind = event.kind();
        trace!(%kind, "dispatching event");
        for level in kind.lineage() {
            for handler in self.table(level).snapshot().iter() {
                if handler.accepts(level) {
                    handler.handle_event(level, event);
                }
            }
        }
        metrics::inc_events_dispatched();
    }

    /// Translate and dispatch `line`. Lines that do not translate are
    /// ignored and yield `None`.
    pub fn dispatch_message(&self, connection: &Arc<dyn Connection>, line: &str) -> Option<Event> {
        let mut event = self.translator.translate(connection, line)?;
        self.dispatch_event(&mut event);
        Some(event)
    }
}

impl MessagePreprocessor for EventDispatcher {
    /// Dispatch the line as an outbound event and drop it if a handler
    /// suppressed it. Handler edits to the event do not change the line.
    fn process_outbound(&self, connection: &Arc<dyn Connection>, line: String) -> Option<String> {
        let mut event = self
            .translator
            .translate(connection, &line)
            .unwrap_or_else(|| Event::Outbound(OutboundEvent::unknown(Arc::clone(connection), line.as_str())));
        self.dispatch_event(&mut event);
        if event.is_suppressed() {
            trace!(line, "outbound line suppressed");
            return None;
        }
        Some(line)
    }

    /// Dispatch the line as an inbound event and pass it on unchanged.
    fn process_inbound(&self, connection: &Arc<dyn Connection>, line: String) -> Option<String> {
        let mut event = self
            .translator
            .translate(connection, &line)
            .unwrap_or_else(|| Event::Inbound(InboundEvent::unknown(Arc::clone(connection), line.as_str())));
        self.dispatch_event(&mut event);
        Some(line)
    }
}
