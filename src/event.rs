//! Typed events built from protocol lines.
//!
//! Every event belongs to exactly one [`EventKind`]. Kinds form a shallow
//! tree rooted at [`EventKind::Any`]:
//!
//! ```text
//! Any
//! ├── Inbound
//! │   ├── EnteredArena, LoginResponse, PlayerDeath, PlayerEntered,
//! │   └── PlayerLeft, PlayerUpdate, InboundChat
//! └── Outbound
//!     └── ChangeArena, ChangeFrequency, OutboundChat
//! ```
//!
//! Lines that no translation recognises become events of the bare
//! `Inbound`/`Outbound` kind carrying the raw text, so handlers registered
//! for the broad kinds still observe them.
//!
//! Inbound events keep the received line and expose parsed, read-only
//! fields. Outbound events are mutable until sent, regenerate their line on
//! demand and carry a suppression flag.

use std::{borrow::Cow, fmt, sync::Arc};

use crate::connection::Connection;

mod chat;
mod error;
mod inbound;
mod outbound;

pub use chat::{ChatType, Ship};
pub use error::ParseError;
pub use inbound::{
    EnteredArena,
    InboundChatMessage,
    LoginResponse,
    PlayerDeath,
    PlayerEntered,
    PlayerLeft,
    PlayerUpdate,
};
pub use outbound::{ChangeArena, ChangeFrequency, OutboundChatMessage};

/// Position of an event in the kind tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Every event.
    Any,
    /// Every received line.
    Inbound,
    EnteredArena,
    LoginResponse,
    PlayerDeath,
    PlayerEntered,
    PlayerLeft,
    PlayerUpdate,
    InboundChat,
    /// Every line about to be sent.
    Outbound,
    ChangeArena,
    ChangeFrequency,
    OutboundChat,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 13] = [
        EventKind::Any,
        EventKind::Inbound,
        EventKind::EnteredArena,
        EventKind::LoginResponse,
        EventKind::PlayerDeath,
        EventKind::PlayerEntered,
        EventKind::PlayerLeft,
        EventKind::PlayerUpdate,
        EventKind::InboundChat,
        EventKind::Outbound,
        EventKind::ChangeArena,
        EventKind::ChangeFrequency,
        EventKind::OutboundChat,
    ];

    /// Dense index usable for per-kind tables.
    #[must_use]
    pub const fn index(self) -> usize { self as usize }

    #[must_use]
    pub const fn parent(self) -> Option<EventKind> {
        match self {
            EventKind::Any => None,
            EventKind::Inbound | EventKind::Outbound => Some(EventKind::Any),
            EventKind::EnteredArena
            | EventKind::LoginResponse
            | EventKind::PlayerDeath
            | EventKind::PlayerEntered
            | EventKind::PlayerLeft
            | EventKind::PlayerUpdate
            | EventKind::InboundChat => Some(EventKind::Inbound),
            EventKind::ChangeArena | EventKind::ChangeFrequency | EventKind::OutboundChat => {
                Some(EventKind::Outbound)
            }
        }
    }

    /// This kind followed by each ancestor up to [`EventKind::Any`].
    pub fn lineage(self) -> impl Iterator<Item = EventKind> {
        std::iter::successors(Some(self), |kind| kind.parent())
    }

    /// Whether events of this kind are also of kind `ancestor`.
    #[must_use]
    pub fn is_a(self, ancestor: EventKind) -> bool { self.lineage().any(|kind| kind == ancestor) }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(self, f) }
}

/// Parsed content of a received line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    EnteredArena(EnteredArena),
    LoginResponse(LoginResponse),
    PlayerDeath(PlayerDeath),
    PlayerEntered(PlayerEntered),
    PlayerLeft(PlayerLeft),
    PlayerUpdate(PlayerUpdate),
    Chat(InboundChatMessage),
    /// No translation recognised the line.
    Unknown,
}

impl Inbound {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Inbound::EnteredArena(_) => EventKind::EnteredArena,
            Inbound::LoginResponse(_) => EventKind::LoginResponse,
            Inbound::PlayerDeath(_) => EventKind::PlayerDeath,
            Inbound::PlayerEntered(_) => EventKind::PlayerEntered,
            Inbound::PlayerLeft(_) => EventKind::PlayerLeft,
            Inbound::PlayerUpdate(_) => EventKind::PlayerUpdate,
            Inbound::Chat(_) => EventKind::InboundChat,
            Inbound::Unknown => EventKind::Inbound,
        }
    }
}

/// Editable content of a line about to be sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    ChangeArena(ChangeArena),
    ChangeFrequency(ChangeFrequency),
    Chat(OutboundChatMessage),
    /// No translation recognised the line; it is carried verbatim.
    Unknown(String),
}

impl Outbound {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Outbound::ChangeArena(_) => EventKind::ChangeArena,
            Outbound::ChangeFrequency(_) => EventKind::ChangeFrequency,
            Outbound::Chat(_) => EventKind::OutboundChat,
            Outbound::Unknown(_) => EventKind::Outbound,
        }
    }

    /// Render the wire line for the current field values.
    #[must_use]
    pub fn to_message(&self) -> String {
        match self {
            Outbound::ChangeArena(event) => event.to_message(),
            Outbound::ChangeFrequency(event) => event.to_message(),
            Outbound::Chat(event) => event.to_message(),
            Outbound::Unknown(line) => line.clone(),
        }
    }
}

/// A received line together with the connection it arrived on.
#[derive(Clone)]
pub struct InboundEvent {
    connection: Arc<dyn Connection>,
    line: String,
    detail: Inbound,
}

impl InboundEvent {
    #[must_use]
    pub fn new(connection: Arc<dyn Connection>, line: impl Into<String>, detail: Inbound) -> Self {
        Self {
            connection,
            line: line.into(),
            detail,
        }
    }

    /// Wrap a line no translation recognised.
    #[must_use]
    pub fn unknown(connection: Arc<dyn Connection>, line: impl Into<String>) -> Self {
        Self::new(connection, line, Inbound::Unknown)
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<dyn Connection> { &self.connection }

    /// The received line, unchanged.
    #[must_use]
    pub fn line(&self) -> &str { &self.line }

    #[must_use]
    pub fn detail(&self) -> &Inbound { &self.detail }

    #[must_use]
    pub fn kind(&self) -> EventKind { self.detail.kind() }
}

impl fmt::Debug for InboundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundEvent")
            .field("connection", &self.connection.id())
            .field("line", &self.line)
            .field("detail", &self.detail)
            .finish()
    }
}

/// A line about to be sent, open to inspection, mutation and suppression.
#[derive(Clone)]
pub struct OutboundEvent {
    connection: Arc<dyn Connection>,
    detail: Outbound,
    suppressed: bool,
}

impl OutboundEvent {
    #[must_use]
    pub fn new(connection: Arc<dyn Connection>, detail: Outbound) -> Self {
        Self {
            connection,
            detail,
            suppressed: false,
        }
    }

    /// Wrap a line no translation recognised.
    #[must_use]
    pub fn unknown(connection: Arc<dyn Connection>, line: impl Into<String>) -> Self {
        Self::new(connection, Outbound::Unknown(line.into()))
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<dyn Connection> { &self.connection }

    #[must_use]
    pub fn detail(&self) -> &Outbound { &self.detail }

    pub fn detail_mut(&mut self) -> &mut Outbound { &mut self.detail }

    #[must_use]
    pub fn kind(&self) -> EventKind { self.detail.kind() }

    #[must_use]
    pub fn to_message(&self) -> String { self.detail.to_message() }

    /// Cancel the send this event describes. Handlers still run.
    pub fn suppress(&mut self) { self.suppressed = true; }

    #[must_use]
    pub fn is_suppressed(&self) -> bool { self.suppressed }
}

impl fmt::Debug for OutboundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundEvent")
            .field("connection", &self.connection.id())
            .field("detail", &self.detail)
            .field("suppressed", &self.suppressed)
            .finish()
    }
}

/// Any event the dispatcher can route.
#[derive(Clone, Debug)]
pub enum Event {
    Inbound(InboundEvent),
    Outbound(OutboundEvent),
}

impl Event {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Inbound(event) => event.kind(),
            Event::Outbound(event) => event.kind(),
        }
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<dyn Connection> {
        match self {
            Event::Inbound(event) => event.connection(),
            Event::Outbound(event) => event.connection(),
        }
    }

    /// The wire line: verbatim for inbound events, regenerated for outbound.
    #[must_use]
    pub fn to_message(&self) -> Cow<'_, str> {
        match self {
            Event::Inbound(event) => Cow::Borrowed(event.line()),
            Event::Outbound(event) => Cow::Owned(event.to_message()),
        }
    }

    #[must_use]
    pub fn as_inbound(&self) -> Option<&InboundEvent> {
        match self {
            Event::Inbound(event) => Some(event),
            Event::Outbound(_) => None,
        }
    }

    #[must_use]
    pub fn as_outbound(&self) -> Option<&OutboundEvent> {
        match self {
            Event::Outbound(event) => Some(event),
            Event::Inbound(_) => None,
        }
    }

    pub fn as_outbound_mut(&mut self) -> Option<&mut OutboundEvent> {
        match self {
            Event::Outbound(event) => Some(event),
            Event::Inbound(_) => None,
        }
    }

    /// Suppress an outbound event. Returns `false` for inbound events, which
    /// cannot be suppressed.
    pub fn suppress(&mut self) -> bool {
        match self.as_outbound_mut() {
            Some(event) => {
                event.suppress();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_suppressed(&self) -> bool { self.as_outbound().is_some_and(OutboundEvent::is_suppressed) }
}

#[cfg(test)]
mod tests;
