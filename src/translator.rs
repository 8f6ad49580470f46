//! Maps protocol command tokens to typed event factories.
//!
//! The token is the text before the first `:` of a line (the whole line if it
//! has no colon), compared case-insensitively. The registry is shared and may
//! be changed while other threads translate.

use std::{fmt, sync::Arc};

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use crate::{
    connection::Connection,
    error::{ChatNetError, Result},
    event::{
        ChangeArena,
        ChangeFrequency,
        EnteredArena,
        Event,
        EventKind,
        Inbound,
        InboundChatMessage,
        InboundEvent,
        LoginResponse,
        Outbound,
        OutboundChatMessage,
        OutboundEvent,
        ParseError,
        PlayerDeath,
        PlayerEntered,
        PlayerLeft,
        PlayerUpdate,
    },
};

/// Builds an event from the connection and the raw line.
pub type EventFactory =
    Arc<dyn Fn(&Arc<dyn Connection>, &str) -> std::result::Result<Event, ParseError> + Send + Sync>;

/// Why [`MessageTranslator::try_translate`] produced no event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("no translation registered for {0:?}")]
    Unregistered(String),
    #[error("malformed {command} line: {source}")]
    Malformed {
        command: String,
        #[source]
        source: ParseError,
    },
}

#[derive(Clone)]
struct Translation {
    kind: EventKind,
    factory: EventFactory,
}

/// Extract the command token of `line`.
#[must_use]
pub fn command_token(line: &str) -> &str { line.split_once(':').map_or(line, |(token, _)| token) }

fn inbound<P>(parse: P) -> impl Fn(&Arc<dyn Connection>, &str) -> std::result::Result<Event, ParseError>
where
    P: Fn(&str) -> std::result::Result<Inbound, ParseError>,
{
    move |connection: &Arc<dyn Connection>, line: &str| {
        let detail = parse(line)?;
        Ok(Event::Inbound(InboundEvent::new(
            Arc::clone(connection),
            line,
            detail,
        )))
    }
}

fn outbound<P>(parse: P) -> impl Fn(&Arc<dyn Connection>, &str) -> std::result::Result<Event, ParseError>
where
    P: Fn(&str) -> std::result::Result<Outbound, ParseError>,
{
    move |connection: &Arc<dyn Connection>, line: &str| {
        let detail = parse(line)?;
        Ok(Event::Outbound(OutboundEvent::new(
            Arc::clone(connection),
            detail,
        )))
    }
}

/// Registry of command translations.
pub struct MessageTranslator {
    translations: DashMap<String, Translation>,
}

impl Default for MessageTranslator {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for MessageTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageTranslator")
            .field("commands", &self.commands())
            .finish()
    }
}

impl MessageTranslator {
    /// Translator preloaded with every built-in event.
    #[must_use]
    pub fn new() -> Self {
        let translator = Self::empty();
        translator.install(
            "LOGINOK",
            EventKind::LoginResponse,
            inbound(|line| LoginResponse::parse(line).map(Inbound::LoginResponse)),
        );
        translator.install(
            "LOGINBAD",
            EventKind::LoginResponse,
            inbound(|line| LoginResponse::parse(line).map(Inbound::LoginResponse)),
        );
        translator.install(
            "INARENA",
            EventKind::EnteredArena,
            inbound(|line| EnteredArena::parse(line).map(Inbound::EnteredArena)),
        );
        for command in ["PLAYER", "ENTERING"] {
            translator.install(
                command,
                EventKind::PlayerEntered,
                inbound(|line| PlayerEntered::parse(line).map(Inbound::PlayerEntered)),
            );
        }
        translator.install(
            "LEAVING",
            EventKind::PlayerLeft,
            inbound(|line| PlayerLeft::parse(line).map(Inbound::PlayerLeft)),
        );
        translator.install(
            "SHIPFREQCHANGE",
            EventKind::PlayerUpdate,
            inbound(|line| PlayerUpdate::parse(line).map(Inbound::PlayerUpdate)),
        );
        translator.install(
            "KILL",
            EventKind::PlayerDeath,
            inbound(|line| PlayerDeath::parse(line).map(Inbound::PlayerDeath)),
        );
        translator.install(
            "MSG",
            EventKind::InboundChat,
            inbound(|line| InboundChatMessage::parse(line).map(Inbound::Chat)),
        );
        translator.install(
            "GO",
            EventKind::ChangeArena,
            outbound(|line| ChangeArena::parse(line).map(Outbound::ChangeArena)),
        );
        translator.install(
            "CHANGEFREQ",
            EventKind::ChangeFrequency,
            outbound(|line| ChangeFrequency::parse(line).map(Outbound::ChangeFrequency)),
        );
        translator.install(
            "SEND",
            EventKind::OutboundChat,
            outbound(|line| OutboundChatMessage::parse(line).map(Outbound::Chat)),
        );
        translator
    }

    /// Translator with no translations.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            translations: DashMap::new(),
        }
    }

    fn install<F>(&self, command: &str, kind: EventKind, factory: F) -> Option<EventKind>
    where
        F: Fn(&Arc<dyn Connection>, &str) -> std::result::Result<Event, ParseError> + Send + Sync + 'static,
    {
        self.translations
            .insert(
                command.to_ascii_uppercase(),
                Translation {
                    kind,
                    factory: Arc::new(factory),
                },
            )
            .map(|previous| previous.kind)
    }

    /// Register or replace the translation for `command`.
    ///
    /// Returns the kind previously registered for the command, if any.
    ///
    /// # Errors
    ///
    /// Rejects an empty command or one containing `:`.
    pub fn register_translation<F>(&self, command: &str, kind: EventKind, factory: F) -> Result<Option<EventKind>>
    where
        F: Fn(&Arc<dyn Connection>, &str) -> std::result::Result<Event, ParseError> + Send + Sync + 'static,
    {
        if command.is_empty() || command.contains(':') {
            return Err(ChatNetError::invalid("command", "must be a non-empty token without ':'"));
        }
        Ok(self.install(command, kind, factory))
    }

    /// Returns `false` if no translation was registered for `command`.
    pub fn remove_translation(&self, command: &str) -> bool {
        self.translations
            .remove(&command.to_ascii_uppercase())
            .is_some()
    }

    /// Kind produced for `command`, if registered.
    #[must_use]
    pub fn event_kind(&self, command: &str) -> Option<EventKind> {
        self.translations
            .get(&command.to_ascii_uppercase())
            .map(|entry| entry.kind)
    }

    /// Registered command tokens, sorted.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        let mut commands: Vec<String> = self
            .translations
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        commands.sort_unstable();
        commands
    }

    /// Translate `line`, reporting why no event was produced.
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError::Unregistered`] for unknown commands and
    /// [`TranslateError::Malformed`] when the line does not fit its command's
    /// layout.
    pub fn try_translate(
        &self,
        connection: &Arc<dyn Connection>,
        line: &str,
    ) -> std::result::Result<Event, TranslateError> {
        let command = command_token(line).to_ascii_uppercase();
        // Clone out of the map so factories may touch the registry.
        let translation = self
            .translations
            .get(&command)
            .map(|entry| entry.value().clone());
        let Some(translation) = translation else {
            return Err(TranslateError::Unregistered(command));
        };
        (translation.factory)(connection, line)
            .map_err(|source| TranslateError::Malformed { command, source })
    }

    /// Translate `line`, or `None` if it is unregistered or malformed.
    #[must_use]
    pub fn translate(&self, connection: &Arc<dyn Connection>, line: &str) -> Option<Event> {
        match self.try_translate(connection, line) {
            Ok(event) => Some(event),
            Err(TranslateError::Unregistered(_)) => None,
            Err(error) => {
                debug!(%error, line, "line did not translate");
                None
            }
        }
    }
}
