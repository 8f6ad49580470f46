//! Editable views of client-to-server lines.

use super::{
    ChatType,
    ParseError,
    inbound::{expect_command, fields, number},
};
use crate::{
    connection::ext,
    error::{ChatNetError, Result},
};

fn bounded_frequency(value: &str) -> std::result::Result<u16, ParseError> {
    let frequency: u32 = number("frequency", value)?;
    ext::check_frequency(frequency).map_err(|_| ParseError::OutOfRange {
        field: "frequency",
        value: value.to_owned(),
    })
}

/// `GO:<arena>`: join an arena. An empty arena asks for the default one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeArena {
    arena: String,
}

impl ChangeArena {
    /// Accepts `GO:<arena>` or a bare arena name without any colon.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the line has a colon but is not a `GO`
    /// command.
    pub fn parse(line: &str) -> std::result::Result<Self, ParseError> {
        if !line.contains(':') {
            return Ok(Self {
                arena: line.to_owned(),
            });
        }
        let parts = fields(line, 2)?;
        expect_command(parts[0], "GO")?;
        Ok(Self {
            arena: parts[1].to_owned(),
        })
    }

    /// # Errors
    ///
    /// Rejects names containing line terminators.
    pub fn new(arena: &str) -> Result<Self> {
        let mut event = Self {
            arena: String::new(),
        };
        event.set_arena(arena)?;
        Ok(event)
    }

    #[must_use]
    pub fn arena(&self) -> &str { &self.arena }

    /// # Errors
    ///
    /// Rejects names containing line terminators.
    pub fn set_arena(&mut self, arena: &str) -> Result<()> {
        ext::check_text("arena", arena)?;
        arena.clone_into(&mut self.arena);
        Ok(())
    }

    /// # Errors
    ///
    /// Rejects ids above [`MAX_ARENA_ID`](crate::connection::MAX_ARENA_ID).
    pub fn set_arena_id(&mut self, arena: u32) -> Result<()> {
        ext::check_arena_id(arena)?;
        self.arena = arena.to_string();
        Ok(())
    }

    #[must_use]
    pub fn to_message(&self) -> String { format!("GO:{}", self.arena) }
}

/// `CHANGEFREQ:<freq>`: switch team.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeFrequency {
    frequency: u16,
}

impl ChangeFrequency {
    /// # Errors
    ///
    /// Returns [`ParseError`] unless the line is `CHANGEFREQ:` followed by a
    /// frequency in range.
    pub fn parse(line: &str) -> std::result::Result<Self, ParseError> {
        let parts = fields(line, 2)?;
        expect_command(parts[0], "CHANGEFREQ")?;
        Ok(Self {
            frequency: bounded_frequency(parts[1])?,
        })
    }

    /// # Errors
    ///
    /// Rejects frequencies above [`MAX_FREQUENCY`](crate::connection::MAX_FREQUENCY).
    pub fn new(frequency: u32) -> Result<Self> {
        Ok(Self {
            frequency: ext::check_frequency(frequency)?,
        })
    }

    #[must_use]
    pub fn frequency(&self) -> u16 { self.frequency }

    /// # Errors
    ///
    /// Rejects frequencies above [`MAX_FREQUENCY`](crate::connection::MAX_FREQUENCY).
    pub fn set_frequency(&mut self, frequency: u32) -> Result<()> {
        self.frequency = ext::check_frequency(frequency)?;
        Ok(())
    }

    #[must_use]
    pub fn to_message(&self) -> String { format!("CHANGEFREQ:{}", self.frequency) }
}

/// `SEND:<type>:...`: an outgoing chat message.
///
/// Which of `player`, `channel`, `frequency` and `squad` are meaningful
/// depends on the chat type, mirroring the layouts accepted by
/// [`ConnectionExt`](crate::ConnectionExt).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundChatMessage {
    chat_type: ChatType,
    player: Option<String>,
    channel: Option<u32>,
    frequency: Option<u16>,
    squad: Option<String>,
    message: String,
}

impl OutboundChatMessage {
    fn empty(chat_type: ChatType) -> Self {
        Self {
            chat_type,
            player: None,
            channel: None,
            frequency: None,
            squad: None,
            message: String::new(),
        }
    }

    /// # Errors
    ///
    /// Returns [`ParseError`] if the line is not a `SEND` command or its tail
    /// does not match the layout of its chat type.
    pub fn parse(line: &str) -> std::result::Result<Self, ParseError> {
        let parts = fields(line, 3)?;
        expect_command(parts[0], "SEND")?;
        let chat_type = ChatType::from_token(parts[1]);
        let tail = parts[2];
        let mut parsed = Self::empty(chat_type);
        match chat_type {
            ChatType::Chat => {
                let (channel, message) = tail.split_once(';').ok_or(ParseError::FieldCount {
                    expected: 2,
                    found: 1,
                })?;
                let channel: u32 = number("channel", channel)?;
                if channel == 0 {
                    return Err(ParseError::OutOfRange {
                        field: "channel",
                        value: channel.to_string(),
                    });
                }
                parsed.channel = Some(channel);
                message.clone_into(&mut parsed.message);
            }
            ChatType::Command | ChatType::Public | ChatType::PublicMacro | ChatType::Moderator => {
                tail.clone_into(&mut parsed.message);
            }
            ChatType::Private | ChatType::PrivateCommand => {
                let inner = fields(tail, 2)?;
                parsed.player = Some(inner[0].to_owned());
                inner[1].clone_into(&mut parsed.message);
            }
            ChatType::Frequency => {
                let inner = fields(tail, 2)?;
                parsed.frequency = Some(bounded_frequency(inner[0])?);
                inner[1].clone_into(&mut parsed.message);
            }
            ChatType::Squad => {
                let inner = fields(tail, 2)?;
                parsed.squad = Some(inner[0].to_owned());
                inner[1].clone_into(&mut parsed.message);
            }
            ChatType::Arena | ChatType::Sysop | ChatType::Unknown => {
                return Err(ParseError::ChatType(parts[1].to_owned()));
            }
        }
        Ok(parsed)
    }

    /// Message on a channel that needs no target: `CMD`, `PUB`, `PUBM` or
    /// `MOD`.
    ///
    /// # Errors
    ///
    /// Rejects other chat types and messages containing line terminators.
    pub fn new(chat_type: ChatType, message: &str) -> Result<Self> {
        if !matches!(
            chat_type,
            ChatType::Command | ChatType::Public | ChatType::PublicMacro | ChatType::Moderator
        ) {
            return Err(ChatNetError::invalid("chat_type", "requires a target"));
        }
        let mut event = Self::empty(chat_type);
        event.set_message(message)?;
        Ok(event)
    }

    /// `PRIV` or `PRIVCMD` message to `player`.
    ///
    /// # Errors
    ///
    /// Rejects other chat types, empty player names and line terminators.
    pub fn to_player(chat_type: ChatType, player: &str, message: &str) -> Result<Self> {
        if !matches!(chat_type, ChatType::Private | ChatType::PrivateCommand) {
            return Err(ChatNetError::invalid("chat_type", "is not a private chat type"));
        }
        let mut event = Self::empty(chat_type);
        event.set_player(player)?;
        event.set_message(message)?;
        Ok(event)
    }

    /// # Errors
    ///
    /// Rejects an empty squad name and line terminators.
    pub fn to_squad(squad: &str, message: &str) -> Result<Self> {
        let mut event = Self::empty(ChatType::Squad);
        event.set_squad(squad)?;
        event.set_message(message)?;
        Ok(event)
    }

    /// # Errors
    ///
    /// Rejects channel 0 and line terminators.
    pub fn to_channel(channel: u32, message: &str) -> Result<Self> {
        let mut event = Self::empty(ChatType::Chat);
        event.set_channel(channel)?;
        event.set_message(message)?;
        Ok(event)
    }

    /// # Errors
    ///
    /// Rejects frequencies above [`MAX_FREQUENCY`](crate::connection::MAX_FREQUENCY) and line terminators.
    pub fn to_frequency(frequency: u32, message: &str) -> Result<Self> {
        let mut event = Self::empty(ChatType::Frequency);
        event.set_frequency(frequency)?;
        event.set_message(message)?;
        Ok(event)
    }

    #[must_use]
    pub fn chat_type(&self) -> ChatType { self.chat_type }

    #[must_use]
    pub fn player(&self) -> Option<&str> { self.player.as_deref() }

    #[must_use]
    pub fn channel(&self) -> Option<u32> { self.channel }

    #[must_use]
    pub fn frequency(&self) -> Option<u16> { self.frequency }

    #[must_use]
    pub fn squad(&self) -> Option<&str> { self.squad.as_deref() }

    #[must_use]
    pub fn message(&self) -> &str { &self.message }

    /// # Errors
    ///
    /// Rejects chat types a client cannot send on.
    pub fn set_chat_type(&mut self, chat_type: ChatType) -> Result<()> {
        if !chat_type.is_sendable() {
            return Err(ChatNetError::invalid("chat_type", "cannot be sent by a client"));
        }
        self.chat_type = chat_type;
        Ok(())
    }

    /// # Errors
    ///
    /// Rejects empty names, colons and line terminators.
    pub fn set_player(&mut self, player: &str) -> Result<()> {
        ext::check_name("player", player)?;
        self.player = Some(player.to_owned());
        Ok(())
    }

    /// # Errors
    ///
    /// Rejects line terminators.
    pub fn set_message(&mut self, message: &str) -> Result<()> {
        ext::check_text("message", message)?;
        message.clone_into(&mut self.message);
        Ok(())
    }

    /// # Errors
    ///
    /// Rejects channel 0.
    pub fn set_channel(&mut self, channel: u32) -> Result<()> {
        ext::check_channel(channel)?;
        self.channel = Some(channel);
        Ok(())
    }

    /// # Errors
    ///
    /// Rejects frequencies above [`MAX_FREQUENCY`](crate::connection::MAX_FREQUENCY).
    pub fn set_frequency(&mut self, frequency: u32) -> Result<()> {
        self.frequency = Some(ext::check_frequency(frequency)?);
        Ok(())
    }

    /// # Errors
    ///
    /// Rejects empty names, colons and line terminators.
    pub fn set_squad(&mut self, squad: &str) -> Result<()> {
        ext::check_name("squad", squad)?;
        self.squad = Some(squad.to_owned());
        Ok(())
    }

    /// Render the `SEND` line for the current fields.
    #[must_use]
    pub fn to_message(&self) -> String {
        let chat_type = self.chat_type;
        let message = &self.message;
        match chat_type {
            ChatType::Chat => format!("SEND:CHAT:{};{message}", self.channel.unwrap_or(1)),
            ChatType::Private | ChatType::PrivateCommand => format!(
                "SEND:{chat_type}:{}:{message}",
                self.player.as_deref().unwrap_or_default()
            ),
            ChatType::Frequency => {
                format!("SEND:FREQ:{}:{message}", self.frequency.unwrap_or_default())
            }
            ChatType::Squad => format!(
                "SEND:SQUAD:{}:{message}",
                self.squad.as_deref().unwrap_or_default()
            ),
            _ => format!("SEND:{chat_type}:{message}"),
        }
    }
}
