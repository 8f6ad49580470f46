//! Parsers for server-to-client lines.
//!
//! Each parser checks the command token, the exact field count and every
//! numeric field. The last field of a layout keeps any further colons.

use std::str::FromStr;

use super::{ChatType, ParseError, Ship};

pub(super) fn fields(line: &str, expected: usize) -> Result<Vec<&str>, ParseError> {
    let parts: Vec<&str> = line.splitn(expected, ':').collect();
    if parts.len() == expected {
        Ok(parts)
    } else {
        Err(ParseError::FieldCount {
            expected,
            found: parts.len(),
        })
    }
}

pub(super) fn expect_command(found: &str, expected: &'static str) -> Result<(), ParseError> {
    if found.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(ParseError::Command {
            expected,
            found: found.to_owned(),
        })
    }
}

pub(super) fn number<T: FromStr>(field: &'static str, value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::NotANumber {
        field,
        value: value.to_owned(),
    })
}

fn ship(value: &str) -> Result<Ship, ParseError> {
    Ship::from_number(number("ship", value)?).ok_or_else(|| ParseError::OutOfRange {
        field: "ship",
        value: value.to_owned(),
    })
}

/// `INARENA:<arena>:<freq>`: this client entered an arena.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnteredArena {
    arena: String,
    frequency: u16,
}

impl EnteredArena {
    /// # Errors
    ///
    /// Returns [`ParseError`] if `line` does not have the `INARENA` layout.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let parts = fields(line, 3)?;
        expect_command(parts[0], "INARENA")?;
        Ok(Self {
            arena: parts[1].to_owned(),
            frequency: number("frequency", parts[2])?,
        })
    }

    #[must_use]
    pub fn arena(&self) -> &str { &self.arena }

    #[must_use]
    pub fn frequency(&self) -> u16 { self.frequency }
}

/// `LOGINOK:<username>` or `LOGINBAD:<reason>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginResponse {
    accepted: bool,
    detail: String,
}

impl LoginResponse {
    /// Any token starting with `LOGIN` (in any case) parses; only the exact
    /// token `LOGINOK` counts as accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if `line` is not a login response.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let parts = fields(line, 2)?;
        let token = parts[0];
        if !token.to_ascii_uppercase().starts_with("LOGIN") {
            return Err(ParseError::Command {
                expected: "LOGINOK or LOGINBAD",
                found: token.to_owned(),
            });
        }
        Ok(Self {
            accepted: token == "LOGINOK",
            detail: parts[1].to_owned(),
        })
    }

    #[must_use]
    pub fn accepted(&self) -> bool { self.accepted }

    /// Name the server assigned, present only when accepted.
    #[must_use]
    pub fn username(&self) -> Option<&str> { self.accepted.then_some(self.detail.as_str()) }

    /// Server's reason for rejecting the login, present only when rejected.
    #[must_use]
    pub fn response(&self) -> Option<&str> { (!self.accepted).then_some(self.detail.as_str()) }
}

/// `KILL:<killer>:<killed>:<bounty>:<flags>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerDeath {
    killer: String,
    killed: String,
    bounty: u32,
    flags: u32,
}

impl PlayerDeath {
    /// # Errors
    ///
    /// Returns [`ParseError`] if `line` does not have the `KILL` layout.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let parts = fields(line, 5)?;
        expect_command(parts[0], "KILL")?;
        Ok(Self {
            killer: parts[1].to_owned(),
            killed: parts[2].to_owned(),
            bounty: number("bounty", parts[3])?,
            flags: number("flags", parts[4])?,
        })
    }

    #[must_use]
    pub fn killer(&self) -> &str { &self.killer }

    #[must_use]
    pub fn killed(&self) -> &str { &self.killed }

    #[must_use]
    pub fn bounty(&self) -> u32 { self.bounty }

    #[must_use]
    pub fn flags_carried(&self) -> u32 { self.flags }
}

/// `PLAYER:<name>:<ship>:<freq>` (arena listing) or `ENTERING:...`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerEntered {
    name: String,
    ship: Ship,
    frequency: u16,
}

impl PlayerEntered {
    /// # Errors
    ///
    /// Returns [`ParseError`] if `line` does not have the `PLAYER` or
    /// `ENTERING` layout.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let parts = fields(line, 4)?;
        if !parts[0].eq_ignore_ascii_case("PLAYER") && !parts[0].eq_ignore_ascii_case("ENTERING") {
            return Err(ParseError::Command {
                expected: "PLAYER or ENTERING",
                found: parts[0].to_owned(),
            });
        }
        Ok(Self {
            name: parts[1].to_owned(),
            ship: ship(parts[2])?,
            frequency: number("frequency", parts[3])?,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    #[must_use]
    pub fn ship(&self) -> Ship { self.ship }

    #[must_use]
    pub fn frequency(&self) -> u16 { self.frequency }
}

/// `LEAVING:<name>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerLeft {
    name: String,
}

impl PlayerLeft {
    /// # Errors
    ///
    /// Returns [`ParseError`] if `line` does not have the `LEAVING` layout.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let parts = fields(line, 2)?;
        expect_command(parts[0], "LEAVING")?;
        Ok(Self {
            name: parts[1].to_owned(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }
}

/// `SHIPFREQCHANGE:<name>:<ship>:<freq>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerUpdate {
    name: String,
    ship: Ship,
    frequency: u16,
}

impl PlayerUpdate {
    /// # Errors
    ///
    /// Returns [`ParseError`] if `line` does not have the `SHIPFREQCHANGE`
    /// layout.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let parts = fields(line, 4)?;
        expect_command(parts[0], "SHIPFREQCHANGE")?;
        Ok(Self {
            name: parts[1].to_owned(),
            ship: ship(parts[2])?,
            frequency: number("frequency", parts[3])?,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    #[must_use]
    pub fn ship(&self) -> Ship { self.ship }

    #[must_use]
    pub fn frequency(&self) -> u16 { self.frequency }
}

/// `MSG:<type>:...` with a type-specific tail:
///
/// | type | tail |
/// |---|---|
/// | `ARENA`, `CMD`, `SYSOP` | `<msg>` |
/// | `PUB`, `PUBM`, `PRIV`, `FREQ`, `MOD` | `<player>:<msg>` |
/// | `CHAT` | `<channel>:<msg>` |
/// | `SQUAD` | `<squad>:<sender>:<msg>` |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundChatMessage {
    chat_type: ChatType,
    player: Option<String>,
    channel: Option<u32>,
    squad: Option<String>,
    message: String,
}

impl InboundChatMessage {
    /// # Errors
    ///
    /// Returns [`ParseError`] if `line` is not a chat message or its tail
    /// does not match the layout of its chat type.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let parts = fields(line, 3)?;
        expect_command(parts[0], "MSG")?;
        let chat_type = ChatType::from_token(parts[1]);
        let tail = parts[2];
        let mut parsed = Self {
            chat_type,
            player: None,
            channel: None,
            squad: None,
            message: String::new(),
        };
        match chat_type {
            ChatType::Arena | ChatType::Command | ChatType::Sysop => {
                parsed.message = tail.to_owned();
            }
            ChatType::Public
            | ChatType::PublicMacro
            | ChatType::Private
            | ChatType::Frequency
            | ChatType::Moderator => {
                let inner = fields(tail, 2)?;
                parsed.player = Some(inner[0].to_owned());
                parsed.message = inner[1].to_owned();
            }
            ChatType::Chat => {
                let inner = fields(tail, 2)?;
                parsed.channel = Some(number("channel", inner[0])?);
                parsed.message = inner[1].to_owned();
            }
            ChatType::Squad => {
                let inner = fields(tail, 3)?;
                parsed.squad = Some(inner[0].to_owned());
                parsed.player = Some(inner[1].to_owned());
                parsed.message = inner[2].to_owned();
            }
            ChatType::PrivateCommand | ChatType::Unknown => {
                return Err(ParseError::ChatType(parts[1].to_owned()));
            }
        }
        Ok(parsed)
    }

    #[must_use]
    pub fn chat_type(&self) -> ChatType { self.chat_type }

    /// Sender, for player-originated types.
    #[must_use]
    pub fn player(&self) -> Option<&str> { self.player.as_deref() }

    #[must_use]
    pub fn channel(&self) -> Option<u32> { self.channel }

    #[must_use]
    pub fn squad(&self) -> Option<&str> { self.squad.as_deref() }

    #[must_use]
    pub fn message(&self) -> &str { &self.message }
}
