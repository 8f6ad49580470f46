//! Chat channel and ship vocabularies.

use std::fmt;

/// Channel a chat message travels on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChatType {
    Arena,
    Chat,
    Command,
    Frequency,
    Moderator,
    Public,
    PublicMacro,
    Private,
    PrivateCommand,
    Squad,
    Sysop,
    Unknown,
}

impl ChatType {
    /// Map a wire token to a chat type. Tokens are case-sensitive; anything
    /// unrecognised maps to [`ChatType::Unknown`].
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        match token {
            "ARENA" => Self::Arena,
            "CHAT" => Self::Chat,
            "CMD" => Self::Command,
            "FREQ" => Self::Frequency,
            "MOD" => Self::Moderator,
            "PUB" => Self::Public,
            "PUBM" => Self::PublicMacro,
            "PRIV" => Self::Private,
            "PRIVCMD" => Self::PrivateCommand,
            "SQUAD" => Self::Squad,
            "SYSOP" => Self::Sysop,
            _ => Self::Unknown,
        }
    }

    /// Wire token, or `None` for [`ChatType::Unknown`].
    #[must_use]
    pub const fn token(self) -> Option<&'static str> {
        Some(match self {
            Self::Arena => "ARENA",
            Self::Chat => "CHAT",
            Self::Command => "CMD",
            Self::Frequency => "FREQ",
            Self::Moderator => "MOD",
            Self::Public => "PUB",
            Self::PublicMacro => "PUBM",
            Self::Private => "PRIV",
            Self::PrivateCommand => "PRIVCMD",
            Self::Squad => "SQUAD",
            Self::Sysop => "SYSOP",
            Self::Unknown => return None,
        })
    }

    /// Whether a client may send on this channel.
    #[must_use]
    pub const fn is_sendable(self) -> bool {
        matches!(
            self,
            Self::Chat
                | Self::Command
                | Self::Frequency
                | Self::Moderator
                | Self::Public
                | Self::PublicMacro
                | Self::Private
                | Self::PrivateCommand
                | Self::Squad
        )
    }
}

impl fmt::Display for ChatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.token().unwrap_or("UNKNOWN")) }
}

/// Vessel a player occupies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Ship {
    Warbird,
    Javelin,
    Spider,
    Leviathan,
    Terrier,
    Weasel,
    Lancaster,
    Shark,
    #[default]
    Spectator,
    /// Reported by the server but not a known ship.
    Unknown,
}

impl Ship {
    /// Map the wire number. Returns `None` outside `0..=9`.
    #[must_use]
    pub const fn from_number(number: u8) -> Option<Self> {
        Some(match number {
            0 => Self::Warbird,
            1 => Self::Javelin,
            2 => Self::Spider,
            3 => Self::Leviathan,
            4 => Self::Terrier,
            5 => Self::Weasel,
            6 => Self::Lancaster,
            7 => Self::Shark,
            8 => Self::Spectator,
            9 => Self::Unknown,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Warbird => 0,
            Self::Javelin => 1,
            Self::Spider => 2,
            Self::Leviathan => 3,
            Self::Terrier => 4,
            Self::Weasel => 5,
            Self::Lancaster => 6,
            Self::Shark => 7,
            Self::Spectator => 8,
            Self::Unknown => 9,
        }
    }

    #[must_use]
    pub const fn is_playing(self) -> bool { self.number() < 8 }
}
