//! Convenience senders for the ChatNet command vocabulary.

use std::net::ToSocketAddrs;

use tracing::warn;

use super::Connection;
use crate::error::{ChatNetError, Result};

/// Client name reported in the login line.
pub const CLIENT_NAME: &str = "chatnet";
/// Highest numeric arena the server accepts.
pub const MAX_ARENA_ID: u32 = 255;
/// Highest frequency (team) number.
pub const MAX_FREQUENCY: u32 = 9999;

const LOGIN_PROTOCOL_VERSION: u32 = 1;

/// Reject values that would break line framing.
pub(crate) fn check_text(name: &'static str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(ChatNetError::invalid(name, "must not contain line terminators"));
    }
    Ok(())
}

/// Player and squad names end at the next `:` on the wire.
pub(crate) fn check_name(name: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ChatNetError::invalid(name, "must not be empty"));
    }
    check_text(name, value)?;
    if value.contains(':') {
        return Err(ChatNetError::invalid(name, "must not contain ':'"));
    }
    Ok(())
}

pub(crate) fn check_arena_id(arena: u32) -> Result<()> {
    if arena > MAX_ARENA_ID {
        return Err(ChatNetError::invalid("arena", "must be between 0 and 255"));
    }
    Ok(())
}

pub(crate) fn check_frequency(frequency: u32) -> Result<u16> {
    match u16::try_from(frequency) {
        Ok(value) if frequency <= MAX_FREQUENCY => Ok(value),
        _ => Err(ChatNetError::invalid("frequency", "must be between 0 and 9999")),
    }
}

pub(crate) fn check_channel(channel: u32) -> Result<()> {
    if channel == 0 {
        return Err(ChatNetError::invalid("channel", "must be at least 1"));
    }
    Ok(())
}

/// Protocol helpers available on every [`Connection`].
///
/// Each sender validates its arguments, formats one protocol line and hands
/// it to [`Connection::send_line`]. The boolean result is that of
/// `send_line`.
///
/// # Errors
///
/// Every sender returns
/// [`ChatNetError::InvalidArgument`](crate::ChatNetError::InvalidArgument)
/// for out-of-range numbers, empty or `:`-bearing player and squad names,
/// and text containing a line terminator. Empty message text is sent as is.
pub trait ConnectionExt: Connection {
    /// Resolve `host` and connect to its first address.
    ///
    /// An unresolvable host is a failed attempt, not an error.
    ///
    /// # Errors
    ///
    /// Propagates [`Connection::connect`] errors.
    fn connect_host(&self, host: &str, port: u16) -> Result<bool> {
        let address = match (host, port).to_socket_addrs() {
            Ok(mut addresses) => addresses.next(),
            Err(error) => {
                warn!(host, port, %error, "failed to resolve host");
                None
            }
        };
        match address {
            Some(address) => self.connect(address),
            None => Ok(false),
        }
    }

    /// Send the login line for `username`.
    fn login(&self, username: &str, password: &str) -> Result<bool> {
        check_name("username", username)?;
        check_text("password", password)?;
        let version = env!("CARGO_PKG_VERSION");
        Ok(self.send_line(&format!(
            "LOGIN:{LOGIN_PROTOCOL_VERSION};{CLIENT_NAME} v{version}:{username}:{password}"
        )))
    }

    /// Join the server's default arena.
    fn change_arena_default(&self) -> bool { self.send_line("GO:") }

    fn change_arena_id(&self, arena: u32) -> Result<bool> {
        check_arena_id(arena)?;
        Ok(self.send_line(&format!("GO:{arena}")))
    }

    /// An empty name sends `GO:`, the same as
    /// [`change_arena_default`](Self::change_arena_default).
    fn change_arena(&self, arena: &str) -> Result<bool> {
        check_text("arena", arena)?;
        Ok(self.send_line(&format!("GO:{arena}")))
    }

    fn change_frequency(&self, frequency: u32) -> Result<bool> {
        let frequency = check_frequency(frequency)?;
        Ok(self.send_line(&format!("CHANGEFREQ:{frequency}")))
    }

    fn send_public_message(&self, message: &str) -> Result<bool> {
        check_text("message", message)?;
        Ok(self.send_line(&format!("SEND:PUB:{message}")))
    }

    fn send_public_macro(&self, message: &str) -> Result<bool> {
        check_text("message", message)?;
        Ok(self.send_line(&format!("SEND:PUBM:{message}")))
    }

    fn send_public_command(&self, command: &str) -> Result<bool> {
        check_text("command", command)?;
        Ok(self.send_line(&format!("SEND:CMD:{command}")))
    }

    fn send_private_message(&self, player: &str, message: &str) -> Result<bool> {
        check_name("player", player)?;
        check_text("message", message)?;
        Ok(self.send_line(&format!("SEND:PRIV:{player}:{message}")))
    }

    fn send_private_command(&self, player: &str, command: &str) -> Result<bool> {
        check_name("player", player)?;
        check_text("command", command)?;
        Ok(self.send_line(&format!("SEND:PRIVCMD:{player}:{command}")))
    }

    fn send_frequency_message(&self, frequency: u32, message: &str) -> Result<bool> {
        let frequency = check_frequency(frequency)?;
        check_text("message", message)?;
        Ok(self.send_line(&format!("SEND:FREQ:{frequency}:{message}")))
    }

    /// Send to a numbered chat channel. Channel numbering starts at 1.
    fn send_chat_message(&self, channel: u32, message: &str) -> Result<bool> {
        check_channel(channel)?;
        check_text("message", message)?;
        Ok(self.send_line(&format!("SEND:CHAT:{channel};{message}")))
    }

    fn send_staff_message(&self, message: &str) -> Result<bool> {
        check_text("message", message)?;
        Ok(self.send_line(&format!("SEND:MOD:{message}")))
    }

    fn send_squad_message(&self, squad: &str, message: &str) -> Result<bool> {
        check_name("squad", squad)?;
        check_text("message", message)?;
        Ok(self.send_line(&format!("SEND:SQUAD:{squad}:{message}")))
    }

    /// Keep-alive.
    fn send_noop(&self) -> bool { self.send_line("NOOP") }
}

impl<C: Connection + ?Sized> ConnectionExt for C {}
