//! Chat command routing.
//!
//! [`CommandRouter`] watches inbound chat for messages such as `!help topic`
//! and calls the handlers registered for the command name.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, RwLock},
};

use regex::Regex;
use tracing::{debug, trace};

use crate::{
    connection::{Connection, ConnectionExt},
    dispatch::EventHandler,
    error::{ChatNetError, Result},
    event::{ChatType, Event, EventKind, Inbound},
};

/// Pattern recognising `!command [arguments]`.
pub const DEFAULT_COMMAND_PATTERN: &str = r"^!(\w+?)(?:\s+(.+))?$";

static DEFAULT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_COMMAND_PATTERN).expect("default command pattern compiles"));

/// A recognised command and where it came from.
#[derive(Clone, Copy)]
pub struct CommandContext<'a> {
    connection: &'a Arc<dyn Connection>,
    chat_type: ChatType,
    sender: &'a str,
    command: &'a str,
    arguments: Option<&'a str>,
}

impl fmt::Debug for CommandContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("connection", &self.connection.id())
            .field("chat_type", &self.chat_type)
            .field("sender", &self.sender)
            .field("command", &self.command)
            .field("arguments", &self.arguments)
            .finish()
    }
}

impl<'a> CommandContext<'a> {
    #[must_use]
    pub fn connection(&self) -> &'a Arc<dyn Connection> { self.connection }

    /// Chat the command arrived on.
    #[must_use]
    pub fn chat_type(&self) -> ChatType { self.chat_type }

    #[must_use]
    pub fn sender(&self) -> &'a str { self.sender }

    /// Command name, lower-cased.
    #[must_use]
    pub fn command(&self) -> &'a str { self.command }

    #[must_use]
    pub fn arguments(&self) -> Option<&'a str> { self.arguments }

    /// Answer the sender privately.
    ///
    /// # Errors
    ///
    /// Returns [`ChatNetError::InvalidArgument`] if `message` spans lines.
    pub fn reply(&self, message: &str) -> Result<bool> { self.connection.send_private_message(self.sender, message) }
}

/// Receiver of routed commands.
pub trait CommandHandler: Send + Sync {
    fn handle_command(&self, context: &CommandContext<'_>);
}

impl<F> CommandHandler for F
where
    F: Fn(&CommandContext<'_>) + Send + Sync,
{
    fn handle_command(&self, context: &CommandContext<'_>) { self(context); }
}

/// Routes chat commands to handlers. Register it for
/// [`EventKind::InboundChat`].
///
/// Commands are accepted from public, public macro, private, frequency,
/// moderator and squad chat.
pub struct CommandRouter {
    pattern: RwLock<Regex>,
    handlers: Mutex<HashMap<String, Vec<Arc<dyn CommandHandler>>>>,
}

impl Default for CommandRouter {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRouter")
            .field("pattern", &self.pattern().as_str())
            .field("commands", &self.commands())
            .finish()
    }
}

fn validate(pattern: &str) -> Result<Regex> {
    let regex = Regex::new(pattern)?;
    if regex.captures_len() < 3 {
        return Err(ChatNetError::invalid(
            "pattern",
            "must capture the command name and its arguments",
        ));
    }
    Ok(regex)
}

impl CommandRouter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pattern: RwLock::new(DEFAULT_PATTERN.clone()),
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Router using a custom command pattern.
    ///
    /// # Errors
    ///
    /// See [`set_pattern`](Self::set_pattern).
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let router = Self::new();
        router.set_pattern(pattern)?;
        Ok(router)
    }

    /// Replace the command pattern. Group 1 captures the command name and
    /// group 2 the optional arguments; the pattern must match the whole
    /// message.
    ///
    /// # Errors
    ///
    /// Returns [`ChatNetError::InvalidPattern`] if the pattern does not
    /// compile and [`ChatNetError::InvalidArgument`] if it has fewer than two
    /// capture groups.
    pub fn set_pattern(&self, pattern: &str) -> Result<()> {
        let regex = validate(pattern)?;
        *self.pattern.write().unwrap_or_else(PoisonError::into_inner) = regex;
        Ok(())
    }

    #[must_use]
    pub fn pattern(&self) -> Regex { self.pattern.read().unwrap_or_else(PoisonError::into_inner).clone() }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Vec<Arc<dyn CommandHandler>>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` for `command`. Returns `false` if it was already
    /// registered for that command.
    pub fn register_command(&self, command: &str, handler: Arc<dyn CommandHandler>) -> bool {
        let mut table = self.table();
        let handlers = table.entry(command.to_lowercase()).or_default();
        if handlers.iter().any(|existing| Arc::ptr_eq(existing, &handler)) {
            return false;
        }
        handlers.push(handler);
        true
    }

    pub fn remove_command(&self, command: &str, handler: &Arc<dyn CommandHandler>) -> bool {
        let key = command.to_lowercase();
        let mut table = self.table();
        let Some(handlers) = table.get_mut(&key) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|existing| !Arc::ptr_eq(existing, handler));
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            table.remove(&key);
        }
        removed
    }

    /// Registered command names, sorted.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        let mut commands: Vec<_> = self.table().keys().cloned().collect();
        commands.sort_unstable();
        commands
    }

    /// Handlers registered for `command`, in registration order.
    #[must_use]
    pub fn handlers(&self, command: &str) -> Vec<Arc<dyn CommandHandler>> {
        self.table()
            .get(&command.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Route `message` from `sender`. Returns how many handlers ran.
    pub fn route(&self, connection: &Arc<dyn Connection>, chat_type: ChatType, sender: &str, message: &str) -> usize {
        let pattern = self.pattern();
        let Some(captures) = pattern.captures(message) else {
            return 0;
        };
        let whole = captures.get(0).is_some_and(|found| found.start() == 0 && found.end() == message.len());
        let Some(name) = captures.get(1).filter(|_| whole) else {
            return 0;
        };
        let command = name.as_str().to_lowercase();
        let handlers = self.handlers(&command);
        if handlers.is_empty() {
            trace!(command, sender, "no handler for command");
            return 0;
        }
        let context = CommandContext {
            connection,
            chat_type,
            sender,
            command: &command,
            arguments: captures.get(2).map(|arguments| arguments.as_str()),
        };
        debug!(command, sender, %chat_type, "routing command");
        for handler in &handlers {
            handler.handle_command(&context);
        }
        handlers.len()
    }
}

impl EventHandler for CommandRouter {
    fn accepts(&self, kind: EventKind) -> bool { kind == EventKind::InboundChat }

    fn handle_event(&self, _kind: EventKind, event: &mut Event) {
        let Some(inbound) = event.as_inbound() else {
            return;
        };
        let Inbound::Chat(chat) = inbound.detail() else {
            return;
        };
        let accepted = matches!(
            chat.chat_type(),
            ChatType::Public
                | ChatType::PublicMacro
                | ChatType::Private
                | ChatType::Frequency
                | ChatType::Moderator
                | ChatType::Squad
        );
        if let (true, Some(sender)) = (accepted, chat.player()) {
            self.route(inbound.connection(), chat.chat_type(), sender, chat.message());
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::connection::TcpConnection;

    fn connection() -> Arc<dyn Connection> { Arc::new(TcpConnection::default()) }

    fn recorder(calls: &Arc<Mutex<Vec<(String, Option<String>)>>>) -> Arc<dyn CommandHandler> {
        let calls = Arc::clone(calls);
        Arc::new(move |context: &CommandContext<'_>| {
            calls
                .lock()
                .expect("calls lock")
                .push((context.command().to_owned(), context.arguments().map(str::to_owned)));
        })
    }

    #[rstest]
    #[case("!help", Some(("help", None)))]
    #[case("!HELP topics here", Some(("help", Some("topics here"))))]
    #[case("!help    spaced", Some(("help", Some("spaced"))))]
    #[case("help", None)]
    #[case("! help", None)]
    #[case("!other", None)]
    fn routes_matching_messages(#[case] message: &str, #[case] expected: Option<(&str, Option<&str>)>) {
        let router = CommandRouter::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        assert!(router.register_command("Help", recorder(&calls)));

        let routed = router.route(&connection(), ChatType::Private, "Alice", message);
        let calls = calls.lock().expect("calls lock");
        match expected {
            Some((command, arguments)) => {
                assert_eq!(routed, 1);
                assert_eq!(calls[0], (command.to_owned(), arguments.map(str::to_owned)));
            }
            None => {
                assert_eq!(routed, 0);
                assert!(calls.is_empty());
            }
        }
    }

    #[test]
    fn registration_is_idempotent() {
        let router = CommandRouter::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let handler = recorder(&calls);
        assert!(router.register_command("about", Arc::clone(&handler)));
        assert!(!router.register_command("ABOUT", Arc::clone(&handler)));
        assert_eq!(router.commands(), vec!["about".to_owned()]);
        assert_eq!(router.handlers("about").len(), 1);

        assert!(router.remove_command("about", &handler));
        assert!(!router.remove_command("about", &handler));
        assert!(router.commands().is_empty());
    }

    #[test]
    fn patterns_need_two_groups() {
        let router = CommandRouter::new();
        assert!(matches!(router.set_pattern("("), Err(ChatNetError::InvalidPattern(_))));
        assert!(matches!(router.set_pattern("^!(\\w+)$"), Err(ChatNetError::InvalidArgument { .. })));
        router.set_pattern(r"^\.(\w+)(?:\s+(.+))?$").expect("valid pattern");

        let calls = Arc::new(Mutex::new(Vec::new()));
        router.register_command("go", recorder(&calls));
        assert_eq!(router.route(&connection(), ChatType::Public, "Bob", ".go now"), 1);
        assert_eq!(router.route(&connection(), ChatType::Public, "Bob", "!go now"), 0);
    }
}
