#![doc(html_root_url = "https://docs.rs/chatnet/latest")]
//! Client library for the ChatNet game chat protocol.
//!
//! A session is a chain of [`Connection`]s: a [`TcpConnection`] at the root,
//! wrapped by decorators such as [`MessageThrottle`] for pacing and
//! [`PreprocessingConnection`] for hooks. An [`EventDispatcher`] installed as
//! a preprocessor turns every line into a typed [`Event`] and routes it to
//! [`EventHandler`]s registered by kind. [`ArenaRoster`] and
//! [`CommandRouter`] are ready-made handlers, and [`SessionRunner`] drives
//! the connect, login and reconnect cycle.

pub mod arena;
pub mod commands;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod metrics;
pub mod panic;
pub mod preprocess;
pub mod runner;
pub mod sync;
pub mod throttle;
pub mod timer;
pub mod translator;

pub use arena::{ArenaRoster, PlayerData, RetentionPolicy};
pub use commands::{CommandContext, CommandHandler, CommandRouter};
pub use config::{ConnectionConfig, ThrottleConfig};
pub use connection::{
    CLIENT_NAME,
    Connection,
    ConnectionExt,
    ConnectionId,
    ConnectionState,
    MAX_ARENA_ID,
    MAX_FREQUENCY,
    StateListener,
    TcpConnection,
};
pub use dispatch::{EventDispatcher, EventHandler};
pub use error::{ChatNetError, Result};
pub use event::{Event, EventKind, InboundEvent, OutboundEvent};
pub use metrics::{CONNECTIONS_ACTIVE, Direction, EVENTS_DISPATCHED, LINES_TOTAL, THROTTLE_DROPPED};
pub use preprocess::{MessagePreprocessor, PreprocessingConnection};
pub use runner::{ReconnectBackoff, SessionRunner};
pub use sync::SignalLock;
pub use throttle::{ClusterGuard, MessageThrottle};
pub use timer::{ScheduledTask, Scheduler};
pub use translator::{MessageTranslator, TranslateError};
