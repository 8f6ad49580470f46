//! Test doubles and fixtures for `chatnet`.
//!
//! [`MemoryConnection`] is a scripted root connection, [`StubServer`] a real
//! TCP peer on localhost, and the recording types capture state changes and
//! dispatched events for assertions.
//!
//! ```rust
//! use std::{sync::Arc, time::Duration};
//!
//! use chatnet::Connection;
//! use chatnet_testing::MemoryConnection;
//!
//! let connection = Arc::new(MemoryConnection::new());
//! connection.connect("127.0.0.1:5005".parse().unwrap()).unwrap();
//! connection.push_inbound("LOGINOK:bot");
//! assert_eq!(connection.receive_line().as_deref(), Some("LOGINOK:bot"));
//! assert!(connection.send_line("GO:"));
//! assert_eq!(connection.wait_for_sent(1, Duration::from_secs(1)), vec!["GO:".to_owned()]);
//! ```

pub mod logging;
pub mod memory;
pub mod recording;
pub mod stub_server;

pub use logging::{LoggerHandle, logger};
pub use memory::MemoryConnection;
pub use recording::{RecordedEvent, RecordingHandler, RecordingListener};
pub use stub_server::StubServer;
