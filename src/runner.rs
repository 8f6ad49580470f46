//! Connect, log in, read, reconnect.
//!
//! [`SessionRunner`] drives a connection through repeated sessions until it
//! is closed or cancelled. Inbound lines are consumed by the connection's own
//! decorators (typically an [`EventDispatcher`](crate::EventDispatcher)
//! installed through a [`PreprocessingConnection`](crate::PreprocessingConnection)),
//! so the runner only needs to keep reading.

use std::{fmt, sync::Arc, time::Duration};

use tokio::{runtime::Builder, select, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    connection::{Connection, ConnectionExt, ConnectionState},
    error::{ChatNetError, Result},
};

mod backoff;

pub use backoff::ReconnectBackoff;

/// How a wait between sessions ended.
#[derive(Debug, PartialEq, Eq)]
enum Wait {
    Elapsed,
    Cancelled,
}

/// Reconnecting session loop.
///
/// ```no_run
/// use std::sync::Arc;
///
/// use chatnet::{Connection, SessionRunner, TcpConnection};
///
/// let connection: Arc<dyn Connection> = Arc::new(TcpConnection::default());
/// let runner = SessionRunner::new(connection, "chat.example.net", 5005, "bot", "secret");
/// let token = runner.cancellation_token();
/// std::thread::spawn(move || {
///     std::thread::sleep(std::time::Duration::from_secs(60));
///     token.cancel();
/// });
/// runner.run()?;
/// # Ok::<(), chatnet::ChatNetError>(())
/// ```
pub struct SessionRunner {
    connection: Arc<dyn Connection>,
    login: Arc<dyn Connection>,
    host: String,
    port: u16,
    username: String,
    password: String,
    backoff: ReconnectBackoff,
    token: CancellationToken,
}

impl fmt::Debug for SessionRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRunner")
            .field("connection", &self.connection.id())
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl SessionRunner {
    /// Runner reading from and logging in through `connection`.
    #[must_use]
    pub fn new(
        connection: Arc<dyn Connection>,
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            login: Arc::clone(&connection),
            connection,
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            backoff: ReconnectBackoff::default(),
            token: CancellationToken::new(),
        }
    }

    /// Send the login line through `login` instead, usually the root of the
    /// decorator chain.
    #[must_use]
    pub fn login_via(mut self, login: Arc<dyn Connection>) -> Self {
        self.login = login;
        self
    }

    #[must_use]
    pub fn backoff(mut self, backoff: ReconnectBackoff) -> Self {
        self.backoff = backoff.normalized();
        self
    }

    /// Token that stops the runner. Cancelling closes the connection, which
    /// also ends a blocked read.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken { self.token.clone() }

    /// Run sessions until the connection closes or the token is cancelled.
    /// The connection is closed on return.
    ///
    /// # Errors
    ///
    /// Returns [`ChatNetError::Io`] if the runner's timer runtime cannot be
    /// built, and [`ChatNetError::InvalidArgument`] if the credentials cannot
    /// be sent.
    pub fn run(&self) -> Result<()> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("chatnet-runner")
            .enable_time()
            .build()
            .map_err(ChatNetError::Io)?;

        let token = self.token.clone();
        let watched = Arc::clone(&self.connection);
        let watcher = runtime.spawn(async move {
            token.cancelled().await;
            debug!(connection = %watched.id(), "runner cancelled, closing connection");
            watched.close();
        });

        let outcome = self.sessions(&runtime);
        watcher.abort();
        self.connection.close();
        outcome
    }

    fn sessions(&self, runtime: &tokio::runtime::Runtime) -> Result<()> {
        let mut failures: u32 = 0;
        while !self.token.is_cancelled() {
            match self.connection.connect_host(&self.host, self.port) {
                Ok(true) => {
                    failures = 0;
                    self.session()?;
                }
                Ok(false) => failures = failures.saturating_add(1),
                Err(error) if error.is_closed() => break,
                Err(error) => {
                    warn!(host = %self.host, port = self.port, %error, "connect rejected");
                    failures = failures.saturating_add(1);
                }
            }
            if self.connection.state() == ConnectionState::Closed {
                break;
            }
            let delay = self.backoff.delay(failures.saturating_sub(1));
            info!(host = %self.host, port = self.port, ?delay, "reconnecting after delay");
            if runtime.block_on(self.wait(delay)) == Wait::Cancelled {
                break;
            }
        }
        Ok(())
    }

    /// Log in and read until the session ends.
    fn session(&self) -> Result<()> {
        info!(host = %self.host, port = self.port, username = %self.username, "session started");
        if !self.login.login(&self.username, &self.password)? {
            warn!(connection = %self.connection.id(), "login line could not be sent");
        }
        while self.connection.state() == ConnectionState::Connected {
            // Decorators handle the content; timeouts simply loop.
            self.connection.receive_line();
        }
        self.connection.disconnect();
        info!(host = %self.host, port = self.port, "session ended");
        Ok(())
    }

    async fn wait(&self, delay: Duration) -> Wait {
        select! {
            () = self.token.cancelled() => Wait::Cancelled,
            () = sleep(delay) => Wait::Elapsed,
        }
    }
}
