//! End-to-end tests driving a [`SessionRunner`] against a stub server.

mod common;

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use chatnet::{
    ChatNetError,
    Connection,
    ConnectionExt,
    EventDispatcher,
    EventKind,
    PreprocessingConnection,
    ReconnectBackoff,
    SessionRunner,
    dispatch::handler_fn,
    event::Inbound,
};
use chatnet_testing::StubServer;
use common::{PATIENCE, refused_address, server, tcp_connection};
use rstest::rstest;
use tokio_util::sync::CancellationToken;

fn quick_backoff() -> ReconnectBackoff {
    ReconnectBackoff {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
    }
}

/// Chain that joins the default arena once the login is accepted.
fn logging_in_chain() -> (Arc<dyn Connection>, Arc<dyn Connection>) {
    let root: Arc<dyn Connection> = tcp_connection();
    let outer = PreprocessingConnection::new(Arc::clone(&root));
    let dispatcher = Arc::new(EventDispatcher::new());
    dispatcher.register_handler(
        EventKind::LoginResponse,
        handler_fn(EventKind::LoginResponse, |event| {
            let accepted = event.as_inbound().is_some_and(|inbound| {
                matches!(inbound.detail(), Inbound::LoginResponse(response) if response.accepted())
            });
            if accepted {
                event.connection().change_arena_default();
            }
        }),
    );
    outer.register_preprocessor(dispatcher);
    (outer, root)
}

fn spawn(runner: SessionRunner) -> (CancellationToken, JoinHandle<chatnet::Result<()>>) {
    let token = runner.cancellation_token();
    let handle = thread::spawn(move || runner.run());
    (token, handle)
}

#[rstest]
fn a_session_logs_in_and_reconnects_after_a_hang_up(server: StubServer) {
    let (outer, root) = logging_in_chain();
    let address = server.address();
    let runner = SessionRunner::new(
        Arc::clone(&outer),
        address.ip().to_string(),
        address.port(),
        "bot",
        "secret",
    )
    .login_via(Arc::clone(&root))
    .backoff(quick_backoff());
    let (token, handle) = spawn(runner);

    assert!(server.wait_for_clients(1, PATIENCE));
    let lines = server.wait_for_lines(1, PATIENCE);
    let login = lines.first().expect("login line");
    assert!(login.starts_with("LOGIN:1;chatnet v"), "unexpected login {login:?}");
    assert!(login.ends_with(":bot:secret"));

    server.send_line("LOGINOK:bot").expect("client attached");
    assert_eq!(server.wait_for_lines(2, PATIENCE).get(1).map(String::as_str), Some("GO:"));

    server.hang_up();
    assert!(server.wait_for_clients(2, PATIENCE));
    let lines = server.wait_for_lines(3, PATIENCE);
    assert!(lines.get(2).is_some_and(|line| line.starts_with("LOGIN:")));

    token.cancel();
    handle.join().expect("runner thread").expect("runner ends cleanly");
    assert!(matches!(
        outer.connect(address),
        Err(ChatNetError::IllegalState(_))
    ));
}

#[test]
fn cancelling_stops_a_runner_that_cannot_connect() {
    let address = refused_address();
    let connection = tcp_connection();
    let runner = SessionRunner::new(
        connection.clone(),
        address.ip().to_string(),
        address.port(),
        "bot",
        "secret",
    )
    .backoff(quick_backoff());
    let (token, handle) = spawn(runner);

    thread::sleep(Duration::from_millis(150));
    token.cancel();
    handle.join().expect("runner thread").expect("runner ends cleanly");
    assert!(!connection.send_line("NOOP"));
    assert!(connection.join(None).is_err());
}

#[test]
fn invalid_credentials_end_the_runner_with_an_error() {
    let server = StubServer::start().expect("stub server starts");
    let address = server.address();
    let connection = tcp_connection();
    let runner = SessionRunner::new(
        connection.clone(),
        address.ip().to_string(),
        address.port(),
        "bad:name",
        "secret",
    );
    assert!(matches!(runner.run(), Err(ChatNetError::InvalidArgument { .. })));
    assert!(connection.join(None).is_err());
}
