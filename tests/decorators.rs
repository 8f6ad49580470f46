//! Tests for stacked connection decorators.
//!
//! The chains here wrap a [`MemoryConnection`] so state changes and lines
//! can be driven without a socket.

mod common;

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use chatnet::{
    Connection,
    ConnectionState,
    MessagePreprocessor,
    MessageThrottle,
    PreprocessingConnection,
    ThrottleConfig,
};
use chatnet_testing::{MemoryConnection, RecordingListener};
use common::PATIENCE;
use rstest::{fixture, rstest};

fn address() -> SocketAddr { SocketAddr::from(([127, 0, 0, 1], 5005)) }

/// Appends a tag to lines in both directions and records what it saw.
struct Tagger {
    tag: &'static str,
    seen: Mutex<Vec<String>>,
}

impl Tagger {
    fn new(tag: &'static str) -> Arc<Self> {
        Arc::new(Self {
            tag,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<String> { self.seen.lock().expect("seen lock").clone() }
}

impl MessagePreprocessor for Tagger {
    fn process_outbound(&self, _connection: &Arc<dyn Connection>, line: String) -> Option<String> {
        self.seen.lock().expect("seen lock").push(line.clone());
        Some(format!("{line}{}", self.tag))
    }

    fn process_inbound(&self, _connection: &Arc<dyn Connection>, line: String) -> Option<String> {
        self.seen.lock().expect("seen lock").push(line.clone());
        Some(format!("{line}{}", self.tag))
    }
}

/// Drops every line containing `needle`.
struct Censor {
    needle: &'static str,
}

impl MessagePreprocessor for Censor {
    fn process_outbound(&self, _connection: &Arc<dyn Connection>, line: String) -> Option<String> {
        (!line.contains(self.needle)).then_some(line)
    }

    fn process_inbound(&self, _connection: &Arc<dyn Connection>, line: String) -> Option<String> {
        (!line.contains(self.needle)).then_some(line)
    }
}

struct Chain {
    root: Arc<MemoryConnection>,
    throttle: Arc<MessageThrottle>,
    outer: Arc<PreprocessingConnection>,
}

#[fixture]
fn chain() -> Chain {
    let root = Arc::new(MemoryConnection::new());
    let config = ThrottleConfig::default().delay(Duration::from_millis(10));
    let throttle = MessageThrottle::with_config(root.clone(), config).expect("throttle worker starts");
    let outer = PreprocessingConnection::new(throttle.clone());
    Chain { root, throttle, outer }
}

#[rstest]
fn listeners_see_the_connection_they_registered_on(chain: Chain) {
    let on_root = RecordingListener::new();
    let on_throttle = RecordingListener::new();
    let on_outer = RecordingListener::new();
    chain.root.register_state_listener(on_root.clone());
    chain.throttle.register_state_listener(on_throttle.clone());
    chain.outer.register_state_listener(on_outer.clone());

    assert!(chain.outer.connect(address()).expect("disconnected"));
    assert!(chain.outer.disconnect());
    assert!(chain.outer.close());

    let expected_states = [
        ConnectionState::Connected,
        ConnectionState::Disconnected,
        ConnectionState::Closed,
    ];
    for (listener, id) in [
        (&on_root, chain.root.id()),
        (&on_throttle, chain.throttle.id()),
        (&on_outer, chain.outer.id()),
    ] {
        let expected: Vec<_> = expected_states.iter().map(|state| (id, *state)).collect();
        assert_eq!(listener.seen(), expected);
    }
}

#[rstest]
fn decorators_forward_state_and_lifecycle(chain: Chain) {
    assert_eq!(chain.outer.state(), ConnectionState::Disconnected);
    assert!(chain.outer.connect(address()).expect("disconnected"));
    assert_eq!(chain.root.peer(), Some(address()));
    assert_eq!(chain.throttle.state(), ConnectionState::Connected);

    let mut ran = false;
    assert!(chain.outer.exec_while_state(ConnectionState::Connected, &mut || ran = true));
    assert!(ran);

    assert!(chain.outer.close());
    assert_eq!(chain.root.state(), ConnectionState::Closed);
    assert!(chain.outer.join(None).is_err());
}

#[rstest]
fn dropping_a_decorator_detaches_its_relay() {
    let root = Arc::new(MemoryConnection::new());
    let listener = RecordingListener::new();
    {
        let outer = PreprocessingConnection::new(root.clone());
        outer.register_state_listener(listener.clone());
        assert!(outer.connect(address()).expect("disconnected"));
    }
    assert!(root.disconnect());
    assert_eq!(listener.states(), vec![ConnectionState::Connected]);
}

#[rstest]
fn preprocessors_run_in_registration_order(chain: Chain) {
    let first = Tagger::new("+a");
    let second = Tagger::new("+b");
    assert!(chain.outer.register_preprocessor(first.clone()));
    assert!(chain.outer.register_preprocessor(second.clone()));
    assert!(!chain.outer.register_preprocessor(first.clone()));
    assert!(chain.outer.connect(address()).expect("disconnected"));

    assert!(chain.outer.send_line("NOOP"));
    chain.root.push_inbound("MSG:ARENA:hello");
    assert_eq!(chain.outer.receive_line().as_deref(), Some("MSG:ARENA:hello+a+b"));

    assert_eq!(chain.root.wait_for_sent(1, PATIENCE), vec!["NOOP+a+b"]);
    assert_eq!(first.seen(), vec!["NOOP", "MSG:ARENA:hello"]);
    assert_eq!(second.seen(), vec!["NOOP+a", "MSG:ARENA:hello+a"]);

    let removed: Arc<dyn MessagePreprocessor> = first;
    assert!(chain.outer.remove_preprocessor(&removed));
    assert!(chain.outer.send_line("NOOP"));
    assert_eq!(chain.root.wait_for_sent(2, PATIENCE)[1], "NOOP+b");
}

#[rstest]
fn a_preprocessor_can_drop_lines_in_both_directions(chain: Chain) {
    let later = Tagger::new("");
    chain.outer.register_preprocessor(Arc::new(Censor { needle: "secret" }));
    chain.outer.register_preprocessor(later.clone());
    assert!(chain.outer.connect(address()).expect("disconnected"));

    assert!(!chain.outer.send_line("SEND:PUB::secret plans"));
    chain.root.push_inbound("MSG:PUB:Bob:secret");
    assert_eq!(chain.outer.receive_line(), None);
    assert!(later.seen().is_empty());

    assert!(chain.outer.send_line("SEND:PUB::hello"));
    assert_eq!(chain.root.wait_for_sent(1, PATIENCE), vec!["SEND:PUB::hello"]);
}

#[rstest]
fn empty_lines_never_reach_a_preprocessor(chain: Chain) {
    let tagger = Tagger::new("!");
    chain.outer.register_preprocessor(tagger.clone());
    assert!(chain.outer.connect(address()).expect("disconnected"));
    assert!(!chain.outer.send_line(""));
    assert!(tagger.seen().is_empty());
}
