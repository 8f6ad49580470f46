//! Tests for event dispatch through the preprocessing decorator.

mod common;

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use chatnet::{
    Connection,
    ConnectionExt,
    Event,
    EventDispatcher,
    EventHandler,
    EventKind,
    PreprocessingConnection,
    event::{Inbound, Outbound},
};
use chatnet_testing::{MemoryConnection, RecordedEvent, RecordingHandler};
use common::PATIENCE;
use rstest::{fixture, rstest};

struct Wired {
    root: Arc<MemoryConnection>,
    outer: Arc<PreprocessingConnection>,
    dispatcher: Arc<EventDispatcher>,
}

#[fixture]
fn wired() -> Wired {
    let root = Arc::new(MemoryConnection::new());
    let outer = PreprocessingConnection::new(root.clone());
    let dispatcher = Arc::new(EventDispatcher::new());
    assert!(outer.register_preprocessor(dispatcher.clone()));
    assert!(
        outer
            .connect(SocketAddr::from(([127, 0, 0, 1], 5005)))
            .expect("disconnected")
    );
    Wired { root, outer, dispatcher }
}

fn recorded(level: EventKind, kind: EventKind, message: &str) -> RecordedEvent {
    RecordedEvent {
        level,
        kind,
        message: message.to_owned(),
    }
}

#[rstest]
fn inbound_events_reach_every_level_of_their_lineage(wired: Wired) {
    let any = RecordingHandler::new(&[EventKind::Any]);
    let inbound = RecordingHandler::new(&[EventKind::Inbound]);
    let login = RecordingHandler::new(&[EventKind::LoginResponse]);
    let chat = RecordingHandler::new(&[EventKind::InboundChat]);
    assert!(wired.dispatcher.register_handler(EventKind::Any, any.clone()));
    assert!(wired.dispatcher.register_handler(EventKind::Inbound, inbound.clone()));
    assert!(wired.dispatcher.register_handler(EventKind::LoginResponse, login.clone()));
    assert!(wired.dispatcher.register_handler(EventKind::InboundChat, chat.clone()));

    wired.root.push_inbound("LOGINOK:bot");
    assert_eq!(wired.outer.receive_line().as_deref(), Some("LOGINOK:bot"));

    assert_eq!(login.seen(), vec![recorded(EventKind::LoginResponse, EventKind::LoginResponse, "LOGINOK:bot")]);
    assert_eq!(inbound.seen(), vec![recorded(EventKind::Inbound, EventKind::LoginResponse, "LOGINOK:bot")]);
    assert_eq!(any.seen(), vec![recorded(EventKind::Any, EventKind::LoginResponse, "LOGINOK:bot")]);
    assert_eq!(chat.count(), 0);
}

#[rstest]
#[case("HELLO:world")]
#[case("KILL:onlyonefield")]
#[case("MSG:PUB:no separator")]
fn untranslatable_lines_dispatch_as_unknown_inbound(wired: Wired, #[case] line: &str) {
    let inbound = RecordingHandler::new(&[EventKind::Inbound]);
    let death = RecordingHandler::new(&[EventKind::PlayerDeath, EventKind::InboundChat]);
    wired.dispatcher.register_handler_ex(&(inbound.clone() as Arc<dyn EventHandler>));
    wired.dispatcher.register_handler_ex(&(death.clone() as Arc<dyn EventHandler>));

    wired.root.push_inbound(line);
    assert_eq!(wired.outer.receive_line().as_deref(), Some(line));
    assert_eq!(inbound.seen(), vec![recorded(EventKind::Inbound, EventKind::Inbound, line)]);
    assert_eq!(death.count(), 0);
}

#[rstest]
fn outbound_events_cover_typed_and_unknown_lines(wired: Wired) {
    let outbound = RecordingHandler::new(&[EventKind::Outbound]);
    let arena = RecordingHandler::new(&[EventKind::ChangeArena]);
    wired.dispatcher.register_handler(EventKind::Outbound, outbound.clone());
    wired.dispatcher.register_handler(EventKind::ChangeArena, arena.clone());

    assert!(wired.outer.change_arena("duel").expect("valid arena"));
    assert!(wired.outer.send_line("NOOP"));

    assert_eq!(arena.messages(), vec!["GO:duel"]);
    assert_eq!(
        outbound.seen(),
        vec![
            recorded(EventKind::Outbound, EventKind::ChangeArena, "GO:duel"),
            recorded(EventKind::Outbound, EventKind::Outbound, "NOOP"),
        ]
    );
    assert_eq!(wired.root.wait_for_sent(2, PATIENCE), vec!["GO:duel", "NOOP"]);
}

#[rstest]
fn empty_text_still_goes_out(wired: Wired) {
    assert!(wired.outer.change_arena("").expect("empty arena is the default"));
    assert!(wired.outer.send_public_message("").expect("empty message"));
    assert!(wired.outer.send_private_message("", "hi").is_err());
    assert_eq!(wired.root.wait_for_sent(2, PATIENCE), vec!["GO:", "SEND:PUB:"]);
}

#[rstest]
fn a_suppressed_outbound_event_is_not_sent(wired: Wired) {
    let censor = RecordingHandler::suppressing(&[EventKind::OutboundChat]);
    let later = RecordingHandler::new(&[EventKind::Outbound]);
    wired.dispatcher.register_handler(EventKind::OutboundChat, censor.clone());
    wired.dispatcher.register_handler(EventKind::Outbound, later.clone());

    assert!(!wired.outer.send_line("SEND:PUB::spam"));
    assert!(wired.outer.send_line("GO:pub"));
    assert_eq!(censor.count(), 1);
    assert_eq!(later.count(), 2);
    assert_eq!(wired.root.sent(), vec!["GO:pub"]);
}

#[rstest]
fn inbound_events_cannot_be_suppressed(wired: Wired) {
    let handler = RecordingHandler::suppressing(&[EventKind::Inbound]);
    wired.dispatcher.register_handler(EventKind::Inbound, handler.clone());
    wired.root.push_inbound("MSG:ARENA:still here");
    assert_eq!(wired.outer.receive_line().as_deref(), Some("MSG:ARENA:still here"));
    assert_eq!(handler.count(), 1);
}

#[rstest]
fn handler_edits_do_not_change_the_sent_line(wired: Wired) {
    let rewrites = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&rewrites);
    let rewriter = chatnet::dispatch::handler_fn(EventKind::OutboundChat, move |event: &mut Event| {
        if let Some(outbound) = event.as_outbound_mut()
            && let Outbound::Chat(chat) = outbound.detail_mut()
        {
            chat.set_message("rewritten").expect("valid message");
            log.lock().expect("log lock").push(outbound.to_message());
        }
    });
    wired.dispatcher.register_handler(EventKind::OutboundChat, rewriter);

    assert!(wired.outer.send_line("SEND:PUB::original"));
    assert_eq!(*rewrites.lock().expect("log lock"), vec!["SEND:PUB:rewritten"]);
    assert_eq!(wired.root.sent(), vec!["SEND:PUB::original"]);
}

/// Removes itself from the dispatcher the first time it runs.
struct OneShot {
    dispatcher: Arc<EventDispatcher>,
    this: Mutex<Option<Arc<dyn EventHandler>>>,
    calls: AtomicUsize,
}

impl EventHandler for OneShot {
    fn accepts(&self, kind: EventKind) -> bool { kind == EventKind::Any }

    fn handle_event(&self, kind: EventKind, _event: &mut Event) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(this) = self.this.lock().expect("self lock").take() {
            assert!(self.dispatcher.remove_handler(kind, &this));
        }
    }
}

#[rstest]
fn a_handler_may_remove_itself_while_dispatching(wired: Wired) {
    let one_shot = Arc::new(OneShot {
        dispatcher: Arc::clone(&wired.dispatcher),
        this: Mutex::new(None),
        calls: AtomicUsize::new(0),
    });
    let handle: Arc<dyn EventHandler> = one_shot.clone();
    *one_shot.this.lock().expect("self lock") = Some(Arc::clone(&handle));
    let after = RecordingHandler::new(&[EventKind::Any]);
    assert!(wired.dispatcher.register_handler(EventKind::Any, handle));
    assert!(wired.dispatcher.register_handler(EventKind::Any, after.clone()));

    wired.root.push_inbound("MSG:ARENA:one");
    wired.root.push_inbound("MSG:ARENA:two");
    assert!(wired.outer.receive_line().is_some());
    assert!(wired.outer.receive_line().is_some());

    assert_eq!(one_shot.calls.load(Ordering::SeqCst), 1);
    assert_eq!(after.messages(), vec!["MSG:ARENA:one", "MSG:ARENA:two"]);
    assert_eq!(wired.dispatcher.handler_count(EventKind::Any), 1);
}

#[test]
fn registration_follows_what_a_handler_accepts() {
    let dispatcher = EventDispatcher::new();
    let handler: Arc<dyn EventHandler> =
        RecordingHandler::new(&[EventKind::Inbound, EventKind::PlayerLeft, EventKind::OutboundChat]);

    assert!(!dispatcher.register_handler(EventKind::Any, Arc::clone(&handler)));
    assert_eq!(dispatcher.register_handler_ex(&handler), 3);
    assert_eq!(dispatcher.register_handler_ex(&handler), 0);
    assert_eq!(dispatcher.handler_count(EventKind::PlayerLeft), 1);

    assert!(dispatcher.remove_handler(EventKind::PlayerLeft, &handler));
    // Falls back to the nearest ancestor table holding the handler.
    assert!(dispatcher.remove_handler(EventKind::PlayerDeath, &handler));
    assert_eq!(dispatcher.handler_count(EventKind::Inbound), 0);
    assert!(!dispatcher.remove_handler(EventKind::PlayerDeath, &handler));
    assert_eq!(dispatcher.remove_handler_ex(&handler), 1);
    assert_eq!(dispatcher.remove_handler_ex(&handler), 0);
}

#[test]
fn dispatch_message_reports_translated_events() {
    let dispatcher = EventDispatcher::new();
    let left = RecordingHandler::new(&[EventKind::PlayerLeft]);
    dispatcher.register_handler(EventKind::PlayerLeft, left.clone());
    let connection: Arc<dyn Connection> = Arc::new(MemoryConnection::new());

    let event = dispatcher
        .dispatch_message(&connection, "LEAVING:Alice")
        .expect("translates");
    assert!(matches!(
        event.as_inbound().map(|inbound| inbound.detail()),
        Some(Inbound::PlayerLeft(player)) if player.name() == "Alice"
    ));
    assert_eq!(left.count(), 1);

    assert!(dispatcher.dispatch_message(&connection, "NOPE").is_none());
    assert!(dispatcher.dispatch_message(&connection, "LEAVING").is_none());
    assert_eq!(left.count(), 1);
}
