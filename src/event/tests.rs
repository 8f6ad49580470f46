//! Unit tests for event parsing and the kind hierarchy.

use std::sync::Arc;

use rstest::rstest;

use super::*;
use crate::connection::TcpConnection;

fn connection() -> Arc<dyn Connection> { Arc::new(TcpConnection::default()) }

#[rstest]
#[case(EventKind::LoginResponse, &[EventKind::LoginResponse, EventKind::Inbound, EventKind::Any])]
#[case(EventKind::OutboundChat, &[EventKind::OutboundChat, EventKind::Outbound, EventKind::Any])]
#[case(EventKind::Inbound, &[EventKind::Inbound, EventKind::Any])]
#[case(EventKind::Any, &[EventKind::Any])]
fn lineage_walks_to_the_root(#[case] kind: EventKind, #[case] expected: &[EventKind]) {
    assert_eq!(kind.lineage().collect::<Vec<_>>(), expected);
}

#[test]
fn every_kind_has_a_unique_index() {
    for (position, kind) in EventKind::ALL.iter().enumerate() {
        assert_eq!(kind.index(), position);
    }
    assert!(EventKind::PlayerLeft.is_a(EventKind::Inbound));
    assert!(!EventKind::PlayerLeft.is_a(EventKind::Outbound));
}

#[test]
fn login_ok_is_accepted_with_username() {
    let response = LoginResponse::parse("LOGINOK:bot").expect("valid login response");
    assert!(response.accepted());
    assert_eq!(response.username(), Some("bot"));
    assert_eq!(response.response(), None);
}

#[rstest]
#[case("LOGINBAD:bad password", "bad password")]
#[case("loginok:bot", "bot")]
#[case("LOGINWHATEVER:", "")]
fn other_login_tokens_are_rejections(#[case] line: &str, #[case] reason: &str) {
    let response = LoginResponse::parse(line).expect("login-prefixed lines parse");
    assert!(!response.accepted());
    assert_eq!(response.response(), Some(reason));
    assert_eq!(response.username(), None);
}

#[test]
fn player_lines_parse_ship_and_frequency() {
    let entered = PlayerEntered::parse("ENTERING:Alice:3:8025").expect("valid entering line");
    assert_eq!(entered.name(), "Alice");
    assert_eq!(entered.ship(), Ship::Leviathan);
    assert_eq!(entered.frequency(), 8025);

    let update = PlayerUpdate::parse("SHIPFREQCHANGE:Alice:8:1").expect("valid update");
    assert_eq!(update.ship(), Ship::Spectator);
}

#[rstest]
#[case("KILL:onlyonefield")]
#[case("KILL:a:b:lots:0")]
#[case("PLAYER:Alice:12:0")]
#[case("INARENA:pub")]
#[case("LEAVING")]
fn malformed_lines_are_rejected(#[case] line: &str) {
    let parsed = match line.split(':').next() {
        Some("KILL") => PlayerDeath::parse(line).map(drop),
        Some("PLAYER") => PlayerEntered::parse(line).map(drop),
        Some("INARENA") => EnteredArena::parse(line).map(drop),
        _ => PlayerLeft::parse(line).map(drop),
    };
    assert!(parsed.is_err(), "{line} should not parse");
}

#[test]
fn kill_keeps_all_fields() {
    let death = PlayerDeath::parse("KILL:Alice:Bob:120:2").expect("valid kill");
    assert_eq!(
        (death.killer(), death.killed(), death.bounty(), death.flags_carried()),
        ("Alice", "Bob", 120, 2)
    );
}

#[rstest]
#[case("MSG:ARENA:Server restarting", ChatType::Arena, None, None, None, "Server restarting")]
#[case("MSG:PUB:Alice:hi: there", ChatType::Public, Some("Alice"), None, None, "hi: there")]
#[case("MSG:CHAT:2:Alice> yo", ChatType::Chat, None, Some(2), None, "Alice> yo")]
#[case("MSG:SQUAD:Aces:Bob:gg", ChatType::Squad, Some("Bob"), None, Some("Aces"), "gg")]
fn chat_layouts(
    #[case] line: &str,
    #[case] chat_type: ChatType,
    #[case] player: Option<&str>,
    #[case] channel: Option<u32>,
    #[case] squad: Option<&str>,
    #[case] message: &str,
) {
    let chat = InboundChatMessage::parse(line).expect("valid chat line");
    assert_eq!(chat.chat_type(), chat_type);
    assert_eq!(chat.player(), player);
    assert_eq!(chat.channel(), channel);
    assert_eq!(chat.squad(), squad);
    assert_eq!(chat.message(), message);
}

#[rstest]
#[case("MSG:PUB:no-separator")]
#[case("MSG:WHISPER:Alice:hi")]
#[case("MSG:CHAT:x:hi")]
fn chat_layout_violations_are_rejected(#[case] line: &str) {
    assert!(InboundChatMessage::parse(line).is_err());
}

#[rstest]
#[case("SEND:PUB:hello")]
#[case("SEND:CHAT:1;hello")]
#[case("SEND:PRIV:Alice:psst")]
#[case("SEND:FREQ:9999:go")]
#[case("SEND:SQUAD:Aces:meet up")]
fn outbound_chat_regenerates_its_line(#[case] line: &str) {
    let chat = OutboundChatMessage::parse(line).expect("valid send line");
    assert_eq!(chat.to_message(), line);
}

#[rstest]
#[case("SEND:CHAT:0;hello")]
#[case("SEND:FREQ:10000:go")]
#[case("SEND:ARENA:hi")]
#[case("GO:pub")]
fn outbound_chat_rejects_bad_lines(#[case] line: &str) {
    assert!(OutboundChatMessage::parse(line).is_err());
}

#[test]
fn outbound_setters_validate_and_update_the_line() {
    let mut chat = OutboundChatMessage::new(ChatType::Public, "hello").expect("valid message");
    chat.set_message("changed").expect("plain text is accepted");
    assert_eq!(chat.to_message(), "SEND:PUB:changed");

    assert!(chat.set_frequency(10_000).is_err());
    assert!(chat.set_channel(0).is_err());
    assert!(chat.set_player("").is_err());
    assert!(chat.set_chat_type(ChatType::Sysop).is_err());
    assert!(chat.set_message("two\nlines").is_err());

    chat.set_chat_type(ChatType::Frequency).expect("frequency chat is sendable");
    chat.set_frequency(42).expect("in range");
    assert_eq!(chat.to_message(), "SEND:FREQ:42:changed");
}

#[test]
fn typed_constructors_pick_the_right_layout() {
    let private = OutboundChatMessage::to_player(ChatType::PrivateCommand, "Alice", "*info")
        .expect("valid private command");
    assert_eq!(private.to_message(), "SEND:PRIVCMD:Alice:*info");
    assert!(OutboundChatMessage::to_player(ChatType::Public, "Alice", "hi").is_err());
    assert!(OutboundChatMessage::new(ChatType::Squad, "hi").is_err());

    let channel = OutboundChatMessage::to_channel(3, "hi").expect("valid channel");
    assert_eq!(channel.to_message(), "SEND:CHAT:3;hi");
}

#[rstest]
#[case("GO:duel", "duel")]
#[case("GO:", "")]
#[case("duel", "duel")]
fn change_arena_accepts_both_forms(#[case] line: &str, #[case] arena: &str) {
    let change = ChangeArena::parse(line).expect("valid arena change");
    assert_eq!(change.arena(), arena);
    assert_eq!(change.to_message(), format!("GO:{arena}"));
}

#[test]
fn change_arena_and_frequency_bounds() {
    assert!(ChangeArena::parse("JOIN:duel").is_err());
    let mut change = ChangeArena::new("pub").expect("valid arena");
    assert!(change.set_arena_id(256).is_err());
    change.set_arena_id(7).expect("in range");
    assert_eq!(change.to_message(), "GO:7");

    assert!(ChangeFrequency::parse("CHANGEFREQ:10000").is_err());
    let frequency = ChangeFrequency::parse("CHANGEFREQ:9999").expect("in range");
    assert_eq!(frequency.frequency(), 9999);
}

#[test]
fn event_wrappers_report_kind_and_message() {
    let login = LoginResponse::parse("LOGINOK:bot").expect("valid login response");
    let inbound = Event::Inbound(InboundEvent::new(
        connection(),
        "LOGINOK:bot",
        Inbound::LoginResponse(login),
    ));
    assert_eq!(inbound.kind(), EventKind::LoginResponse);
    assert_eq!(inbound.to_message(), "LOGINOK:bot");

    let mut unknown = Event::Outbound(OutboundEvent::unknown(connection(), "NOOP"));
    assert_eq!(unknown.kind(), EventKind::Outbound);
    assert!(!unknown.is_suppressed());
    assert!(unknown.suppress());
    assert!(unknown.is_suppressed());
    assert_eq!(unknown.to_message(), "NOOP");
}

#[test]
fn inbound_events_cannot_be_suppressed() {
    let mut event = Event::Inbound(InboundEvent::unknown(connection(), "HELLO"));
    assert!(!event.suppress());
    assert!(!event.is_suppressed());
}
