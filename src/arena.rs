//! Tracks who is in the current arena.
//!
//! [`ArenaRoster`] listens to inbound events and keeps one [`PlayerData`]
//! record per player, keyed by lower-cased name. Records carry an
//! application-defined attribute map so bots can hang their own state off a
//! player.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Mutex, MutexGuard, PoisonError},
};

use regex::RegexBuilder;
use tracing::{debug, trace};

use crate::{
    dispatch::EventHandler,
    error::Result,
    event::{Event, EventKind, Inbound, Ship},
};

/// What happens to a player's record once they leave.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Forget the record. Removal happens when the next event is processed so
    /// handlers of the leave event can still look the player up.
    #[default]
    Evict,
    /// Keep the record, marked inactive, and reuse it if the player returns.
    Retain,
}

/// One player's state plus application attributes.
#[derive(Clone, Debug)]
pub struct PlayerData<K, V> {
    name: String,
    frequency: u16,
    ship: Ship,
    active: bool,
    attributes: HashMap<K, V>,
}

impl<K: Eq + Hash, V> PlayerData<K, V> {
    fn new(name: &str, ship: Ship, frequency: u16) -> Self {
        Self {
            name: name.to_owned(),
            frequency,
            ship,
            active: true,
            attributes: HashMap::new(),
        }
    }

    /// Name as the server spelled it.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    #[must_use]
    pub fn frequency(&self) -> u16 { self.frequency }

    #[must_use]
    pub fn ship(&self) -> Ship { self.ship }

    /// Whether the player is currently in the arena.
    #[must_use]
    pub fn is_active(&self) -> bool { self.active }

    #[must_use]
    pub fn attributes(&self) -> &HashMap<K, V> { &self.attributes }

    pub fn attributes_mut(&mut self) -> &mut HashMap<K, V> { &mut self.attributes }

    #[must_use]
    pub fn attribute(&self, key: &K) -> Option<&V> { self.attributes.get(key) }

    pub fn set_attribute(&mut self, key: K, value: V) -> Option<V> { self.attributes.insert(key, value) }

    fn update(&mut self, ship: Ship, frequency: u16) {
        self.ship = ship;
        self.frequency = frequency;
    }
}

struct Roster<K, V> {
    players: HashMap<String, PlayerData<K, V>>,
    active: usize,
    username: Option<String>,
    arena: Option<String>,
    pending_removal: Option<String>,
    retention: RetentionPolicy,
}

impl<K: Eq + Hash, V> Roster<K, V> {
    fn apply(&mut self, detail: &Inbound) {
        if let Some(name) = self.pending_removal.take() {
            self.players.remove(&name);
        }
        match detail {
            Inbound::LoginResponse(response) => {
                if let Some(username) = response.username() {
                    self.username = Some(username.to_owned());
                }
            }
            Inbound::EnteredArena(entered) => {
                self.arena = Some(entered.arena().to_owned());
                match self.retention {
                    RetentionPolicy::Retain => self.players.values_mut().for_each(|player| player.active = false),
                    RetentionPolicy::Evict => self.players.clear(),
                }
                if let Some(username) = &self.username {
                    let player = self
                        .players
                        .entry(username.to_lowercase())
                        .or_insert_with(|| PlayerData::new(username, Ship::Spectator, entered.frequency()));
                    player.update(Ship::Spectator, entered.frequency());
                    player.active = true;
                }
                self.active = 1;
                debug!(arena = entered.arena(), "entered arena");
            }
            Inbound::PlayerEntered(entered) => {
                let key = entered.name().to_lowercase();
                match self.players.get_mut(&key) {
                    Some(player) if self.retention == RetentionPolicy::Retain => {
                        player.update(entered.ship(), entered.frequency());
                        player.active = true;
                    }
                    _ => {
                        self.players.insert(
                            key,
                            PlayerData::new(entered.name(), entered.ship(), entered.frequency()),
                        );
                    }
                }
                self.active += 1;
                trace!(player = entered.name(), count = self.active, "player entered");
            }
            Inbound::PlayerLeft(left) => {
                let key = left.name().to_lowercase();
                if let Some(player) = self.players.get_mut(&key) {
                    player.active = false;
                    if self.retention == RetentionPolicy::Evict {
                        self.pending_removal = Some(key);
                    }
                    self.active = self.active.saturating_sub(1);
                    trace!(player = left.name(), count = self.active, "player left");
                }
            }
            Inbound::PlayerUpdate(update) => {
                if let Some(player) = self.players.get_mut(&update.name().to_lowercase()) {
                    player.update(update.ship(), update.frequency());
                }
            }
            Inbound::PlayerDeath(_) | Inbound::Chat(_) | Inbound::Unknown => {}
        }
    }
}

/// Event handler maintaining the arena's player list.
///
/// Register it for [`EventKind::Inbound`] so it sees every received line.
///
/// ```
/// use std::sync::Arc;
///
/// use chatnet::{ArenaRoster, EventDispatcher, EventKind, dispatch::EventHandler};
///
/// let roster: Arc<ArenaRoster<String, u32>> = Arc::new(ArenaRoster::new());
/// let dispatcher = EventDispatcher::new();
/// let handler: Arc<dyn EventHandler> = roster.clone();
/// assert!(dispatcher.register_handler(EventKind::Inbound, handler));
/// assert_eq!(roster.player_count(), 0);
/// ```
pub struct ArenaRoster<K, V> {
    state: Mutex<Roster<K, V>>,
}

impl<K: Eq + Hash, V> Default for ArenaRoster<K, V> {
    fn default() -> Self { Self::new() }
}

impl<K: Eq + Hash, V> ArenaRoster<K, V> {
    /// Roster that evicts players when they leave.
    #[must_use]
    pub fn new() -> Self { Self::with_retention(RetentionPolicy::Evict) }

    #[must_use]
    pub fn with_retention(retention: RetentionPolicy) -> Self {
        Self {
            state: Mutex::new(Roster {
                players: HashMap::new(),
                active: 0,
                username: None,
                arena: None,
                pending_removal: None,
                retention,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Roster<K, V>> { self.state.lock().unwrap_or_else(PoisonError::into_inner) }

    pub fn set_retention(&self, retention: RetentionPolicy) { self.lock().retention = retention; }

    #[must_use]
    pub fn retention(&self) -> RetentionPolicy { self.lock().retention }

    /// Update the roster from one inbound event.
    pub fn process(&self, detail: &Inbound) { self.lock().apply(detail); }

    /// Name of the current arena, once one has been entered.
    #[must_use]
    pub fn arena(&self) -> Option<String> { self.lock().arena.clone() }

    /// Players currently in the arena, including this session.
    #[must_use]
    pub fn player_count(&self) -> usize { self.lock().active }

    /// Name this session logged in with.
    #[must_use]
    pub fn username(&self) -> Option<String> { self.lock().username.clone() }

    /// Run `f` on the named player's record, if known.
    pub fn with_player<R>(&self, name: &str, f: impl FnOnce(&mut PlayerData<K, V>) -> R) -> Option<R> {
        self.lock().players.get_mut(&name.to_lowercase()).map(f)
    }
}

impl<K: Eq + Hash + Clone, V: Clone> ArenaRoster<K, V> {
    /// Snapshot of the named player, matched case-insensitively.
    #[must_use]
    pub fn player(&self, name: &str) -> Option<PlayerData<K, V>> {
        self.lock().players.get(&name.to_lowercase()).cloned()
    }

    /// Snapshot of this session's own record.
    #[must_use]
    pub fn own_player(&self) -> Option<PlayerData<K, V>> {
        let state = self.lock();
        let username = state.username.as_ref()?;
        state.players.get(&username.to_lowercase()).cloned()
    }

    /// First player whose whole name matches `pattern`, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`ChatNetError::InvalidPattern`](crate::ChatNetError::InvalidPattern)
    /// if `pattern` does not compile.
    pub fn find_player(&self, pattern: &str) -> Result<Option<PlayerData<K, V>>> {
        let regex = RegexBuilder::new(&format!("^(?:{pattern})$"))
            .case_insensitive(true)
            .build()?;
        Ok(self
            .lock()
            .players
            .values()
            .find(|player| regex.is_match(player.name()))
            .cloned())
    }

    /// Every record accepted by `filter`, active or not.
    pub fn players_matching(&self, filter: impl Fn(&PlayerData<K, V>) -> bool) -> Vec<PlayerData<K, V>> {
        self.lock()
            .players
            .values()
            .filter(|player| filter(player))
            .cloned()
            .collect()
    }

    /// Players currently in the arena.
    #[must_use]
    pub fn active_players(&self) -> Vec<PlayerData<K, V>> { self.players_matching(PlayerData::is_active) }
}

impl<K, V> EventHandler for ArenaRoster<K, V>
where
    K: Eq + Hash + Send,
    V: Send,
{
    fn accepts(&self, kind: EventKind) -> bool { kind == EventKind::Inbound }

    fn handle_event(&self, _kind: EventKind, event: &mut Event) {
        if let Some(inbound) = event.as_inbound() {
            self.process(inbound.detail());
        }
    }
}
