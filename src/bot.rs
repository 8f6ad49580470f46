//! Wiring for the sample bot.

use std::{sync::Arc, time::Duration};

use chatnet::{
    ArenaRoster,
    CommandContext,
    CommandHandler,
    CommandRouter,
    Connection,
    ConnectionConfig,
    ConnectionExt,
    EventDispatcher,
    EventKind,
    MessageThrottle,
    PreprocessingConnection,
    ReconnectBackoff,
    Result,
    Scheduler,
    SessionRunner,
    TcpConnection,
    ThrottleConfig,
    dispatch::{EventHandler, handler_fn},
    event::{Event, Inbound},
};
use tracing::{info, warn};

use crate::cli::Cli;

/// The assembled connection chain and its helpers.
pub struct Bot {
    runner: SessionRunner,
    // Kept alive for the lifetime of the session loop.
    _roster: Arc<ArenaRoster<String, String>>,
    _router: Arc<CommandRouter>,
    _scheduler: Arc<Scheduler>,
}

impl Bot {
    pub fn new(cli: Cli) -> Result<Self> {
        let root: Arc<dyn Connection> = Arc::new(TcpConnection::new(ConnectionConfig::default().nodelay(true)));
        let paced: Arc<dyn Connection> = if cli.no_throttle {
            Arc::clone(&root)
        } else {
            let config = ThrottleConfig::default()
                .burst(cli.burst)
                .delay(Duration::from_millis(cli.delay_ms));
            MessageThrottle::with_config(Arc::clone(&root), config)?
        };
        let connection = PreprocessingConnection::new(paced);

        let dispatcher = Arc::new(EventDispatcher::new());
        let roster = Arc::new(ArenaRoster::<String, String>::new());
        let router = Arc::new(CommandRouter::new());
        let scheduler = Arc::new(Scheduler::new()?);

        dispatcher.register_handler(EventKind::Inbound, roster.clone());
        dispatcher.register_handler(EventKind::InboundChat, router.clone());
        dispatcher.register_handler(EventKind::LoginResponse, login_handler(cli.arena));
        dispatcher.register_handler(
            EventKind::EnteredArena,
            handler_fn(EventKind::EnteredArena, |event| {
                if let Some(Inbound::EnteredArena(entered)) = event.as_inbound().map(|inbound| inbound.detail()) {
                    info!(arena = entered.arena(), frequency = entered.frequency(), "entered arena");
                }
            }),
        );
        connection.register_preprocessor(dispatcher);

        register_commands(&router, &roster, &scheduler);

        let root_login = Arc::clone(&root);
        let outer: Arc<dyn Connection> = connection;
        let runner = SessionRunner::new(outer, cli.host, cli.port, cli.username, cli.password)
            .login_via(root_login)
            .backoff(ReconnectBackoff {
                initial_delay: Duration::from_secs(cli.reconnect_secs),
                max_delay: Duration::from_secs(cli.reconnect_secs.saturating_mul(6)),
            });
        Ok(Self {
            runner,
            _roster: roster,
            _router: router,
            _scheduler: scheduler,
        })
    }

    pub fn runner(&self) -> &SessionRunner { &self.runner }
}

/// Join the configured arena on success and give up on rejection.
fn login_handler(arena: Option<String>) -> Arc<dyn EventHandler> {
    handler_fn(EventKind::LoginResponse, move |event: &mut Event| {
        let Some(inbound) = event.as_inbound() else {
            return;
        };
        let Inbound::LoginResponse(response) = inbound.detail() else {
            return;
        };
        let connection = inbound.connection();
        if !response.accepted() {
            warn!(reason = response.response().unwrap_or_default(), "login rejected");
            connection.close();
            return;
        }
        info!(username = response.username().unwrap_or_default(), "logged in");
        let joined = match &arena {
            Some(arena) => connection.change_arena(arena),
            None => Ok(connection.change_arena_default()),
        };
        if let Err(error) = joined {
            warn!(%error, "cannot join the configured arena, using the default");
            connection.change_arena_default();
        }
    })
}

fn register_commands(router: &CommandRouter, roster: &Arc<ArenaRoster<String, String>>, scheduler: &Arc<Scheduler>) {
    let about: Arc<dyn CommandHandler> = Arc::new(|context: &CommandContext<'_>| {
        let text = format!("{} v{}: sample ChatNet bot", chatnet::CLIENT_NAME, env!("CARGO_PKG_VERSION"));
        if let Err(error) = context.reply(&text) {
            warn!(%error, "cannot answer !about");
        }
    });
    router.register_command("about", about);

    let help: Arc<dyn CommandHandler> = Arc::new(|context: &CommandContext<'_>| {
        for line in ["!about - who am I", "!help - this list", "!players - who is here"] {
            if let Err(error) = context.reply(line) {
                warn!(%error, "cannot answer !help");
                return;
            }
        }
    });
    router.register_command("help", help);

    let roster = Arc::clone(roster);
    let scheduler = Arc::clone(scheduler);
    let players: Arc<dyn CommandHandler> = Arc::new(move |context: &CommandContext<'_>| {
        let arena = roster.arena().unwrap_or_default();
        let count = roster.player_count();
        let connection = Arc::clone(context.connection());
        let sender = context.sender().to_owned();
        // Answer a moment later so the reply does not interleave with the command echo.
        scheduler.schedule(Duration::from_millis(500), move || {
            let text = format!("{count} players in {arena}");
            if let Err(error) = connection.send_private_message(&sender, &text) {
                warn!(%error, "cannot answer !players");
            }
        });
    });
    router.register_command("players", players);
}
