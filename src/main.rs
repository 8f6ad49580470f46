//! Sample bot built on `chatnet`.
//!
//! Connects, logs in, joins an arena and answers a few chat commands until
//! interrupted.

mod bot;
mod cli;

use std::{process::ExitCode, thread};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

fn watch_ctrl_c(token: CancellationToken) {
    let spawned = thread::Builder::new()
        .name("chatnet-signal".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_io().build() {
                Ok(runtime) => runtime,
                Err(error) => {
                    warn!(%error, "cannot watch for Ctrl-C");
                    return;
                }
            };
            runtime.block_on(async {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(error) = result {
                            warn!(%error, "cannot watch for Ctrl-C");
                            return;
                        }
                        info!("interrupted, shutting down");
                        token.cancel();
                    }
                    () = token.cancelled() => {}
                }
            });
        });
    if let Err(error) = spawned {
        warn!(%error, "cannot spawn the signal watcher");
    }
}

fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let bot = match bot::Bot::new(cli) {
        Ok(bot) => bot,
        Err(error) => {
            error!(%error, "cannot start the bot");
            return ExitCode::FAILURE;
        }
    };
    let token = bot.runner().cancellation_token();
    watch_ctrl_c(token.clone());

    let outcome = bot.runner().run();
    token.cancel();
    match outcome {
        Ok(()) => {
            info!("shut down");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!(%error, "session loop failed");
            ExitCode::FAILURE
        }
    }
}
