//! Command line interface for the sample `chatnet` bot.

use clap::Parser;

/// Command line arguments for the `chatnet` binary.
#[derive(Debug, Parser)]
#[command(name = "chatnet", version, about = "Sample ChatNet bot")]
pub struct Cli {
    /// Server host name or address.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port.
    #[arg(short, long, default_value_t = 5005)]
    pub port: u16,

    /// Account name to log in with.
    #[arg(short, long)]
    pub username: String,

    /// Account password.
    #[arg(short = 'w', long, env = "CHATNET_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Arena to join after login. Joins the default arena when omitted.
    #[arg(short, long)]
    pub arena: Option<String>,

    /// Send chat without pacing.
    #[arg(long)]
    pub no_throttle: bool,

    /// Messages per burst (0 for no bound).
    #[arg(long, default_value_t = 3)]
    pub burst: u32,

    /// Pause between bursts, in milliseconds.
    #[arg(long, default_value_t = 1250)]
    pub delay_ms: u64,

    /// Seconds to wait before reconnecting.
    #[arg(long, default_value_t = 10)]
    pub reconnect_secs: u64,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn parses_connection_options() {
        let cli = Cli::parse_from([
            "chatnet", "--host", "chat.example.net", "-u", "Bot", "-w", "secret", "--arena", "duel",
        ]);
        assert_eq!(cli.host, "chat.example.net");
        assert_eq!(cli.port, 5005);
        assert_eq!(cli.username, "Bot");
        assert_eq!(cli.arena.as_deref(), Some("duel"));
        assert!(!cli.no_throttle);
        assert_eq!((cli.burst, cli.delay_ms), (3, 1250));
    }

    #[test]
    fn credentials_are_required() {
        assert!(Cli::try_parse_from(["chatnet", "--host", "localhost"]).is_err());
    }
}
