use clap::Parser;
use log::{error, info};
use server::config::{default_bot_program, ServerConfig};
use server::network::Server;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Capacity of competitive games, bots included
    #[arg(short, long, default_value = "4")]
    max_players: usize,

    /// Evict games idle this long with nobody connected
    #[arg(long, default_value = "600")]
    idle_timeout_secs: u64,

    /// How often to look for idle games
    #[arg(long, default_value = "30")]
    sweep_interval_secs: u64,

    /// Delay between a termination notice and closing the game
    #[arg(long, default_value = "100")]
    termination_flush_ms: u64,

    /// Bot worker executable (defaults to sweeper-bot next to this binary)
    #[arg(long)]
    bot_program: Option<PathBuf>,

    /// Kill bots that have not connected after this long
    #[arg(long, default_value = "10")]
    bot_connect_timeout_secs: u64,

    /// Grace period before a bot is force-killed
    #[arg(long, default_value = "2000")]
    bot_kill_grace_ms: u64,

    /// Bot pause before each move
    #[arg(long, default_value = "400")]
    bot_think_ms: u64,

    /// Accepted token, as TOKEN=USER or TOKEN=USER:Display Name (repeatable)
    #[arg(short, long = "token")]
    tokens: Vec<String>,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            max_players: args.max_players,
            idle_timeout: Duration::from_secs(args.idle_timeout_secs),
            sweep_interval: Duration::from_secs(args.sweep_interval_secs.max(1)),
            termination_flush: Duration::from_millis(args.termination_flush_ms),
            bot_program: args.bot_program.unwrap_or_else(default_bot_program),
            bot_args: Vec::new(),
            bot_connect_timeout: Duration::from_secs(args.bot_connect_timeout_secs),
            bot_kill_grace: Duration::from_millis(args.bot_kill_grace_ms),
            bot_think_time: Duration::from_millis(args.bot_think_ms),
            tokens: args.tokens,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from(Args::parse());
    info!("Starting minesweeper server on {}", config.address());
    info!("Bot worker: {}", config.bot_program.display());

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Accept loop failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    server.hub().shutdown().await;
    info!("Server stopped");
    Ok(())
}
