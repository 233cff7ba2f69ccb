use bot::network::Client;
use clap::Parser;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server WebSocket URL
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080")]
    server: String,

    /// Game to play in
    #[arg(short, long)]
    game_id: String,

    /// Identity the server assigned to this bot
    #[arg(short, long)]
    identity: String,

    /// One-time connect ticket
    #[arg(short, long)]
    ticket: String,

    /// Pause before each move in milliseconds
    #[arg(long, default_value = "400")]
    think_ms: u64,

    /// Seed for reproducible play
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Starting bot {} for game {}", args.identity, args.game_id);
    info!("Connecting to: {}", args.server);

    let mut client = Client::new(
        &args.server,
        &args.game_id,
        &args.identity,
        &args.ticket,
        Duration::from_millis(args.think_ms),
        args.seed,
    )?;

    client.run().await?;

    Ok(())
}
