use clap::Parser;
use server::network::Server;
use server::registry::MatchRegistry;
use shared::MatchConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Command line arguments.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Rounds per match
    #[clap(long, default_value = "10")]
    rounds: u32,
    /// Per-turn time budget in seconds
    #[clap(long, default_value = "60")]
    turn_seconds: u64,
    /// Pattern-card selection budget in seconds
    #[clap(long, default_value = "45")]
    selection_seconds: u64,
    /// Dice-draft and ack-barrier budget in seconds
    #[clap(long, default_value = "20")]
    draft_seconds: u64,
    /// Lobby countdown after the second player joins, in seconds
    #[clap(long, default_value = "30")]
    join_seconds: u64,
    /// Liveness poll interval in milliseconds
    #[clap(long, default_value = "2000")]
    poll_interval_ms: u64,
    /// Seconds of datagram silence before a client counts as gone
    #[clap(long, default_value = "15")]
    client_timeout: u64,
    /// Directory for per-match history dumps (omit to disable)
    #[clap(long)]
    history_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = MatchConfig {
        rounds: args.rounds,
        turn_seconds: args.turn_seconds,
        selection_seconds: args.selection_seconds,
        draft_seconds: args.draft_seconds,
        join_seconds: args.join_seconds,
        poll_interval_ms: args.poll_interval_ms,
        ..MatchConfig::default()
    };
    if let Some(dir) = &args.history_dir {
        std::fs::create_dir_all(dir)?;
    }
    let registry = MatchRegistry::new(config, args.history_dir.clone());

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(
        &address,
        registry,
        Duration::from_secs(args.client_timeout),
    )
    .await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    }
}
