#![cfg_attr(not(test), deny(clippy::panic))]

use std::net::SocketAddr;
use std::sync::Arc;

use card_duel_server::config;
use card_duel_server::logging;
use card_duel_server::server::GameServer;
use card_duel_server::store::MemoryStore;
use clap::Parser;

/// Card Duel -- line-delimited TCP server for two-player card duels
#[derive(Parser, Debug)]
#[command(name = "card-duel-server")]
#[command(about = "TCP coordination server for a two-player turn-based card duel")]
#[command(version)]
struct Cli {
    /// Validate the effective configuration and exit without serving.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the effective configuration as JSON and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    if cli.validate_config {
        println!("Configuration OK");
        println!();
        println!("  Port: {}", cfg.port);
        println!("  Heartbeat timeout: {}s", cfg.server.heartbeat_timeout);
        println!("  Turn duration: {}s", cfg.server.turn_duration);
        println!("  Initial health: {}", cfg.game.initial_health);
        println!("  Max hand cards: {}", cfg.game.max_hand_cards);
        println!("  Store address: {}", cfg.store.effective_addr());
        return Ok(());
    }

    logging::init(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(
        %addr,
        store_addr = cfg.store.effective_addr(),
        "Starting card duel server"
    );

    // The shipped credential/catalog repository is in-memory; deployments
    // with a relational backend plug their own DuelStore in here.
    let store = Arc::new(MemoryStore::with_default_seed());
    let server = GameServer::new(cfg, store).await?;

    server.spawn_sweeper();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    server.serve(listener).await
}
