//! Burstnet - Burst-redundant UDP game-state synchronization
//!
//! Command line front end for running a listener or joining one as a peer.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use burstnet::config::{self, Config};
use burstnet::network::{inbound_queue, resolve_target, Broadcaster, Inbound, ListenerConfig, ListenerHandle};
use burstnet::protocol::{self, GameState, GameUpdate, Request};

/// Burstnet - multiplayer state sync over UDP
#[derive(Parser)]
#[command(name = "burstnet")]
#[command(author = "Burstnet Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Burst-redundant UDP game-state synchronization", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive bursts and print every admitted update
    Listen {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Print one JSON object per update
        #[arg(long)]
        json: bool,
    },

    /// Join one or more listeners and keep the connection alive
    Join {
        /// Listener address (host or host:port), repeatable
        #[arg(short, long)]
        server: Vec<String>,

        /// Port used when an address has none
        #[arg(short, long)]
        port: Option<u16>,

        /// Peer name to announce
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show protocol information
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let filter = if cli.verbose || config.general.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Listen { port, json } => {
            run_listener(config, port, json).await?;
        }
        Commands::Join { server, port, name } => {
            run_peer(config, server, port, name).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        Commands::Info => {
            print_protocol_info();
        }
    }

    Ok(())
}

/// Run a listener until Ctrl+C
async fn run_listener(config: Config, port: Option<u16>, json: bool) -> anyhow::Result<()> {
    let mut listener_config = ListenerConfig::from(&config.network);
    if let Some(port) = port {
        listener_config.port = port;
    }

    let (inbound_tx, mut inbound_rx) = inbound_queue();
    let handle = ListenerHandle::spawn(listener_config.clone(), inbound_tx).await?;

    if !json {
        println!("\n========================================");
        println!("  Burstnet Listener Running");
        println!("========================================");
        println!("  Address: {}", handle.local_addr());
        println!("  Window: {} packets", protocol::WINDOW_SIZE);
        println!("  Peer timeout: {:?}", listener_config.peer_timeout);
        println!("========================================");
        println!("\nWaiting for peers to join...");
        println!("Press Ctrl+C to stop.\n");
    }

    loop {
        tokio::select! {
            Some(inbound) = inbound_rx.recv() => {
                print_inbound(&inbound, json)?;
            }
            _ = tokio::signal::ctrl_c() => {
                if !json {
                    println!("\nShutting down...");
                }
                break;
            }
        }
    }

    handle.stop().await?;
    tracing::info!("Listener stopped");

    Ok(())
}

#[derive(Serialize)]
struct UpdateLine<'a> {
    peer: &'a str,
    sequence: u64,
    request: String,
    update: Option<GameUpdate>,
}

fn print_inbound(inbound: &Inbound, json: bool) -> anyhow::Result<()> {
    let header = inbound.packet.header();
    let update = match header.request() {
        Request::Data => GameUpdate::from_payload(inbound.packet.payload()).ok(),
        _ => None,
    };

    if json {
        let line = UpdateLine {
            peer: &inbound.peer,
            sequence: header.sequence(),
            request: header.request().to_string(),
            update,
        };
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    match (header.request(), update) {
        (Request::Join, _) => println!("+ {} joined", inbound.peer),
        (Request::Leave, _) => println!("- {} left", inbound.peer),
        (_, Some(update)) => println!("{} #{}: {:?}", inbound.peer, header.sequence(), update),
        (request, None) => println!(
            "{} #{}: {} with {} byte payload",
            inbound.peer,
            header.sequence(),
            request,
            inbound.packet.payload().len()
        ),
    }

    Ok(())
}

/// Join listeners and heartbeat until Ctrl+C
async fn run_peer(
    config: Config,
    servers: Vec<String>,
    port: Option<u16>,
    name: Option<String>,
) -> anyhow::Result<()> {
    let port = port.unwrap_or(config.network.port);
    let servers = if servers.is_empty() {
        config.network.targets.clone()
    } else {
        servers
    };
    if servers.is_empty() {
        anyhow::bail!("Please specify --server address or set network.targets in the config");
    }

    let peer = name.unwrap_or_else(|| config.peer_name());
    let mut broadcaster = Broadcaster::bind(&peer, Vec::new()).await?;
    for server in &servers {
        broadcaster.add_target(resolve_target(server, port).await?);
    }

    broadcaster.join().await?;
    broadcaster
        .send_update(&GameUpdate::State(GameState::Waiting))
        .await?;

    println!("Joined {} as '{}'", servers.join(", "), peer);
    println!("Press Ctrl+C to leave.\n");

    let mut heartbeat =
        tokio::time::interval(Duration::from_millis(config.network.heartbeat_interval_ms));

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if let Err(e) = broadcaster.heartbeat().await {
                    tracing::warn!("Heartbeat failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nLeaving...");
                break;
            }
        }
    }

    broadcaster.leave().await?;
    let stats = broadcaster.stats();
    tracing::info!(
        "Sent {} packets in {} bursts ({} bytes)",
        stats.packets_produced,
        stats.bursts_sent,
        stats.bytes_sent
    );

    Ok(())
}

/// Print protocol information
fn print_protocol_info() {
    println!("Burstnet Protocol Information");
    println!("=============================\n");

    println!("Protocol Version: {}", protocol::PROTOCOL_VERSION);
    println!("Payload Version: {}", protocol::PAYLOAD_VERSION);
    println!("Default Port: {}", protocol::DEFAULT_PORT);
    println!("Window Size: {} packets", protocol::WINDOW_SIZE);
    println!("Packet Size: {} bytes", protocol::PACKET_SIZE);
    println!("Burst Size: {} bytes", protocol::BURST_SIZE);
    println!("Max Peer Name: {} bytes", protocol::PEER_NAME_MAX);
}
