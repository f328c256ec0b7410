#![forbid(unsafe_code)]
//! TallyChain node: serves the ledger over HTTP and reconciles with peers.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tallychain::api::run_api_server;
use tallychain::config::{load_config_from, DEFAULT_CONFIG_PATH};
use tallychain::network::HttpChainFetcher;
use tallychain::node::Node;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tally-node", version, about = "Run a TallyChain node")]
struct Args {
    /// Port to listen on (overrides network.api_port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Leading zero hex digits required of a proof (overrides miner.difficulty)
    #[arg(long)]
    difficulty: Option<u8>,

    /// Peer address to register at startup; may be repeated
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = load_config_from(&args.config)?;
    if let Some(port) = args.port {
        config.network.api_port = port;
    }
    if let Some(difficulty) = args.difficulty {
        config.miner.difficulty = difficulty;
    }
    config.network.bootstrap_peers.extend(args.peers);

    let node = Arc::new(Node::from_config(&config)?);
    info!(
        node_id = %node.node_id(),
        difficulty = config.miner.difficulty,
        "starting TallyChain node"
    );

    for peer in &config.network.bootstrap_peers {
        if let Err(e) = node.register_peer(peer).await {
            warn!(peer = %peer, error = %e, "ignoring bootstrap peer");
        }
    }

    let fetcher = Arc::new(HttpChainFetcher::new(
        config.fetch_timeout(),
        config.network.max_chain_bytes,
    ));
    let shutdown = {
        let node = node.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                return;
            }
            let cancelled = node.cancel_mining();
            info!(cancelled, "shutdown signal received");
        }
    };

    run_api_server(node, fetcher, config.network.api_port, shutdown).await
}
