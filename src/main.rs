//! chacoin node binary
//!
//! Starts the ledger engine and serves the REST API and websocket fan-out.

use chacoin::api::{create_router, ApiState};
use chacoin::node::{ChainBroadcaster, Node};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Parser)]
#[command(name = "chacoin")]
#[command(version)]
#[command(about = "A minimal proof-of-work cryptocurrency node", long_about = None)]
struct Cli {
    /// Address to bind the HTTP listener on
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port for the REST API and websocket endpoint
    #[arg(short, long, default_value = "3000")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let broadcaster = Arc::new(ChainBroadcaster::new());
    let node = Arc::new(RwLock::new(Node::new(broadcaster.clone())));
    let state = ApiState { node, broadcaster };
    let app = create_router(state);

    let addr = format!("{}:{}", cli.bind, cli.port);
    log::info!("node listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            log::info!("shutting down");
        })
        .await?;

    Ok(())
}
