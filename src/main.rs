//! `browser-broker`: multiplexes many automation clients onto one running
//! Chrome instance over the debug protocol.

use std::path::PathBuf;

use browser_broker::{Broker, BrokerConfigBuilder};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "browser-broker", version, about = "Multi-tenant browser automation broker")]
struct Cli {
    /// Chrome DevTools Protocol debug port to attach to.
    #[arg(long)]
    debug_port: Option<u16>,

    /// Port the light backend health probe polls.
    #[arg(long)]
    light_backend_port: Option<u16>,

    /// Unix domain socket path workers connect to.
    #[arg(long)]
    ipc_socket_path: Option<PathBuf>,

    /// Maximum concurrent sessions.
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Enable per-session cookie/localStorage persistence.
    #[arg(long)]
    storage_state: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut builder = BrokerConfigBuilder::from_env()?;
    if let Some(port) = cli.debug_port {
        builder = builder.debug_port(port);
    }
    if let Some(port) = cli.light_backend_port {
        builder = builder.light_backend_port(port);
    }
    if let Some(max) = cli.max_sessions {
        builder = builder.max_sessions(max);
    }
    if let Some(path) = cli.ipc_socket_path {
        builder = builder.ipc_socket_path(path);
    }
    if cli.storage_state {
        builder = builder.storage_state_enabled(true);
    }
    let config = builder.build()?;

    tracing::info!(debug_port = config.debug_port(), "starting browser broker");
    let broker = Broker::start(config).await?;
    broker.serve().await?;
    Ok(())
}
