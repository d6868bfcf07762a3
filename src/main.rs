//! forwarded-identity server.
//!
//! ```text
//!     Client ──▶ trusted proxy ──X-Forwarded-For──▶ ┌──────────────────────────┐
//!                                                   │ net: ConnectionInfo      │
//!                                                   │ http: ForwardedLayer     │
//!                                                   │   scope resolver (hot)   │
//!                                                   │   forward: apply/restore │
//!                                                   │ echo handler             │
//!                                                   └──────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use forwarded_identity::config::watcher::ConfigWatcher;
use forwarded_identity::config::{load_config, ServerConfig};
use forwarded_identity::lifecycle::wait_for_signal;
use forwarded_identity::observability::{logging, metrics};
use forwarded_identity::HttpServer;

#[derive(Parser)]
#[command(name = "forwarded-identity")]
#[command(
    about = "HTTP server that attributes requests to the client behind trusted proxies",
    long_about = None
)]
struct Cli {
    /// TOML config file; watched for changes to the forwarding rules
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "forwarded-identity starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        forwarders = config.forwarding.forwarder.len(),
        scopes = config.forwarding.scopes.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    // The watcher handle must outlive the server.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let stop = async move {
        let _ = stop_rx.await;
    };
    let shutdown_grace = Duration::from_secs(config.timeouts.shutdown_secs);
    let server = HttpServer::new(config)?;
    let mut server_task = tokio::spawn(server.run(listener, config_updates, stop));

    tokio::select! {
        res = &mut server_task => return Ok(res??),
        signal = wait_for_signal() => {
            tracing::info!(signal = signal?, "stopping");
            let _ = stop_tx.send(());
        }
    }

    match tokio::time::timeout(shutdown_grace, server_task).await {
        Ok(res) => res??,
        Err(_) => tracing::warn!(
            grace_secs = shutdown_grace.as_secs(),
            "in-flight requests did not drain in time, exiting"
        ),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
