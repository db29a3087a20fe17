// Conclave Server - JSON-RPC function registry over TCP
//
// Serves the builtin namespace (hello, greet, add, sub, mul, div) and the
// control plane until a client sends `shutdown` or the process gets Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use conclave_config::ConfigLoader;
use conclave_daemon::{builtins, FunctionRegistry, Server};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "conclave-server")]
#[command(about = "Serve registered functions over JSON-RPC", long_about = None)]
struct Cli {
    /// Address to bind (overrides config and CONCLAVE_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config and CONCLAVE_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Config file (default: <config dir>/conclave/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting conclave-server v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ConfigLoader::load(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?
        .server;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let mut functions = FunctionRegistry::new();
    functions.register_all(builtins::namespace());

    let server = Server::bind(&config, functions).await?;
    let shutdown = server.shutdown_handle();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                result = tokio::signal::ctrl_c() => {
                    match result {
                        Ok(()) => {
                            info!("Interrupted, shutting down");
                            shutdown.cancel();
                        }
                        Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
                    }
                }
            }
        }
    });

    server.run().await
}
