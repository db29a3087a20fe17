// Conclave console - interactive line client for a Conclave daemon
//
// Every line typed is sent to the server; everything the server sends back,
// including broadcasts from other clients, is printed as it arrives.

use anyhow::{Context, Result};
use clap::Parser;
use conclave_config::ConfigLoader;
use conclave_daemon_client::console::{render, ConsoleCommand};
use conclave_daemon_client::ListeningClient;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "conclave")]
#[command(about = "Interactive console for a Conclave daemon", long_about = None)]
struct Cli {
    /// Server host (overrides config and CONCLAVE_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides config and CONCLAVE_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Config file (default: <config dir>/conclave/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = ConfigLoader::load(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?
        .client;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let (client, mut inbound) = ListeningClient::connect_with(&config)
        .await
        .with_context(|| format!("Failed to connect to {}", config.address()))?;
    let closed = client.closed();

    let printer = tokio::spawn(async move {
        while let Some(message) = inbound.recv().await {
            println!("{}", render(&message));
        }
    });

    println!(">>> Connected to {}", config.address());
    println!(">>> Type 'sudo help' for more information\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = closed.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        let sent = match ConsoleCommand::parse(&line) {
            Some(ConsoleCommand::Invoke { method, params }) => {
                client.invoke(&method, params).await.map(|_| ())
            }
            Some(ConsoleCommand::Notify { method, params }) => {
                client.notify(&method, params).await
            }
            None => continue,
        };
        if let Err(e) = sent {
            warn!("Send failed: {}", e);
            break;
        }
    }

    let _ = client.shutdown().await;
    let _ = printer.await;
    println!(">>> Console terminated");
    Ok(())
}
