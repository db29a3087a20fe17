//! Shared test harness: an in-process server on an ephemeral port.

#![allow(dead_code)]

use conclave_config::ServerConfig;
use conclave_daemon::{builtins, FunctionRegistry, Server, SessionRegistry};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestDaemon {
    pub addr: SocketAddr,
    pub sessions: Arc<SessionRegistry>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<anyhow::Result<()>>>,
}

impl TestDaemon {
    /// Start a server with the builtin namespace and the control plane.
    pub async fn start() -> anyhow::Result<Self> {
        let mut functions = FunctionRegistry::new();
        functions.register_all(builtins::namespace());
        Self::start_with(functions, true).await
    }

    pub async fn start_with(functions: FunctionRegistry, control: bool) -> anyhow::Result<Self> {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        };
        let mut server = Server::bind(&config, functions).await?;
        if !control {
            server = server.without_control_plane();
        }
        let addr = server.local_addr()?;
        let sessions = server.sessions();
        let shutdown = server.shutdown_handle();
        let task = tokio::spawn(server.run());

        Ok(Self {
            addr,
            sessions,
            shutdown,
            task: Some(task),
        })
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub async fn connect(&self) -> anyhow::Result<TestClient> {
        TestClient::connect(self.addr).await
    }

    /// Wait until the registry holds `n` sessions.
    pub async fn wait_for_sessions(&self, n: usize) {
        tokio::time::timeout(TIMEOUT, async {
            while self.sessions.len() != n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {} sessions, have {}", n, self.sessions.len()));
    }

    /// Wait for the server task to finish on its own.
    pub async fn wait_stopped(&mut self) -> anyhow::Result<()> {
        if let Some(task) = self.task.take() {
            tokio::time::timeout(TIMEOUT, task).await???;
        }
        Ok(())
    }

    pub async fn stop(&mut self) -> anyhow::Result<()> {
        self.shutdown.cancel();
        self.wait_stopped().await
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Line-oriented raw client.
pub struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    pub async fn send_raw(&mut self, raw: &str) -> anyhow::Result<()> {
        self.writer.write_all(raw.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    pub async fn send(&mut self, value: &Value) -> anyhow::Result<()> {
        self.send_raw(&value.to_string()).await
    }

    /// Next inbound frame, or `None` once the server has closed the
    /// connection.
    pub async fn recv(&mut self) -> anyhow::Result<Option<Value>> {
        let line = tokio::time::timeout(TIMEOUT, self.lines.next_line()).await??;
        match line {
            Some(line) => Ok(Some(serde_json::from_str(&line)?)),
            None => Ok(None),
        }
    }

    /// Send a request and read its reply.
    pub async fn rpc(&mut self, method: &str, params: Value, id: i64) -> anyhow::Result<Value> {
        self.send(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        }))
        .await?;
        self.recv()
            .await?
            .ok_or_else(|| anyhow::anyhow!("connection closed before reply"))
    }

    /// Send an id-less control command.
    pub async fn command(&mut self, method: &str, params: Value) -> anyhow::Result<()> {
        self.send(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        }))
        .await
    }

    /// Assert that the server closes this connection.
    pub async fn expect_closed(&mut self) {
        loop {
            match self.recv().await {
                Ok(None) => return,
                Ok(Some(_)) => continue,
                Err(e) if e.is::<tokio::time::error::Elapsed>() => {
                    panic!("connection was not closed")
                }
                // reset by peer also counts as closed
                Err(_) => return,
            }
        }
    }
}
