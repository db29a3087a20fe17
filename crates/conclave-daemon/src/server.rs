//! TCP server for JSON-RPC

use anyhow::{Context, Result};
use conclave_config::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::control::{ControlPlane, NotificationHandler};
use crate::functions::FunctionRegistry;
use crate::registry::SessionRegistry;
use crate::rpc::{RpcContext, RpcDispatcher};
use crate::session::{handle_client, SessionServices};

/// How long `run` waits for sessions to finish after shutdown.
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Server that listens on a TCP socket
pub struct Server {
    listener: TcpListener,
    services: SessionServices,
    tracker: TaskTracker,
}

impl Server {
    /// Bind to the configured address and serve `functions` with the
    /// control plane enabled.
    pub async fn bind(config: &ServerConfig, functions: FunctionRegistry) -> Result<Self> {
        let address = config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {}", address))?;

        let functions = Arc::new(functions);
        let ctx = Arc::new(RpcContext::new(
            functions.clone(),
            Arc::new(SessionRegistry::new()),
            CancellationToken::new(),
        ));
        let control: Arc<dyn NotificationHandler> = Arc::new(ControlPlane::new(ctx.clone()));

        info!(
            "Listening on {} with {} function(s)",
            listener.local_addr()?,
            functions.len()
        );
        Ok(Self {
            listener,
            services: SessionServices {
                ctx,
                dispatcher: Arc::new(RpcDispatcher::new(functions)),
                control: Some(control),
                max_frame_bytes: config.max_frame_bytes,
            },
            tracker: TaskTracker::new(),
        })
    }

    /// Serve the registry only; notifications are never acted on.
    pub fn without_control_plane(mut self) -> Self {
        self.services.control = None;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Token that stops the server when cancelled. The `shutdown` command
    /// cancels the same token.
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.services.ctx.shutdown.clone()
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        self.services.ctx.sessions.clone()
    }

    /// Accept connections until shutdown, then close every session and wait
    /// for them to finish.
    pub async fn run(self) -> Result<()> {
        let Self {
            listener,
            services,
            tracker,
        } = self;
        let shutdown = services.ctx.shutdown.clone();
        let services = Arc::new(services);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            info!("Client connected: {}", peer);
                            if let Err(e) = stream.set_nodelay(true) {
                                debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
                            }
                            let services = services.clone();
                            tracker.spawn(async move {
                                if let Err(e) = handle_client(stream, services).await {
                                    debug!("Client {} error: {}", peer, e);
                                }
                                info!("Client disconnected: {}", peer);
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
            }
        }

        // No new connections from here on.
        drop(listener);
        let closed = services.ctx.sessions.close_all();
        debug!("Closed {} remaining session(s)", closed);

        tracker.close();
        match tokio::time::timeout(SESSION_DRAIN_TIMEOUT, tracker.wait()).await {
            Ok(()) => debug!("All sessions finished"),
            Err(_) => warn!("Sessions did not finish within timeout"),
        }

        info!("Server stopped");
        Ok(())
    }
}
