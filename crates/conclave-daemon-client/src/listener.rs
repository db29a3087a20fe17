//! Client with an independent inbound listener.
//!
//! Only the listener task reads from the socket. Callers write through the
//! shared [`Connection`] and receive every inbound frame, replies and server
//! pushes alike, on a channel.

use conclave_config::ClientConfig;
use conclave_protocol::{FrameReader, RequestId, DEFAULT_MAX_FRAME_BYTES};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{ClientError, Connection, Inbound};

pub struct ListeningClient {
    conn: Arc<Connection>,
    closed: CancellationToken,
    listener: JoinHandle<()>,
}

impl ListeningClient {
    pub async fn connect(
        addr: impl ToSocketAddrs,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Inbound>), ClientError> {
        Self::connect_with_limit(addr, DEFAULT_MAX_FRAME_BYTES).await
    }

    pub async fn connect_with(
        config: &ClientConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Inbound>), ClientError> {
        Self::connect_with_limit(config.address(), config.max_frame_bytes).await
    }

    async fn connect_with_limit(
        addr: impl ToSocketAddrs,
        max_frame_bytes: usize,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Inbound>), ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let (read, write) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();

        let listener = tokio::spawn(listen(
            FrameReader::new(read, max_frame_bytes),
            tx,
            closed.clone(),
        ));

        let client = Self {
            conn: Arc::new(Connection::new(write)),
            closed,
            listener,
        };
        Ok((client, rx))
    }

    /// Send a request without waiting; the reply arrives on the inbound
    /// channel tagged with the returned id.
    pub async fn invoke(&self, method: &str, params: Value) -> Result<RequestId, ClientError> {
        self.conn.request(method, params).await
    }

    pub async fn notify(&self, method: &str, params: Value) -> Result<(), ClientError> {
        self.conn.notify(method, params).await
    }

    /// Cancelled once the server closes the connection or a read fails.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Stop listening and close the write side.
    pub async fn shutdown(self) -> Result<(), ClientError> {
        self.listener.abort();
        self.closed.cancel();
        self.conn.shutdown().await
    }
}

async fn listen(
    mut frames: FrameReader<OwnedReadHalf>,
    tx: mpsc::UnboundedSender<Inbound>,
    closed: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            frame = frames.next_frame() => frame,
        };

        match frame {
            Ok(Some(frame)) => {
                let inbound = Inbound::from_frame(frame);
                debug!("--> {:?}", inbound);
                if tx.send(inbound).is_err() {
                    // nobody is listening any more
                    break;
                }
            }
            Ok(None) => {
                debug!("Connection closed by server");
                break;
            }
            Err(e) => {
                debug!("Read error: {}", e);
                break;
            }
        }
    }
    closed.cancel();
}
