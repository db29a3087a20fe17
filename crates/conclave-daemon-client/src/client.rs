//! Daemon client implementation

use conclave_config::ClientConfig;
use conclave_protocol::{
    decode_value, encode_request, Envelope, Frame, FrameReader, RequestId, RpcError,
    ServerMessage, DEFAULT_MAX_FRAME_BYTES, INVALID_PARAMS, METHOD_NOT_FOUND,
};
use serde_json::Value;
use std::io;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("connection closed by server")]
    Closed,

    #[error("method not found: {0}")]
    MethodNotFound(RpcError),

    #[error("invalid params: {0}")]
    InvalidParams(RpcError),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("unreadable reply: {0}")]
    Malformed(String),
}

impl ClientError {
    /// Map a wire error to the matching local failure.
    pub fn from_rpc(error: RpcError) -> Self {
        match error.code {
            METHOD_NOT_FOUND => ClientError::MethodNotFound(error),
            INVALID_PARAMS => ClientError::InvalidParams(error),
            code => ClientError::Rpc {
                code,
                message: error.message,
            },
        }
    }

    /// Wire code carried by the failure, if it came from the server.
    pub fn code(&self) -> Option<i64> {
        match self {
            ClientError::MethodNotFound(e) | ClientError::InvalidParams(e) => Some(e.code),
            ClientError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Write side shared by [`Client`] and [`crate::ListeningClient`]: request
/// ids plus whole-frame writes.
pub struct Connection {
    writer: Mutex<OwnedWriteHalf>,
    next_id: AtomicI64,
}

impl Connection {
    pub(crate) fn new(writer: OwnedWriteHalf) -> Self {
        Self {
            writer: Mutex::new(writer),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn next_id(&self) -> RequestId {
        RequestId::from(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Write one envelope as a single frame.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), ClientError> {
        let line = envelope.to_json_line()?;
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        debug!("<-- {}", line.trim_end());
        Ok(())
    }

    /// Send a request and return the id it was sent with.
    pub async fn request(&self, method: &str, params: Value) -> Result<RequestId, ClientError> {
        let id = self.next_id();
        self.send(&encode_request(method, params, Some(id.clone())))
            .await?;
        Ok(id)
    }

    /// Send an id-less message. No reply is read.
    pub async fn notify(&self, method: &str, params: Value) -> Result<(), ClientError> {
        self.send(&encode_request(method, params, None)).await
    }

    /// Close the write side.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.writer.lock().await.shutdown().await?;
        Ok(())
    }
}

/// Inbound frame, sorted into what a client cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Result or error for an earlier request.
    Response(Envelope),
    /// Control-plane output pushed by the server.
    Push(ServerMessage),
    /// Anything else, kept as received.
    Malformed(String),
}

impl Inbound {
    pub fn classify(line: &str) -> Self {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(_) => return Inbound::Malformed(line.to_string()),
        };

        if let Some(obj) = value.as_object() {
            if !obj.contains_key("jsonrpc") {
                if let Some(message) = obj.get("message") {
                    return Inbound::Push(ServerMessage::new(message.clone()));
                }
            }
        }

        match decode_value(value) {
            Ok(envelope) if envelope.is_response() => Inbound::Response(envelope),
            _ => Inbound::Malformed(line.to_string()),
        }
    }

    pub(crate) fn from_frame(frame: Frame) -> Self {
        match frame {
            Frame::Line(line) => Inbound::classify(&line),
            Frame::Oversized => Inbound::Malformed("<frame exceeds size limit>".to_string()),
            Frame::InvalidUtf8 => Inbound::Malformed("<frame is not valid UTF-8>".to_string()),
        }
    }
}

/// Request/response client: each `invoke` reads exactly the reply to its
/// own request.
pub struct Client {
    conn: Connection,
    frames: Mutex<FrameReader<OwnedReadHalf>>,
}

impl Client {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        Self::connect_with_limit(addr, DEFAULT_MAX_FRAME_BYTES).await
    }

    pub async fn connect_with(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::connect_with_limit(config.address(), config.max_frame_bytes).await
    }

    async fn connect_with_limit(
        addr: impl ToSocketAddrs,
        max_frame_bytes: usize,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let (read, write) = stream.into_split();
        Ok(Self {
            conn: Connection::new(write),
            frames: Mutex::new(FrameReader::new(read, max_frame_bytes)),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Call a remote function and wait for its result.
    ///
    /// Server pushes that arrive first are logged and skipped. Array params
    /// that are digit-only strings are sent as integers.
    pub async fn invoke(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let mut frames = self.frames.lock().await;
        let id = self.conn.request(method, params).await?;

        loop {
            let frame = frames.next_frame().await?.ok_or(ClientError::Closed)?;
            match Inbound::from_frame(frame) {
                Inbound::Response(envelope) => {
                    // a null id is the server failing to read our request
                    if envelope.id().is_some_and(|got| *got != id) {
                        warn!("Skipping reply for request {:?}", envelope.id());
                        continue;
                    }
                    return match envelope {
                        Envelope::Result(res) => Ok(res.result),
                        Envelope::Error(err) => Err(ClientError::from_rpc(err.error)),
                        other => Err(ClientError::Malformed(format!("{:?}", other))),
                    };
                }
                Inbound::Push(message) => {
                    debug!("Skipping server message: {}", message.message);
                }
                Inbound::Malformed(raw) => return Err(ClientError::Malformed(raw)),
            }
        }
    }

    pub async fn notify(&self, method: &str, params: Value) -> Result<(), ClientError> {
        self.conn.notify(method, params).await
    }

    /// Send `exit` and close the write side.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.notify("exit", Value::Array(Vec::new())).await?;
        self.conn.shutdown().await
    }
}
