//! Per-connection session loop.
//!
//! Each accepted connection gets a reader (this task) and a writer task that
//! drains the session's outbound queue. Replies, broadcasts and close
//! requests all go through that queue, so every frame is written with a
//! single `write_all` and a slow peer never blocks anyone else.

use conclave_protocol::{Frame, FrameReader};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::control::{ControlOutcome, NotificationHandler};
use crate::registry::{Outbound, SessionHandle, SessionId, SessionRegistry};
use crate::rpc::{error_response, Dispatch, DispatchFailure, RpcContext, RpcDispatcher};

/// How long a closing session waits for its writer to flush before the
/// writer is aborted.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything a session needs, shared by all sessions of one server.
#[derive(Clone)]
pub struct SessionServices {
    pub ctx: Arc<RpcContext>,
    pub dispatcher: Arc<RpcDispatcher>,
    pub control: Option<Arc<dyn NotificationHandler>>,
    pub max_frame_bytes: usize,
}

/// Removes the session from the registry however the session ends.
struct Registration {
    sessions: Arc<SessionRegistry>,
    id: SessionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.sessions.remove(self.id);
    }
}

/// Serve one connection until EOF, a transport error, `exit`, or shutdown.
pub async fn handle_client<S>(stream: S, services: Arc<SessionServices>) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let cancel = services.ctx.shutdown.child_token();
    let (handle, outbound) = SessionHandle::new(cancel.clone());
    let id = handle.id();

    // A connection accepted while shutdown is already under way is closed
    // without ever becoming visible to the control plane.
    if cancel.is_cancelled() {
        return Ok(());
    }
    services.ctx.sessions.add(handle.clone());
    let _registration = Registration {
        sessions: services.ctx.sessions.clone(),
        id,
    };
    debug!(session = %id, "Session started");

    let (reader, writer) = tokio::io::split(stream);
    let mut writer_task = tokio::spawn(write_loop(writer, outbound, cancel.clone(), id));

    let result = read_loop(reader, &handle, &services, &cancel).await;

    cancel.cancel();
    match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(session = %id, "Writer task panicked: {}", e),
        Err(_) => {
            // peer is not reading; drop the connection with whatever is unsent
            debug!(session = %id, "Writer did not drain in time, aborting");
            writer_task.abort();
        }
    }
    debug!(session = %id, "Session closed");

    result
}

async fn read_loop<R>(
    reader: R,
    handle: &SessionHandle,
    services: &SessionServices,
    cancel: &CancellationToken,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut frames = FrameReader::new(reader, services.max_frame_bytes);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            next = frames.next_frame() => next,
        };

        let frame = match next {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!(session = %handle.id(), "Peer closed connection");
                return Ok(());
            }
            Err(e) => {
                debug!(session = %handle.id(), "Read error: {}", e);
                return Err(e);
            }
        };

        match frame {
            Frame::Line(line) if line.trim().is_empty() => continue,
            Frame::Line(line) => process_line(&line, handle, services),
            Frame::Oversized => {
                let failure = DispatchFailure::MalformedFrame("frame exceeds size limit");
                handle.send_envelope(&error_response(&failure, None));
            }
            Frame::InvalidUtf8 => {
                let failure = DispatchFailure::MalformedFrame("frame is not valid UTF-8");
                handle.send_envelope(&error_response(&failure, None));
            }
        }
    }
}

fn process_line(line: &str, handle: &SessionHandle, services: &SessionServices) {
    let note = match services.dispatcher.dispatch_frame(line) {
        Dispatch::Reply(envelope) => {
            handle.send_envelope(&envelope);
            return;
        }
        Dispatch::PassThrough(note) => note,
    };

    let Some(control) = services.control.as_ref() else {
        debug!(session = %handle.id(), method = %note.method, "Notification ignored");
        return;
    };
    match control.handle(handle, note) {
        ControlOutcome::Handled | ControlOutcome::Shutdown => {}
        ControlOutcome::Unhandled(note) => {
            debug!(session = %handle.id(), method = %note.method, "Unhandled notification");
        }
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut outbound: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
    id: SessionId,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        // Queued frames go out before a cancellation is honoured.
        let item = tokio::select! {
            biased;
            item = outbound.recv() => item,
            _ = cancel.cancelled() => None,
        };

        match item {
            Some(Outbound::Frame(line)) => {
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    debug!(session = %id, "Write error: {}", e);
                    break;
                }
            }
            Some(Outbound::Close) | None => break,
        }
    }

    let _ = writer.shutdown().await;
    cancel.cancel();
}
