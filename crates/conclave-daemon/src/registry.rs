//! Session registry for connected peers.
//!
//! Tracks every live session so the control plane can broadcast to, or close,
//! sessions other than the one it is serving. Membership changes and
//! snapshots serialize on a single lock; sends happen outside it.

use conclave_protocol::{Envelope, ServerMessage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Frames a session may have queued before it counts as a slow consumer.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 1024;

/// Counter for generating unique session IDs.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connected session.
///
/// IDs are never reused within a server process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Work item for a session's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// One complete, newline-terminated frame.
    Frame(Arc<str>),
    /// Flush what is queued, then close the connection.
    Close,
}

/// Cheap, cloneable handle to one session's outbound queue.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    tx: mpsc::Sender<Outbound>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Create a handle and the receiver its writer task drains.
    pub fn new(cancel: CancellationToken) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let handle = Self {
            id: SessionId::new(),
            tx,
            cancel,
        };
        (handle, rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Queue a control-plane message. Returns false if the session is gone.
    pub fn send(&self, message: &ServerMessage) -> bool {
        match message.to_json_line() {
            Ok(line) => self.send_line(line.into()),
            Err(e) => {
                warn!(session = %self.id, "Failed to encode message: {}", e);
                false
            }
        }
    }

    /// Queue an RPC envelope. Returns false if the session is gone.
    pub fn send_envelope(&self, envelope: &Envelope) -> bool {
        match envelope.to_json_line() {
            Ok(line) => self.send_line(line.into()),
            Err(e) => {
                warn!(session = %self.id, "Failed to encode envelope: {}", e);
                false
            }
        }
    }

    /// Queue an already-encoded frame.
    ///
    /// A peer that lets its queue fill up is closed rather than buffered
    /// without limit.
    pub fn send_line(&self, line: Arc<str>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        match self.tx.try_send(Outbound::Frame(line)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(session = %self.id, "Outbound queue full, closing slow session");
                self.cancel.cancel();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Stop serving the session. Frames already queued are still flushed
    /// while the writer's drain window lasts; the reader stops at once.
    pub fn close(&self) {
        // a full queue drops the marker; cancellation still ends the writer
        let _ = self.tx.try_send(Outbound::Close);
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

/// Registry of live sessions.
///
/// Thread-safe; every operation takes the one internal lock. Fan-out works
/// on a snapshot so a session closing mid-broadcast never disturbs the
/// iteration.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<Vec<SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. Returns false if it was already registered.
    pub fn add(&self, handle: SessionHandle) -> bool {
        let mut sessions = self.sessions.lock();
        if sessions.iter().any(|s| s.id == handle.id) {
            return false;
        }
        debug!(session = %handle.id, "Session registered");
        sessions.push(handle);
        true
    }

    /// Remove a session. Safe to call more than once.
    pub fn remove(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|s| s.id != id);
        let removed = sessions.len() != before;
        if removed {
            debug!(session = %id, "Session removed");
        }
        removed
    }

    pub fn snapshot(&self) -> Vec<SessionHandle> {
        self.sessions.lock().clone()
    }

    /// Send to every session, the origin included. Returns how many sessions
    /// accepted the message.
    pub fn broadcast_all(&self, message: &ServerMessage) -> usize {
        self.fan_out(message, |_| true)
    }

    /// Send to every session except `exclude`.
    pub fn broadcast_others(&self, message: &ServerMessage, exclude: SessionId) -> usize {
        self.fan_out(message, |s| s.id != exclude)
    }

    /// Notify and close every session except `keep`. Returns how many were
    /// closed.
    pub fn close_others(&self, notice: &ServerMessage, keep: SessionId) -> usize {
        let targets: Vec<SessionHandle> = self
            .snapshot()
            .into_iter()
            .filter(|s| s.id != keep)
            .collect();
        for session in &targets {
            session.send(notice);
            session.close();
        }
        targets.len()
    }

    /// Drain the registry and close every session.
    pub fn close_all(&self) -> usize {
        let drained: Vec<SessionHandle> = std::mem::take(&mut *self.sessions.lock());
        for session in &drained {
            session.close();
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.lock().iter().map(|s| s.id).collect()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.lock().iter().any(|s| s.id == id)
    }

    fn fan_out(&self, message: &ServerMessage, include: impl Fn(&SessionHandle) -> bool) -> usize {
        let line: Arc<str> = match message.to_json_line() {
            Ok(line) => line.into(),
            Err(e) => {
                warn!("Failed to encode broadcast: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        for session in self.snapshot().iter().filter(|s| include(s)) {
            if session.send_line(line.clone()) {
                delivered += 1;
            } else {
                debug!(session = %session.id, "Dropped broadcast to closing session");
            }
        }
        delivered
    }
}
