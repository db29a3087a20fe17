//! Control plane: id-less commands that act on the session registry.
//!
//! | method                              | effect                                    |
//! |-------------------------------------|-------------------------------------------|
//! | `help`                              | function signatures, then command list     |
//! | `broadcast`                         | text to every session, sender included     |
//! | `kick`                              | close every session but the sender         |
//! | `exit`, `quit`, `logout`, `logoff`  | close the sender                           |
//! | `shutdown`                          | close everything and stop the server       |
//!
//! Methods match exactly as received; anything else is handed back unhandled.

use conclave_protocol::{Notification, ServerMessage};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::registry::SessionHandle;
use crate::rpc::RpcContext;
use crate::rpc_helpers::display_arg;

pub const DISCONNECT_NOTICE: &str = "Disconnecting client...";
pub const SHUTDOWN_NOTICE: &str = "Server shutting down ...";

/// Commands listed by `help`, in the order they are shown.
pub const COMMANDS: [&str; 5] = ["help", "broadcast", "exit", "kick", "shutdown"];

#[derive(Debug, Clone, PartialEq)]
pub enum ControlOutcome {
    Handled,
    /// Not a control command; neither executed nor answered.
    Unhandled(Notification),
    /// The server has been told to stop.
    Shutdown,
}

/// Something that interprets notifications passed through by the dispatcher.
pub trait NotificationHandler: Send + Sync {
    fn handle(&self, origin: &SessionHandle, note: Notification) -> ControlOutcome;
}

pub struct ControlPlane {
    ctx: Arc<RpcContext>,
}

impl ControlPlane {
    pub fn new(ctx: Arc<RpcContext>) -> Self {
        Self { ctx }
    }

    fn help(&self, origin: &SessionHandle) {
        let functions = self.ctx.functions.signatures();
        origin.send(&ServerMessage::new(json!({ "functions": functions })));
        origin.send(&ServerMessage::new(json!({ "sudo": COMMANDS })));
    }

    fn broadcast(&self, origin: &SessionHandle, params: &Value) {
        let text = match params.as_array() {
            Some(parts) if !parts.is_empty() => {
                parts.iter().map(display_arg).collect::<Vec<_>>().join(" ")
            }
            _ => {
                debug!(session = %origin.id(), "Ignoring broadcast without text");
                return;
            }
        };
        let delivered = self.ctx.sessions.broadcast_all(&ServerMessage::text(text));
        debug!(session = %origin.id(), delivered, "Broadcast sent");
    }

    fn kick(&self, origin: &SessionHandle) {
        let closed = self
            .ctx
            .sessions
            .close_others(&ServerMessage::text(DISCONNECT_NOTICE), origin.id());
        info!(session = %origin.id(), closed, "Kicked other sessions");
    }

    fn exit(&self, origin: &SessionHandle) {
        origin.send(&ServerMessage::text(DISCONNECT_NOTICE));
        origin.close();
        debug!(session = %origin.id(), "Session asked to disconnect");
    }

    fn shutdown(&self, origin: &SessionHandle) {
        info!(session = %origin.id(), "Shutdown requested");
        self.ctx
            .sessions
            .broadcast_all(&ServerMessage::text(SHUTDOWN_NOTICE));
        self.ctx.sessions.close_all();
        self.ctx.shutdown.cancel();
    }
}

impl NotificationHandler for ControlPlane {
    fn handle(&self, origin: &SessionHandle, note: Notification) -> ControlOutcome {
        match note.method.as_str() {
            "help" => self.help(origin),
            "broadcast" => self.broadcast(origin, &note.params),
            "kick" => self.kick(origin),
            "exit" | "quit" | "logout" | "logoff" => self.exit(origin),
            "shutdown" => {
                self.shutdown(origin);
                return ControlOutcome::Shutdown;
            }
            _ => return ControlOutcome::Unhandled(note),
        }
        ControlOutcome::Handled
    }
}
