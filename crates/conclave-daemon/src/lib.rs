//! Conclave Daemon
//!
//! Library for running a JSON-RPC server over TCP: a registry of callable
//! functions, one session per connection, and a control plane for
//! multi-client coordination (help, broadcast, kick, exit, shutdown).

pub mod builtins;
pub mod control;
pub mod functions;
pub mod registry;
pub mod rpc;
pub mod rpc_helpers;
pub mod server;
pub mod session;

pub use control::{ControlOutcome, ControlPlane, NotificationHandler};
pub use functions::{Arity, CallError, Function, FunctionRegistry, FunctionResult};
pub use registry::{Outbound, SessionHandle, SessionId, SessionRegistry};
pub use rpc::{Dispatch, DispatchFailure, RpcContext, RpcDispatcher};
pub use server::Server;
pub use session::{handle_client, SessionServices};
