//! RPC context holding shared state for handlers

use crate::functions::FunctionRegistry;
use crate::registry::SessionRegistry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct RpcContext {
    pub functions: Arc<FunctionRegistry>,
    pub sessions: Arc<SessionRegistry>,
    /// Cancelled once, by the `shutdown` command or the host process.
    pub shutdown: CancellationToken,
}

impl RpcContext {
    pub fn new(
        functions: Arc<FunctionRegistry>,
        sessions: Arc<SessionRegistry>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            functions,
            sessions,
            shutdown,
        }
    }
}
