//! Turns decoded frames into replies.
//!
//! The dispatcher only ever consults the function registry. Notifications are
//! handed back untouched so a control plane (or nothing) can act on them.

use conclave_protocol::{decode, encode_result, DecodeError, Envelope, Notification, Request};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

use super::error::{error_response, DispatchFailure};
use crate::functions::FunctionRegistry;

/// What the session should do with one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Write this envelope back to the sender.
    Reply(Envelope),
    /// Well-formed id-less message; not answered at this layer.
    PassThrough(Notification),
}

pub struct RpcDispatcher {
    functions: Arc<FunctionRegistry>,
}

impl RpcDispatcher {
    pub fn new(functions: Arc<FunctionRegistry>) -> Self {
        Self { functions }
    }

    /// Decode and dispatch one raw frame.
    pub fn dispatch_frame(&self, raw: &str) -> Dispatch {
        self.dispatch(decode(raw))
    }

    pub fn dispatch(&self, decoded: Result<Envelope, DecodeError>) -> Dispatch {
        match decoded {
            Err(err) => {
                let id = err.id().cloned();
                Dispatch::Reply(error_response(&DispatchFailure::Decode(err), id))
            }
            Ok(Envelope::Notification(note)) => Dispatch::PassThrough(note),
            Ok(Envelope::Request(req)) => Dispatch::Reply(self.call(req)),
            Ok(response @ (Envelope::Result(_) | Envelope::Error(_))) => {
                let id = response.id().cloned();
                Dispatch::Reply(error_response(&DispatchFailure::UnexpectedResponse, id))
            }
        }
    }

    fn call(&self, req: Request) -> Envelope {
        let Request {
            method, params, id, ..
        } = req;
        debug!(method = %method, id = %id, "Dispatching request");

        match self.invoke(&method, params) {
            Ok(result) => encode_result(result, Some(id)),
            Err(failure) => error_response(&failure, Some(id)),
        }
    }

    fn invoke(&self, method: &str, params: Value) -> Result<Value, DispatchFailure> {
        let function = self
            .functions
            .get(method)
            .ok_or_else(|| DispatchFailure::MethodNotFound(method.to_string()))?;
        let args = positional_args(params)?;

        match catch_unwind(AssertUnwindSafe(|| function.call(&args))) {
            Ok(result) => Ok(result?),
            Err(_) => Err(DispatchFailure::Panicked),
        }
    }
}

/// Arrays are positional arguments. Named (object) params are not supported.
fn positional_args(params: Value) -> Result<Vec<Value>, DispatchFailure> {
    match params {
        Value::Array(args) => Ok(args),
        Value::Null => Ok(Vec::new()),
        _ => Err(DispatchFailure::ParamsNotPositional),
    }
}
