//! Dispatch failures and their classification into wire error kinds.
//!
//! `classify` is the only place an internal failure becomes an `ErrorKind`.

use conclave_protocol::{encode_error, DecodeError, Envelope, ErrorKind, RequestId};
use thiserror::Error;
use tracing::{debug, warn};

use crate::functions::CallError;

#[derive(Debug, Error)]
pub enum DispatchFailure {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),

    #[error("response envelope sent to the server")]
    UnexpectedResponse,

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("params must be an array")]
    ParamsNotPositional,

    #[error(transparent)]
    Call(#[from] CallError),

    #[error("function panicked")]
    Panicked,
}

impl DispatchFailure {
    pub fn kind(&self) -> ErrorKind {
        classify(self)
    }
}

pub fn classify(failure: &DispatchFailure) -> ErrorKind {
    use DispatchFailure::*;
    match failure {
        Decode(DecodeError::Parse(_)) | MalformedFrame(_) => ErrorKind::ParseError,
        Decode(DecodeError::InvalidRequest { .. }) | UnexpectedResponse => {
            ErrorKind::InvalidRequest
        }
        MethodNotFound(_) => ErrorKind::MethodNotFound,
        ParamsNotPositional => ErrorKind::InvalidParams,
        Call(CallError::Arity { .. }) | Call(CallError::InvalidArgument { .. }) => {
            ErrorKind::InvalidParams
        }
        Call(CallError::DividedByZero) => ErrorKind::DividedByZero,
        Call(CallError::Failed(_)) | Panicked => ErrorKind::UnknownError,
    }
}

/// Log the failure and build the error envelope. Only the fixed message for
/// the kind goes on the wire.
pub fn error_response(failure: &DispatchFailure, id: Option<RequestId>) -> Envelope {
    let kind = classify(failure);
    match kind {
        ErrorKind::UnknownError | ErrorKind::InternalError => {
            warn!(code = kind.code(), error = %failure, "Function failed");
        }
        _ => debug!(code = kind.code(), error = %failure, "Request rejected"),
    }
    encode_error(kind, id)
}
