//! Wire protocol shared by the Conclave daemon and its clients.
//!
//! Messages are JSON-RPC 2.0 envelopes, one JSON object per line. Besides
//! request/response traffic the daemon pushes plain `{"message": ...}`
//! objects for control-plane output (help, broadcast, disconnect notices).

mod codec;
mod error;
mod frame;
mod protocol;

pub use codec::{decode, decode_value, encode_error, encode_request, encode_result, DecodeError};
pub use error::{
    ErrorKind, DIVIDED_BY_ZERO, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND, PARSE_ERROR, UNKNOWN_ERROR,
};
pub use frame::{Frame, FrameReader, DEFAULT_MAX_FRAME_BYTES};
pub use protocol::{
    Envelope, ErrorResponse, Notification, Request, RequestId, ResultResponse, RpcError,
    ServerMessage, JSONRPC_VERSION,
};
