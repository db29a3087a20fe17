//! Envelope encoding and classification of inbound messages.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::protocol::{
    Envelope, ErrorResponse, Notification, Request, RequestId, ResultResponse, RpcError,
    JSONRPC_VERSION,
};

/// Why an inbound message could not be turned into an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// Not JSON, or JSON that is not an object.
    #[error("parse error: {0}")]
    Parse(String),

    /// A JSON object that is not a valid envelope. Carries whatever id could
    /// be salvaged so the error reply can still be correlated.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        id: Option<RequestId>,
        reason: &'static str,
    },
}

impl DecodeError {
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            DecodeError::Parse(_) => None,
            DecodeError::InvalidRequest { id, .. } => id.as_ref(),
        }
    }
}

/// Build a request, or a notification when `id` is `None`.
///
/// The method is lower-cased. Array params that are strings made only of
/// ASCII digits are replaced by their integer value, so a line-oriented
/// console can pass numbers as plain words. Strings that overflow `i64` stay
/// strings.
pub fn encode_request(method: &str, params: Value, id: Option<RequestId>) -> Envelope {
    let method = method.to_lowercase();
    let params = coerce_numeric_strings(params);
    match id {
        Some(id) => Envelope::Request(Request::new(method, params, id)),
        None => Envelope::Notification(Notification::new(method, params)),
    }
}

pub fn encode_result(result: Value, id: Option<RequestId>) -> Envelope {
    Envelope::Result(ResultResponse {
        jsonrpc: JSONRPC_VERSION,
        result,
        id,
    })
}

pub fn encode_error(kind: ErrorKind, id: Option<RequestId>) -> Envelope {
    Envelope::Error(ErrorResponse {
        jsonrpc: JSONRPC_VERSION,
        error: RpcError::from_kind(kind),
        id,
    })
}

/// Decode one raw message.
pub fn decode(raw: &str) -> Result<Envelope, DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::Parse(e.to_string()))?;
    decode_value(value)
}

/// Classify an already-parsed JSON value.
pub fn decode_value(value: Value) -> Result<Envelope, DecodeError> {
    let Value::Object(mut obj) = value else {
        return Err(DecodeError::Parse("message is not a JSON object".into()));
    };

    let raw_id = obj.remove("id");
    let id = raw_id.as_ref().and_then(RequestId::from_value);
    let version_ok = obj.get("jsonrpc").and_then(Value::as_str) == Some(JSONRPC_VERSION);

    // Without an id the message is a request or notification, whatever
    // other keys it carries.
    if raw_id.is_some() && (obj.contains_key("result") || obj.contains_key("error")) {
        return decode_response(obj, raw_id, id, version_ok);
    }

    if !version_ok {
        return Err(invalid(id, "jsonrpc must be \"2.0\""));
    }

    let method = match obj.remove("method") {
        Some(Value::String(method)) => method,
        Some(Value::Null) | None => return Err(invalid(id, "missing method")),
        Some(_) => return Err(invalid(id, "method must be a string")),
    };

    let params = match obj.remove("params") {
        None | Some(Value::Null) => Value::Array(Vec::new()),
        Some(params) => params,
    };

    match (raw_id, id) {
        (None, _) | (Some(Value::Null), _) => {
            Ok(Envelope::Notification(Notification::new(method, params)))
        }
        (Some(_), Some(id)) => Ok(Envelope::Request(Request::new(method, params, id))),
        (Some(_), None) => Err(invalid(None, "id must be a string or a number")),
    }
}

fn decode_response(
    mut obj: Map<String, Value>,
    raw_id: Option<Value>,
    id: Option<RequestId>,
    version_ok: bool,
) -> Result<Envelope, DecodeError> {
    if !version_ok {
        return Err(invalid(id, "jsonrpc must be \"2.0\""));
    }
    if matches!(raw_id, Some(ref v) if !v.is_null()) && id.is_none() {
        return Err(invalid(None, "id must be a string or a number"));
    }

    match (obj.remove("result"), obj.remove("error")) {
        (Some(result), None) => Ok(Envelope::Result(ResultResponse {
            jsonrpc: JSONRPC_VERSION,
            result,
            id,
        })),
        (None, Some(error)) => match serde_json::from_value::<RpcError>(error) {
            Ok(error) => Ok(Envelope::Error(ErrorResponse {
                jsonrpc: JSONRPC_VERSION,
                error,
                id,
            })),
            Err(_) => Err(invalid(id, "malformed error object")),
        },
        _ => Err(invalid(id, "response carries both result and error")),
    }
}

fn invalid(id: Option<RequestId>, reason: &'static str) -> DecodeError {
    DecodeError::InvalidRequest { id, reason }
}

fn coerce_numeric_strings(params: Value) -> Value {
    match params {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) if is_ascii_digits(&s) => {
                        s.parse::<i64>().map(Value::from).unwrap_or(Value::String(s))
                    }
                    other => other,
                })
                .collect(),
        ),
        other => other,
    }
}

fn is_ascii_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
