//! Error kinds and their fixed wire codes.

use std::fmt;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const UNKNOWN_ERROR: i64 = -32000;
pub const DIVIDED_BY_ZERO: i64 = -32001;

/// Symbolic error kinds surfaced on the wire.
///
/// The mapping to codes and messages is fixed; nothing else in the workspace
/// writes error codes directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    UnknownError,
    DividedByZero,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::ParseError,
        ErrorKind::InvalidRequest,
        ErrorKind::MethodNotFound,
        ErrorKind::InvalidParams,
        ErrorKind::InternalError,
        ErrorKind::UnknownError,
        ErrorKind::DividedByZero,
    ];

    pub const fn code(self) -> i64 {
        match self {
            ErrorKind::ParseError => PARSE_ERROR,
            ErrorKind::InvalidRequest => INVALID_REQUEST,
            ErrorKind::MethodNotFound => METHOD_NOT_FOUND,
            ErrorKind::InvalidParams => INVALID_PARAMS,
            ErrorKind::InternalError => INTERNAL_ERROR,
            ErrorKind::UnknownError => UNKNOWN_ERROR,
            ErrorKind::DividedByZero => DIVIDED_BY_ZERO,
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            ErrorKind::ParseError => "Parse error",
            ErrorKind::InvalidRequest => "Invalid Request",
            ErrorKind::MethodNotFound => "Method not found",
            ErrorKind::InvalidParams => "Invalid params",
            ErrorKind::InternalError => "Internal error",
            ErrorKind::UnknownError => "Unknown error",
            ErrorKind::DividedByZero => "Divided by zero",
        }
    }

    /// Reverse lookup. Codes outside the table map to `UnknownError`.
    pub fn from_code(code: i64) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .unwrap_or(ErrorKind::UnknownError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}
