//! Argument extraction helpers for registered functions.
//!
//! Each helper returns `CallError::InvalidArgument` naming the offending
//! position, so function bodies can use `?` and never build error codes.

use serde_json::Value;

use crate::functions::CallError;

/// A JSON number narrowed to the two shapes arithmetic cares about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(n) => n,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(n) => n == 0,
            Number::Float(n) => n == 0.0,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Number::Int(n) => Value::from(n),
            // NaN and infinities have no JSON form
            Number::Float(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        }
    }
}

/// Extract a required numeric argument.
pub fn require_number(args: &[Value], index: usize) -> Result<Number, CallError> {
    let value = require_arg(args, index)?;
    if let Some(n) = value.as_i64() {
        return Ok(Number::Int(n));
    }
    value
        .as_f64()
        .map(Number::Float)
        .ok_or_else(|| invalid(index, format!("expected a number, got {}", type_name(value))))
}

/// Extract a required string argument.
pub fn require_str(args: &[Value], index: usize) -> Result<&str, CallError> {
    let value = require_arg(args, index)?;
    value
        .as_str()
        .ok_or_else(|| invalid(index, format!("expected a string, got {}", type_name(value))))
}

/// Render an argument as text: strings verbatim, anything else as JSON.
pub fn display_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn require_arg(args: &[Value], index: usize) -> Result<&Value, CallError> {
    args.get(index)
        .ok_or_else(|| invalid(index, "missing argument".to_string()))
}

fn invalid(index: usize, reason: String) -> CallError {
    CallError::InvalidArgument { index, reason }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
