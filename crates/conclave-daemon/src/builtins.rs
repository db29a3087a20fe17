//! Example namespace served by `conclave-server`: a greeting pair and
//! four-function arithmetic.

use serde_json::Value;

use crate::functions::{CallError, Function, FunctionResult};
use crate::rpc_helpers::{display_arg, require_number, Number};

/// Every builtin, ready for `FunctionRegistry::register_all`.
pub fn namespace() -> Vec<(&'static str, Function)> {
    vec![
        ("hello", Function::new(&[], |_| Ok(Value::from("Hello World!")))),
        ("greet", Function::new(&["name"], greet)),
        ("add", Function::new(&["a", "b"], add)),
        ("sub", Function::new(&["a", "b"], sub)),
        ("mul", Function::new(&["a", "b"], mul)),
        ("div", Function::new(&["a", "b"], div)),
    ]
}

fn greet(args: &[Value]) -> FunctionResult {
    Ok(Value::from(format!("Hello, {}!", display_arg(&args[0]))))
}

fn add(args: &[Value]) -> FunctionResult {
    arithmetic(args, i64::checked_add, |a, b| a + b)
}

fn sub(args: &[Value]) -> FunctionResult {
    arithmetic(args, i64::checked_sub, |a, b| a - b)
}

fn mul(args: &[Value]) -> FunctionResult {
    arithmetic(args, i64::checked_mul, |a, b| a * b)
}

/// True division: the quotient is always a float.
fn div(args: &[Value]) -> FunctionResult {
    let a = require_number(args, 0)?;
    let b = require_number(args, 1)?;
    if b.is_zero() {
        return Err(CallError::DividedByZero);
    }
    Ok(Number::Float(a.as_f64() / b.as_f64()).into_value())
}

/// Integer arithmetic when both operands are integers and the result fits,
/// float arithmetic otherwise.
fn arithmetic(
    args: &[Value],
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> FunctionResult {
    let a = require_number(args, 0)?;
    let b = require_number(args, 1)?;
    let result = match (a, b) {
        (Number::Int(x), Number::Int(y)) => int_op(x, y)
            .map(Number::Int)
            .unwrap_or_else(|| Number::Float(float_op(x as f64, y as f64))),
        _ => Number::Float(float_op(a.as_f64(), b.as_f64())),
    };
    Ok(result.into_value())
}
