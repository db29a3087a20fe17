//! Function registry
//!
//! Maps lower-cased method names to callables. The registry is filled at
//! startup and then shared read-only (behind an `Arc`) by every session, so
//! it carries no lock.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub type FunctionResult = Result<Value, CallError>;

type Callable = dyn Fn(&[Value]) -> FunctionResult + Send + Sync;

/// Failure raised by a registered function, or by the arity check in front
/// of it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error("expected {expected} argument(s), got {got}")]
    Arity { expected: Arity, got: usize },

    #[error("argument {index}: {reason}")]
    InvalidArgument { index: usize, reason: String },

    #[error("division by zero")]
    DividedByZero,

    #[error("{0}")]
    Failed(String),
}

/// Number of positional arguments a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Fixed(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Fixed(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// A callable plus the parameter names used to render its signature.
#[derive(Clone)]
pub struct Function {
    params: Vec<String>,
    rest: Option<String>,
    body: Arc<Callable>,
}

impl Function {
    /// A function taking exactly `params.len()` positional arguments.
    pub fn new<F>(params: &[&str], body: F) -> Self
    where
        F: Fn(&[Value]) -> FunctionResult + Send + Sync + 'static,
    {
        Self {
            params: params.iter().map(|p| p.to_string()).collect(),
            rest: None,
            body: Arc::new(body),
        }
    }

    /// A function taking `params` followed by any number of extra arguments.
    pub fn variadic<F>(params: &[&str], rest: &str, body: F) -> Self
    where
        F: Fn(&[Value]) -> FunctionResult + Send + Sync + 'static,
    {
        Self {
            params: params.iter().map(|p| p.to_string()).collect(),
            rest: Some(rest.to_string()),
            body: Arc::new(body),
        }
    }

    pub fn arity(&self) -> Arity {
        match self.rest {
            Some(_) => Arity::AtLeast(self.params.len()),
            None => Arity::Fixed(self.params.len()),
        }
    }

    /// Human-readable signature, e.g. `(a, b)` or `(first, *rest)`.
    pub fn signature(&self) -> String {
        let mut parts: Vec<String> = self.params.clone();
        if let Some(ref rest) = self.rest {
            parts.push(format!("*{}", rest));
        }
        format!("({})", parts.join(", "))
    }

    /// Check arity, then run the body.
    pub fn call(&self, args: &[Value]) -> FunctionResult {
        let arity = self.arity();
        if !arity.accepts(args.len()) {
            return Err(CallError::Arity {
                expected: arity,
                got: args.len(),
            });
        }
        (self.body)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("signature", &self.signature())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Function>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `function` under the lower-cased `name`. The last
    /// registration for a name wins; the replaced function is returned.
    pub fn register(&mut self, name: impl Into<String>, function: Function) -> Option<Function> {
        let name = name.into().to_lowercase();
        debug!(name = %name, signature = %function.signature(), "Registered function");
        self.functions.insert(name, function)
    }

    /// Register every named function of a namespace.
    pub fn register_all<I, S>(&mut self, namespace: I)
    where
        I: IntoIterator<Item = (S, Function)>,
        S: Into<String>,
    {
        for (name, function) in namespace {
            self.register(name, function);
        }
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Name → signature, sorted by name.
    pub fn signatures(&self) -> BTreeMap<String, String> {
        self.functions
            .iter()
            .map(|(name, function)| (name.clone(), function.signature()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constant(value: Value) -> Function {
        Function::new(&[], move |_| Ok(value.clone()))
    }

    #[test]
    fn test_register_lowercases_and_lookup_is_case_insensitive() {
        let mut registry = FunctionRegistry::new();
        registry.register("Ping", constant(json!("pong")));

        assert!(registry.contains("ping"));
        assert!(registry.contains("PING"));
        let result = registry.get("pInG").unwrap().call(&[]).unwrap();
        assert_eq!(result, json!("pong"));
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = FunctionRegistry::new();
        assert!(registry.register("answer", constant(json!(1))).is_none());
        assert!(registry.register("ANSWER", constant(json!(42))).is_some());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("answer").unwrap().call(&[]).unwrap(), json!(42));
    }

    #[test]
    fn test_register_all() {
        let mut registry = FunctionRegistry::new();
        registry.register_all(vec![
            ("one", constant(json!(1))),
            ("two", constant(json!(2))),
        ]);
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_fixed_arity_is_checked_before_the_body_runs() {
        let function = Function::new(&["a", "b"], |_| panic!("body must not run"));
        let err = function.call(&[json!(1)]).unwrap_err();
        assert_eq!(
            err,
            CallError::Arity {
                expected: Arity::Fixed(2),
                got: 1
            }
        );
    }

    #[test]
    fn test_variadic_arity() {
        let count = Function::variadic(&["first"], "rest", |args| Ok(json!(args.len())));
        assert_eq!(count.arity(), Arity::AtLeast(1));
        assert_eq!(count.call(&[json!(1), json!(2), json!(3)]).unwrap(), json!(3));
        assert!(matches!(
            count.call(&[]),
            Err(CallError::Arity {
                expected: Arity::AtLeast(1),
                got: 0
            })
        ));
    }

    #[test]
    fn test_signatures() {
        let mut registry = FunctionRegistry::new();
        registry.register("sub", Function::new(&["a", "b"], |_| Ok(Value::Null)));
        registry.register("hello", Function::new(&[], |_| Ok(Value::Null)));
        registry.register(
            "concat",
            Function::variadic(&["head"], "tail", |_| Ok(Value::Null)),
        );

        let signatures = registry.signatures();
        let names: Vec<_> = signatures.keys().cloned().collect();
        assert_eq!(names, vec!["concat", "hello", "sub"]);
        assert_eq!(signatures["sub"], "(a, b)");
        assert_eq!(signatures["hello"], "()");
        assert_eq!(signatures["concat"], "(head, *tail)");
    }

    #[test]
    fn test_arity_display() {
        assert_eq!(Arity::Fixed(2).to_string(), "2");
        assert_eq!(Arity::AtLeast(1).to_string(), "at least 1");
    }
}
