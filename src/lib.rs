//! VauXP - a minimal Kernel-style (vau-calculus) evaluator
//!
//! This crate provides a tree-walking interpreter built around the distinction
//! between **operatives** and **applicatives**:
//!
//! - an operative receives its operands *unevaluated*, together with the
//!   caller's environment (a true fexpr);
//! - an applicative evaluates its operands first and then hands the resulting
//!   values to the operative it wraps.
//!
//! Because operatives are ordinary first-class values, every special form,
//! including `$define!` and the combiner constructor `$vau` itself, is just a
//! binding in the root environment. There is no hard-coded syntax in the
//! evaluator.
//!
//! ```scheme
//! ($define! quote ($vau (x) x))          ; an operative: operand comes back as written
//! ($define! list (wrap ($vau args args))) ; an applicative: operands are evaluated
//! (list 1 (head "ab") (quote (a b)))     ; => (1 97 (a b))
//! ((< 1 2) yes no)                       ; booleans select: => yes
//! ```
//!
//! ## Embedding
//!
//! ```
//! use vauxp::ast::Value;
//! use vauxp::builtinops::create_global_env;
//! use vauxp::evaluator::eval;
//! use vauxp::reader::parse_expression;
//!
//! let env = create_global_env();
//! let expr = parse_expression("($define! answer 42)").unwrap();
//! eval(&expr, &env).unwrap();
//! assert_eq!(env.lookup("answer").unwrap(), Value::Number(42));
//! ```
//!
//! ## Modules
//!
//! - `ast`: the value representation (nil, pairs, strings, symbols, numbers,
//!   native functions, combiners, environments)
//! - `evaluator`: environments and the `eval`/`apply` dispatch
//! - `builtinops`: the bootstrap primitives and the root environment
//! - `reader`: S-expression parsing from text (feature `reader`)

use std::fmt;

/// Maximum parsing depth to prevent stack overflow attacks
pub const MAX_PARSE_DEPTH: usize = 64;

/// Maximum number of nested `eval` frames before evaluation is aborted.
///
/// Evaluation is plain recursive descent, so without this limit a deeply
/// nested or runaway recursive program would exhaust the host stack.
pub const MAX_EVAL_DEPTH: usize = 256;

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A value failed an expected-shape check
    TypeError(String),
    /// A symbol is unbound anywhere in the environment chain
    ReferenceError(String),
    /// A lookup was attempted without any environment
    NoEnvironment,
    /// The operator position evaluated to something that cannot be invoked
    InvocationError(String),
    ArityError {
        expected: String,
        got: usize,
        expression: Option<String>, // Optional operator context
    },
    ParseError(String),
    EvalError(String),
}

impl Error {
    /// Create a TypeError naming the expected kind and rendering the offending value
    pub fn type_error(expected: &str, found: &ast::Value) -> Self {
        Error::TypeError(format!("expected {expected}, got {} {found}", found.type_name()))
    }

    /// Create an ArityError without expression context
    pub fn arity_error(expected: impl fmt::Display, got: usize) -> Self {
        Error::ArityError {
            expected: expected.to_string(),
            got,
            expression: None,
        }
    }

    /// Create an ArityError naming the combiner that rejected its operands
    pub fn arity_error_with_expr(
        expected: impl fmt::Display,
        got: usize,
        expression: impl Into<String>,
    ) -> Self {
        Error::ArityError {
            expected: expected.to_string(),
            got,
            expression: Some(expression.into()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::ReferenceError(name) => write!(f, "Reference error: unbound symbol {name}"),
            Error::NoEnvironment => write!(f, "No environment: lookup without an environment"),
            Error::InvocationError(operator) => {
                write!(f, "Invocation error: {operator} is not a combiner")
            }
            Error::ArityError {
                expected,
                got,
                expression,
            } => match expression {
                Some(expr) => write!(
                    f,
                    "ArityError: {expr}: expected {expected} operands, got {got}"
                ),
                None => write!(f, "ArityError: expected {expected} operands but got {got}"),
            },
            Error::ParseError(msg) => write!(f, "ParseError: {msg}"),
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod builtinops;
pub mod evaluator;

#[cfg(feature = "reader")]
pub mod reader;
