//! Built-in operations registry and the root environment.
//!
//! Every special form is an ordinary binding here. There is no syntax in the
//! evaluator, so `$define!` and `$vau` are primitive operatives like any other
//! and user code can shadow or wrap them.
//!
//! ```scheme
//! ($define! x 5)                 ; bind in the caller's environment
//! ($define! quote ($vau (e) e))  ; operative: operand comes back unevaluated
//! (eval (quote x))               ; => 5
//! (head "ab")                    ; => 97
//! ((< 1 2) then else)            ; booleans are selectors: => then
//! ```
//!
//! ## Operatives vs Applicatives
//!
//! - **Operatives** receive their operands exactly as written together with the
//!   caller's environment (`$define!`, `$vau`)
//! - **Applicatives** evaluate every operand left to right first (`eval`,
//!   `wrap`, `head`, `=`, ...)
//!
//! ## Booleans
//!
//! `#t` and `#f` are not a two-valued enum but selector functions: `#t` returns
//! the first of its two operands and `#f` the second, without evaluating
//! either. The comparison primitives return these same two values.
//!
//! ## Error Handling
//!
//! Operations reject incorrect types instead of coercing (`(< 1 "2")` is a
//! `TypeError`), and every operation checks its operand count against the
//! arity recorded in the registry.

use crate::Error;
use crate::ast::{NumberType, Value};
use crate::evaluator::combiner::{self, Combiner, CompoundOperative};
use crate::evaluator::intooperation::{IntoOperation, OperationFn};
use crate::evaluator::{Arity, Environment, eval};
use std::rc::Rc;
use tracing::debug;

/// Represents the implementation of a built-in operation
#[derive(Clone)]
pub enum OpKind {
    /// Receives the caller's environment and the operands unevaluated
    Operative(Rc<OperationFn>),
    /// Receives evaluated operands; bound wrapped in an applicative
    Applicative(Rc<OperationFn>),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Operative(_) => write!(f, "Operative(<fn>)"),
            OpKind::Applicative(_) => write!(f, "Applicative(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The symbol this operation is bound to in the root environment
    pub id: &'static str,
    /// The implementation of this operation
    pub op_kind: OpKind,
    /// Expected number of operands
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    pub fn is_operative(&self) -> bool {
        matches!(self.op_kind, OpKind::Operative(_))
    }

    /// Check if the given number of operands is valid for this operation
    pub(crate) fn validate_arity(&self, operand_count: usize) -> Result<(), Error> {
        self.arity
            .validate(operand_count)
            .map_err(|_| Error::arity_error_with_expr(self.arity, operand_count, self.id))
    }

    /// The combiner to bind under `id`, with the arity check in front
    pub fn to_value(&self) -> Value {
        let (func, applicative) = match &self.op_kind {
            OpKind::Operative(func) => (Rc::clone(func), false),
            OpKind::Applicative(func) => (Rc::clone(func), true),
        };
        let op = self.clone();
        let checked: Rc<OperationFn> =
            Rc::new(move |env: &Environment, operands: Vec<Value>| {
                op.validate_arity(operands.len())?;
                func(env, operands)
            });

        let primitive = Combiner::primitive(self.id, checked);
        if applicative {
            Value::Combiner(primitive.wrap())
        } else {
            Value::Combiner(primitive)
        }
    }
}

//
// Booleans
//

thread_local! {
    static TRUE: Value = selector("#t", true);
    static FALSE: Value = selector("#f", false);
}

fn selector(id: &str, pick_first: bool) -> Value {
    Value::NativeFunction {
        id: id.to_owned(),
        func: Rc::new(move |_env: &Environment, operands: Vec<Value>| {
            let [first, second] = <[Value; 2]>::try_from(operands)
                .map_err(|operands| Error::arity_error_with_expr(2, operands.len(), "boolean"))?;
            Ok(if pick_first { first } else { second })
        }),
    }
}

/// The shared `#t` or `#f` selector.
///
/// Always the same value on a given thread, so results of comparisons are
/// `=` to the `#t`/`#f` bindings.
pub fn boolean(b: bool) -> Value {
    if b {
        TRUE.with(Value::clone)
    } else {
        FALSE.with(Value::clone)
    }
}

//
// Primitive operatives
//

/// `($define! name expr)`: evaluate `expr`, bind it to `name` in the caller's frame
fn eval_define(env: &Environment, operands: Vec<Value>) -> Result<Value, Error> {
    let [name, expr] = <[Value; 2]>::try_from(operands)
        .map_err(|operands| Error::arity_error_with_expr(2, operands.len(), "$define!"))?;

    let value = eval(&expr, env)?;
    match name {
        Value::Symbol(name) => {
            debug!(name = %name, value = %value, "define");
            Ok(env.define(name, value))
        }
        other => Err(Error::type_error("symbol", &other)),
    }
}

/// `($vau formals body...)`: an operative closing over a fresh child of the caller's frame
fn eval_vau(env: &Environment, operands: Vec<Value>) -> Result<Value, Error> {
    let mut operands = operands.into_iter();
    let formals = operands
        .next()
        .ok_or_else(|| Error::arity_error_with_expr(Arity::AtLeast(2), 0, "$vau"))?;
    let body: Vec<Value> = operands.collect();

    let closure = Environment::with_parent(env);
    let operative = CompoundOperative::from_formals(&formals, body, closure)?;
    Ok(Value::Combiner(Combiner::CompoundOperative(Rc::new(operative))))
}

//
// Builtin Function Implementations
//

/// `(eval expr)` evaluates in the caller's environment, `(eval expr env)` in `env`
fn builtin_eval(env: &Environment, args: Vec<Value>) -> Result<Value, Error> {
    match args.as_slice() {
        [expr] => eval(expr, env),
        [expr, Value::Environment(target)] => eval(expr, target),
        [_, other] => Err(Error::type_error("environment", other)),
        _ => Err(Error::arity_error_with_expr(
            Arity::Range(1, 2),
            args.len(),
            "eval",
        )),
    }
}

#[cfg(feature = "reader")]
fn builtin_read(source: String) -> Result<Value, Error> {
    crate::reader::parse_expression(&source)
}

fn builtin_head(list: Value) -> Result<Value, Error> {
    list.head()
}

fn builtin_tail(list: Value) -> Result<Value, Error> {
    list.tail()
}

fn builtin_eq(first: Value, second: Value) -> Result<Value, Error> {
    Ok(boolean(first.is_identical(&second)))
}

fn builtin_lt(first: NumberType, second: NumberType) -> Result<Value, Error> {
    Ok(boolean(first < second))
}

// Macro to generate classification predicates over `Value`
macro_rules! predicate {
    ($name:ident, $test:ident) => {
        fn $name(value: Value) -> Result<Value, Error> {
            Ok(boolean(value.$test()))
        }
    };
}

predicate!(builtin_is_list, is_list);
predicate!(builtin_is_operative, is_operative);
predicate!(builtin_is_applicative, is_applicative);
predicate!(builtin_is_number, is_number);
predicate!(builtin_is_symbol, is_symbol);

/// Every built-in operation, in registration order.
///
/// `Rc`-based host functions are not `Sync`, so the registry is rebuilt per
/// call rather than held in a static.
pub fn get_builtin_ops() -> Vec<BuiltinOp> {
    fn builtin_fixed<Args, F>(f: F) -> Rc<OperationFn>
    where
        F: IntoOperation<Args>,
    {
        f.into_operation()
    }

    #[cfg_attr(not(feature = "reader"), expect(unused_mut))]
    let mut ops = vec![
        BuiltinOp {
            id: "$define!",
            op_kind: OpKind::Operative(Rc::new(eval_define)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "$vau",
            op_kind: OpKind::Operative(Rc::new(eval_vau)),
            arity: Arity::AtLeast(2),
        },
        BuiltinOp {
            id: "eval",
            op_kind: OpKind::Applicative(Rc::new(builtin_eval)),
            arity: Arity::Range(1, 2),
        },
        BuiltinOp {
            id: "wrap",
            op_kind: OpKind::Applicative(builtin_fixed::<(Value,), _>(combiner::wrap)),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "unwrap",
            op_kind: OpKind::Applicative(builtin_fixed::<(Value,), _>(combiner::unwrap)),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "list?",
            op_kind: OpKind::Applicative(builtin_fixed::<(Value,), _>(builtin_is_list)),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "operative?",
            op_kind: OpKind::Applicative(builtin_fixed::<(Value,), _>(builtin_is_operative)),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "applicative?",
            op_kind: OpKind::Applicative(builtin_fixed::<(Value,), _>(builtin_is_applicative)),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "number?",
            op_kind: OpKind::Applicative(builtin_fixed::<(Value,), _>(builtin_is_number)),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "symbol?",
            op_kind: OpKind::Applicative(builtin_fixed::<(Value,), _>(builtin_is_symbol)),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "head",
            op_kind: OpKind::Applicative(builtin_fixed::<(Value,), _>(builtin_head)),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "tail",
            op_kind: OpKind::Applicative(builtin_fixed::<(Value,), _>(builtin_tail)),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "=",
            op_kind: OpKind::Applicative(builtin_fixed::<(Value, Value), _>(builtin_eq)),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "<",
            op_kind: OpKind::Applicative(builtin_fixed::<(NumberType, NumberType), _>(
                builtin_lt,
            )),
            arity: Arity::Exact(2),
        },
    ];

    #[cfg(feature = "reader")]
    ops.push(BuiltinOp {
        id: "read",
        op_kind: OpKind::Applicative(builtin_fixed::<(String,), _>(builtin_read)),
        arity: Arity::Exact(1),
    });

    ops
}

/// Look up a built-in operation by the symbol it is bound to
pub fn find_builtin_op(id: &str) -> Option<BuiltinOp> {
    get_builtin_ops().into_iter().find(|op| op.id == id)
}

/// Build the root environment: no parent, every bootstrap primitive bound
pub fn create_global_env() -> Environment {
    let env = Environment::new();
    env.define("nil", Value::Nil);
    env.define("#t", boolean(true));
    env.define("#f", boolean(false));

    let ops = get_builtin_ops();
    for op in &ops {
        env.define(op.id, op.to_value());
    }
    debug!(builtins = ops.len(), "root environment ready");
    env
}
