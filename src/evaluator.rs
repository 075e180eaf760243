use crate::Error;
use crate::MAX_EVAL_DEPTH;
use crate::ast::Value;
use combiner::Combiner;
use intooperation::IntoOperation;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{trace, warn};

pub mod combiner;
pub mod intooperation;

/// Name of the binding every environment carries for retrieving itself
pub const CURRENT_WORLD: &str = "current-world";

/// Expected number of operands for a primitive or compound operative
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
    Any,
}

impl Arity {
    pub fn validate(&self, got: usize) -> Result<(), Error> {
        let ok = match *self {
            Arity::Exact(n) => got == n,
            Arity::AtLeast(n) => got >= n,
            Arity::Range(min, max) => (min..=max).contains(&got),
            Arity::Any => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::arity_error(self, got))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(min, max) => write!(f, "{min} to {max}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

struct Frame {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Environment>,
}

/// A mutable scope frame with a link to the frame it falls back on.
///
/// Cloning an `Environment` clones the handle, not the bindings. A child made
/// with [`Environment::with_parent`] starts empty and defers every failed
/// lookup to the live parent, so later definitions in the parent stay visible
/// through the child until the child shadows the same name.
#[derive(Clone)]
pub struct Environment(Rc<Frame>);

impl Environment {
    /// Create a root environment with no parent
    pub fn new() -> Self {
        Self::create(None)
    }

    /// Create a child frame of `parent`
    pub fn with_parent(parent: &Environment) -> Self {
        Self::create(Some(parent.clone()))
    }

    fn create(parent: Option<Environment>) -> Self {
        Environment(Rc::new_cyclic(|frame: &Weak<Frame>| {
            let mut bindings = HashMap::new();
            bindings.insert(CURRENT_WORLD.to_owned(), current_world(frame.clone()));
            Frame {
                bindings: RefCell::new(bindings),
                parent,
            }
        }))
    }

    /// Create or overwrite a binding in this frame only. Returns the bound value.
    pub fn define(&self, name: impl Into<String>, value: Value) -> Value {
        self.0
            .bindings
            .borrow_mut()
            .insert(name.into(), value.clone());
        value
    }

    /// Nearest binding of `name` along the parent chain
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut env = self;
        loop {
            if let Some(value) = env.0.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            env = env.0.parent.as_ref()?;
        }
    }

    /// Like [`Environment::get`], but an unbound name is a `ReferenceError`
    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        self.get(name)
            .ok_or_else(|| Error::ReferenceError(name.to_owned()))
    }

    pub fn parent(&self) -> Option<&Environment> {
        self.0.parent.as_ref()
    }

    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Register a strongly-typed Rust function as an applicative.
    ///
    /// Operands are evaluated by the applicative wrapper and then converted
    /// to the function's parameter types:
    ///
    /// ```
    /// use vauxp::Error;
    /// use vauxp::ast::{NumberType, Value};
    /// use vauxp::builtinops::create_global_env;
    ///
    /// fn add(a: NumberType, b: NumberType) -> Result<NumberType, Error> {
    ///     a.checked_add(b)
    ///         .ok_or_else(|| Error::EvalError("Integer overflow in addition".into()))
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_builtin_operation::<_, (NumberType, NumberType)>("add", add);
    /// assert!(env.lookup("add").unwrap().is_applicative());
    /// ```
    ///
    /// Supported parameter types are those implementing
    /// [`intooperation::FromParam`]: `Value`, `NumberType`, `String`,
    /// `Environment` and `Combiner`. The return type is `Result<R, Error>`
    /// for any `R: Into<Value>`.
    ///
    /// Arity is enforced automatically. Conversion failures yield `TypeError`.
    pub fn register_builtin_operation<F, Args>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args>,
    {
        let operative = Combiner::primitive(name, func.into_operation());
        self.define(name, Value::Combiner(operative.wrap()));
    }

    /// Register a host operative: it receives the caller's environment and
    /// the operands exactly as written at the call site.
    pub fn register_operative<F>(&self, name: &str, func: F)
    where
        F: Fn(&Environment, Vec<Value>) -> Result<Value, Error> + 'static,
    {
        self.define(name, Value::Combiner(Combiner::primitive(name, Rc::new(func))));
    }

    /// Get all bindings in this environment and its parents
    /// Returns a Vec of (name, value) pairs sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();

        // Start with parent bindings (so they can be overridden by local bindings)
        if let Some(parent) = &self.0.parent {
            for (name, value) in parent.get_all_bindings() {
                bindings.insert(name, value);
            }
        }

        for (name, value) in self.0.bindings.borrow().iter() {
            bindings.insert(name.clone(), value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("bindings", &self.0.bindings.borrow().len())
            .field("has_parent", &self.0.parent.is_some())
            .finish()
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// The `current-world` binding of a frame. It holds the frame weakly so the
/// frame does not keep itself alive.
fn current_world(frame: Weak<Frame>) -> Value {
    Value::NativeFunction {
        id: CURRENT_WORLD.to_owned(),
        func: Rc::new(move |_env: &Environment, operands: Vec<Value>| {
            if !operands.is_empty() {
                return Err(Error::arity_error_with_expr(
                    0,
                    operands.len(),
                    CURRENT_WORLD,
                ));
            }
            frame
                .upgrade()
                .map(|frame| Value::Environment(Environment(frame)))
                .ok_or(Error::NoEnvironment)
        }),
    }
}

/// Resolve `name` in an optional environment.
///
/// A missing environment is a caller-side mistake and is reported as
/// `NoEnvironment`, distinct from an unbound symbol.
pub fn lookup(name: &str, env: Option<&Environment>) -> Result<Value, Error> {
    env.ok_or(Error::NoEnvironment)?.lookup(name)
}

thread_local! {
    static EVAL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Counts nested `eval` frames on this thread; released on drop so early
/// returns through `?` unwind the count too.
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Result<Self, Error> {
        EVAL_DEPTH.with(|depth| {
            let current = depth.get();
            if current >= MAX_EVAL_DEPTH {
                warn!(max = MAX_EVAL_DEPTH, "evaluation depth limit exceeded");
                return Err(Error::EvalError(format!(
                    "Evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
                )));
            }
            depth.set(current + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        EVAL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Evaluate an expression in an environment.
///
/// A non-empty list is a combination: its head is evaluated to find the
/// combiner, and the tail is handed to [`apply`] *unevaluated*. Whether the
/// operands are ever evaluated is up to the combiner. Symbols are looked up;
/// everything else evaluates to itself.
pub fn eval(expr: &Value, env: &Environment) -> Result<Value, Error> {
    let _depth = DepthGuard::enter()?;
    match expr {
        Value::Pair(pair) => {
            let operator = eval(pair.head(), env)?;
            apply(&operator, pair.tail(), env)
        }
        Value::Symbol(name) => env.lookup(name),
        Value::Nil => Ok(Value::Nil),
        Value::String(_)
        | Value::Number(_)
        | Value::NativeFunction { .. }
        | Value::Combiner(_)
        | Value::Environment(_) => Ok(expr.clone()),
    }
}

/// Invoke `operator` on an operand list in the caller's environment
pub fn apply(operator: &Value, operands: &Value, env: &Environment) -> Result<Value, Error> {
    match operator {
        Value::NativeFunction { id, func } => {
            trace!(native = %id, "apply");
            func(env, operands.list_to_vec()?)
        }
        Value::Combiner(combiner) => combiner.invoke(operands, env),
        _ => Err(Error::InvocationError(operator.to_string())),
    }
}
