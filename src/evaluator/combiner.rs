//! Operatives and applicatives.
//!
//! There are three kinds of combiner. A primitive operative wraps a host
//! function that receives the caller's environment and the raw operands. An
//! applicative wraps any other combiner and evaluates the operands before
//! passing them on. A compound operative is what `$vau` builds: formal
//! parameters, an optional rest parameter, a body and the environment it
//! closes over.

use super::intooperation::OperationFn;
use super::{Arity, Environment, eval};
use crate::Error;
use crate::ast::Value;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

#[derive(Clone)]
pub enum Combiner {
    PrimitiveOperative { id: String, func: Rc<OperationFn> },
    /// The wrapped combiner is always itself a combiner; `wrap` rejects anything else
    Applicative(Rc<Combiner>),
    CompoundOperative(Rc<CompoundOperative>),
}

impl Combiner {
    pub fn primitive(id: impl Into<String>, func: Rc<OperationFn>) -> Self {
        Combiner::PrimitiveOperative {
            id: id.into(),
            func,
        }
    }

    pub fn wrap(self) -> Combiner {
        Combiner::Applicative(Rc::new(self))
    }

    pub fn is_applicative(&self) -> bool {
        matches!(self, Combiner::Applicative(_))
    }

    pub fn is_operative(&self) -> bool {
        !self.is_applicative()
    }

    /// Identifier of the primitive at the bottom of the wrapper chain, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            Combiner::PrimitiveOperative { id, .. } => Some(id),
            Combiner::Applicative(underlying) => underlying.name(),
            Combiner::CompoundOperative(_) => None,
        }
    }

    pub(crate) fn is_identical(&self, other: &Combiner) -> bool {
        match (self, other) {
            (
                Combiner::PrimitiveOperative { func: f1, .. },
                Combiner::PrimitiveOperative { func: f2, .. },
            ) => Rc::ptr_eq(f1, f2),
            (Combiner::Applicative(a), Combiner::Applicative(b)) => Rc::ptr_eq(a, b),
            (Combiner::CompoundOperative(a), Combiner::CompoundOperative(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Invoke this combiner on an operand list, as written at the call site
    pub fn invoke(&self, operands: &Value, env: &Environment) -> Result<Value, Error> {
        self.invoke_with(operands.list_to_vec()?, env)
    }

    /// Invoke this combiner on operands already collected into a vector
    pub fn invoke_with(&self, operands: Vec<Value>, env: &Environment) -> Result<Value, Error> {
        match self {
            Combiner::PrimitiveOperative { id, func } => {
                trace!(operative = %id, operands = operands.len(), "apply");
                func(env, operands)
            }
            Combiner::Applicative(underlying) => {
                // Left to right: operands may have effects such as $define!
                let args = operands
                    .iter()
                    .map(|operand| eval(operand, env))
                    .collect::<Result<Vec<_>, _>>()?;
                underlying.invoke_with(args, env)
            }
            Combiner::CompoundOperative(operative) => operative.call(operands),
        }
    }
}

impl fmt::Display for Combiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_applicative() {
            "applicative"
        } else {
            "operative"
        };
        match self.name() {
            Some(name) => write!(f, "#<{kind}:{name}>"),
            None => write!(f, "#<{kind}>"),
        }
    }
}

/// `wrap` primitive: make an applicative out of any combiner
pub fn wrap(value: Value) -> Result<Value, Error> {
    match value {
        Value::Combiner(combiner) => Ok(Value::Combiner(combiner.wrap())),
        other => Err(Error::type_error("combiner", &other)),
    }
}

/// `unwrap` primitive: the combiner underneath an applicative
pub fn unwrap(value: Value) -> Result<Value, Error> {
    match value {
        Value::Combiner(Combiner::Applicative(underlying)) => {
            Ok(Value::Combiner(Combiner::clone(&underlying)))
        }
        other => Err(Error::type_error("applicative", &other)),
    }
}

/// An operative built by `$vau`
pub struct CompoundOperative {
    params: Vec<String>,
    rest: Option<String>,
    body: Vec<Value>,
    closure: Environment,
}

impl CompoundOperative {
    pub fn new(
        params: Vec<String>,
        rest: Option<String>,
        body: Vec<Value>,
        closure: Environment,
    ) -> Result<Self, Error> {
        if body.is_empty() {
            return Err(Error::arity_error_with_expr(
                Arity::AtLeast(1),
                0,
                "operative body",
            ));
        }

        let mut seen = HashSet::new();
        for name in params.iter().chain(rest.iter()) {
            if !seen.insert(name.as_str()) {
                return Err(Error::EvalError(format!(
                    "Duplicate parameter name: {name}"
                )));
            }
        }

        Ok(CompoundOperative {
            params,
            rest,
            body,
            closure,
        })
    }

    /// Build an operative from a formal parameter tree.
    ///
    /// Accepted shapes:
    /// - `args` binds the whole operand list
    /// - `(a b)` binds fixed parameters, `(a b . rest)` adds a rest parameter
    /// - `((a b) . rest)` or `((a b) rest)`: an explicit fixed-parameter list
    ///   followed by the rest parameter
    pub fn from_formals(
        formals: &Value,
        body: Vec<Value>,
        closure: Environment,
    ) -> Result<Self, Error> {
        let (params, rest) = parse_formals(formals)?;
        Self::new(params, rest, body, closure)
    }

    pub fn arity(&self) -> Arity {
        match self.rest {
            Some(_) => Arity::AtLeast(self.params.len()),
            None => Arity::Exact(self.params.len()),
        }
    }

    fn call(&self, operands: Vec<Value>) -> Result<Value, Error> {
        let arity = self.arity();
        if arity.validate(operands.len()).is_err() {
            return Err(Error::arity_error_with_expr(
                arity,
                operands.len(),
                "compound operative",
            ));
        }
        trace!(params = ?self.params, rest = ?self.rest, "calling compound operative");

        let frame = Environment::with_parent(&self.closure);
        let mut operands = operands.into_iter();
        for (param, operand) in self.params.iter().zip(operands.by_ref()) {
            frame.define(param.clone(), operand);
        }
        if let Some(rest) = &self.rest {
            frame.define(rest.clone(), Value::list(operands));
        }

        let Some((last, init)) = self.body.split_last() else {
            return Ok(Value::Nil);
        };
        for expr in init {
            eval(expr, &frame)?;
        }
        eval(last, &frame)
    }
}

fn parse_formals(formals: &Value) -> Result<(Vec<String>, Option<String>), Error> {
    match formals {
        Value::Symbol(name) => Ok((Vec::new(), Some(name.clone()))),
        Value::Pair(pair) if pair.head().is_pair() => {
            let (params, None) = parse_formals_list(pair.head())? else {
                return Err(Error::type_error("proper parameter list", pair.head()));
            };
            let rest = match pair.tail() {
                Value::Nil => None,
                Value::Symbol(name) => Some(name.clone()),
                Value::Pair(rest) if rest.tail().is_nil() => match rest.head() {
                    Value::Symbol(name) => Some(name.clone()),
                    other => return Err(Error::type_error("symbol", other)),
                },
                other => return Err(Error::type_error("rest parameter", other)),
            };
            Ok((params, rest))
        }
        Value::Pair(_) | Value::Nil => parse_formals_list(formals),
        other => Err(Error::type_error("formal parameter list", other)),
    }
}

/// Walk a (possibly dotted) list of symbols
fn parse_formals_list(formals: &Value) -> Result<(Vec<String>, Option<String>), Error> {
    let mut params = Vec::new();
    let mut current = formals;
    loop {
        match current {
            Value::Nil => return Ok((params, None)),
            Value::Symbol(rest) => return Ok((params, Some(rest.clone()))),
            Value::Pair(pair) => {
                match pair.head() {
                    Value::Symbol(name) => params.push(name.clone()),
                    other => return Err(Error::type_error("symbol", other)),
                }
                current = pair.tail();
            }
            other => return Err(Error::type_error("formal parameter list", other)),
        }
    }
}
