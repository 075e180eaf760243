use crate::Error;
use crate::ast::{NumberType, Value};
use crate::evaluator::Environment;
use crate::evaluator::combiner::Combiner;
use std::rc::Rc;

// NOTE: This module is internal plumbing for the evaluator.
// It defines the adapter layer that turns strongly-typed Rust
// functions into the erased `OperationFn` used at runtime.
//
// External users should interact with `Environment` and the
// registration APIs in `evaluator.rs`.

/// Canonical erased host function type used by the evaluator.
///
/// Host functions receive the caller's environment and ownership of their
/// operand vector. Whether those operands were evaluated first depends on
/// whether the function sits under an applicative wrapper.
pub type OperationFn = dyn Fn(&Environment, Vec<Value>) -> Result<Value, Error>;

/// Conversion from a single evaluated argument into a typed parameter.
///
/// A mismatch is reported as `TypeError` naming the expected kind.
pub trait FromParam: Sized {
    fn from_param(value: Value) -> Result<Self, Error>;
}

impl FromParam for Value {
    fn from_param(value: Value) -> Result<Self, Error> {
        Ok(value)
    }
}

macro_rules! impl_from_param {
    ($ty:ty, $expected:literal, $pattern:pat => $out:expr) => {
        impl FromParam for $ty {
            fn from_param(value: Value) -> Result<Self, Error> {
                match value {
                    $pattern => Ok($out),
                    other => Err(Error::type_error($expected, &other)),
                }
            }
        }
    };
}

impl_from_param!(NumberType, "number", Value::Number(n) => n);
impl_from_param!(String, "string", Value::String(s) => s);
impl_from_param!(Environment, "environment", Value::Environment(env) => env);
impl_from_param!(Combiner, "combiner", Value::Combiner(combiner) => combiner);

/// Internal trait that normalizes host return types to the
/// canonical `Result<Value, Error>` expected by the evaluator.
pub trait IntoValueResult {
    fn into_value_result(self) -> Result<Value, Error>;
}

impl<T> IntoValueResult for Result<T, Error>
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        self.map(Into::into)
    }
}

/// Public trait for converting strongly-typed Rust functions or
/// closures into the erased [`OperationFn`], parameterized by an
/// argument tuple type.
pub trait IntoOperation<Args> {
    fn into_operation(self) -> Rc<OperationFn>;
}

// 0-arg functions / closures
impl<F, R> IntoOperation<()> for F
where
    F: Fn() -> R + 'static,
    R: IntoValueResult,
{
    fn into_operation(self) -> Rc<OperationFn> {
        Rc::new(move |_env: &Environment, args: Vec<Value>| {
            if !args.is_empty() {
                return Err(Error::arity_error(0, args.len()));
            }
            (self)().into_value_result()
        })
    }
}

/// Implements `IntoOperation` for one fixed arity.
///
/// The operand vector is checked for length up front and then moved into
/// an array, so each argument is converted by value without cloning.
macro_rules! impl_into_operation_for_arity {
    ($arity:literal, $( $p:ident : $A:ident ),+ ) => {
        impl<F, R, $( $A ),+> IntoOperation<( $( $A, )+ )> for F
        where
            F: Fn( $( $A ),+ ) -> R + 'static,
            $( $A: FromParam, )+
            R: IntoValueResult,
        {
            fn into_operation(self) -> Rc<OperationFn> {
                Rc::new(move |_env: &Environment, args: Vec<Value>| {
                    let len = args.len();
                    let [ $( $p ),+ ] = <[Value; $arity]>::try_from(args)
                        .map_err(|_| Error::arity_error($arity, len))?;
                    $(
                        let $p = <$A as FromParam>::from_param($p)?;
                    )+
                    (self)( $( $p ),+ ).into_value_result()
                })
            }
        }
    };
}

impl_into_operation_for_arity!(1, p0: A1);
impl_into_operation_for_arity!(2, p0: A1, p1: A2);
impl_into_operation_for_arity!(3, p0: A1, p1: A2, p2: A3);
impl_into_operation_for_arity!(4, p0: A1, p1: A2, p2: A3, p3: A4);

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{sym, val};

    fn op<Args, F: IntoOperation<Args>>(f: F) -> Rc<OperationFn> {
        f.into_operation()
    }

    fn call(op: &Rc<OperationFn>, args: Vec<Value>) -> Result<Value, Error> {
        op(&Environment::new(), args)
    }

    #[test]
    fn test_typed_parameters_convert() {
        let concat = op::<(String, String), _>(|a: String, b: String| -> Result<String, Error> {
            Ok(a + &b)
        });
        assert_eq!(call(&concat, vec![val("ab"), val("cd")]).unwrap(), val("abcd"));

        let pick = op::<(NumberType, Value, Value), _>(
            |flag: NumberType, a: Value, b: Value| -> Result<Value, Error> {
                Ok(if flag == 0 { a } else { b })
            },
        );
        assert_eq!(
            call(&pick, vec![val(1), sym("a"), sym("b")]).unwrap(),
            sym("b")
        );
    }

    #[test]
    fn test_conversion_failures_are_type_errors() {
        let negate = op::<(NumberType,), _>(|n: NumberType| -> Result<NumberType, Error> { Ok(-n) });
        let cases = vec![
            (vec![val("x")], "number"),
            (vec![sym("x")], "number"),
            (vec![val([1])], "number"),
        ];
        for (i, (args, expected)) in cases.into_iter().enumerate() {
            match call(&negate, args) {
                Err(Error::TypeError(msg)) => {
                    assert!(msg.contains(expected), "case #{}: {msg}", i + 1)
                }
                other => panic!("case #{}: expected TypeError, got {other:?}", i + 1),
            }
        }

        let env_op =
            op::<(Environment,), _>(|_env: Environment| -> Result<Value, Error> { Ok(Value::Nil) });
        assert!(matches!(
            call(&env_op, vec![val(1)]),
            Err(Error::TypeError(msg)) if msg.contains("environment")
        ));
    }

    #[test]
    fn test_arity_checked_before_conversion() {
        let add = op::<(NumberType, NumberType), _>(
            |a: NumberType, b: NumberType| -> Result<NumberType, Error> { Ok(a + b) },
        );
        for args in [vec![], vec![val(1)], vec![val(1), val(2), val(3)]] {
            let got = args.len();
            assert_eq!(
                call(&add, args).unwrap_err(),
                Error::arity_error(2, got)
            );
        }

        let constant = op::<(), _>(|| -> Result<NumberType, Error> { Ok(7) });
        assert_eq!(call(&constant, vec![]).unwrap(), val(7));
        assert_eq!(call(&constant, vec![val(1)]).unwrap_err(), Error::arity_error(0, 1));
    }
}
