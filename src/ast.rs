//! This module defines the value representation shared by the reader and the
//! evaluator. The main enum, [`Value`], is the closed set of expression shapes:
//! the `Nil` sentinel, immutable cons [`Pair`]s, strings, symbols, numbers,
//! host-level native functions, combiners and environments.
//!
//! Lists are chains of pairs terminated by `Nil`. Strings are lists too: their
//! head is the numeric code of the first character and their tail is the
//! remaining substring, so list primitives work over text without converting
//! it to pairs. Ergonomic helpers such as [`val`], [`sym`] and [`nil`] are
//! provided for building trees in code and tests.

use crate::Error;
use crate::evaluator::Environment;
use crate::evaluator::combiner::Combiner;
use crate::evaluator::intooperation::OperationFn;
use std::rc::Rc;

/// Type alias for number values in interpreter
pub type NumberType = i64;

/// Allowed non-alphanumeric characters in symbol names
/// `$` and `!` mark operatives and mutators by convention, `#` spells the booleans
#[cfg_attr(not(feature = "reader"), expect(dead_code))]
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_$#%&:~^@";

/// Check if a string is a valid symbol name
/// Valid: non-empty, no leading digit, no "-digit" prefix, alphanumeric + SYMBOL_SPECIAL_CHARS
#[cfg_attr(not(feature = "reader"), expect(dead_code))]
pub(crate) fn is_valid_symbol(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        None => false,
        Some(first_char) => {
            if first_char.is_ascii_digit() {
                return false;
            }

            if first_char == '-'
                && let Some(second_char) = chars.next()
                && second_char.is_ascii_digit()
            {
                return false;
            }

            name.chars()
                .all(|c| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c))
        }
    }
}

/// A cons cell. Both fields are fixed at construction.
pub struct Pair {
    head: Value,
    tail: Value,
}

impl Pair {
    pub fn head(&self) -> &Value {
        &self.head
    }

    pub fn tail(&self) -> &Value {
        &self.tail
    }
}

// Unlink uniquely owned tails one cell at a time so long lists drop in constant stack
impl Drop for Pair {
    fn drop(&mut self) {
        let mut next = std::mem::replace(&mut self.tail, Value::Nil);
        while let Value::Pair(rc) = next {
            match Rc::try_unwrap(rc) {
                Ok(mut pair) => next = std::mem::replace(&mut pair.tail, Value::Nil),
                Err(_) => break,
            }
        }
    }
}

/// Core expression/value type of the interpreter
///
/// To build a tree, use the helper functions:
/// - `val(42)` for values, `sym("name")` for symbols, `nil()` for the empty list
/// - `val([1, 2, 3])` for homogeneous lists
/// - `val(vec![sym("op"), val(42)])` for mixed lists
#[derive(Clone)]
pub enum Value {
    /// The empty list. There is only one, so it compares by variant alone.
    Nil,
    /// Cons cell; proper lists end in `Nil` but this is not enforced
    Pair(Rc<Pair>),
    /// String literals, which double as lists of character codes
    String(String),
    /// Symbols (identifiers)
    Symbol(String),
    /// Numbers (integers only)
    Number(NumberType),
    /// Host function invoked by `apply` with the environment and the raw operands
    NativeFunction { id: String, func: Rc<OperationFn> },
    /// Operatives and applicatives
    Combiner(Combiner),
    /// First-class environment, as returned by `current-world`
    Environment(Environment),
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Pair(pair) => {
                let mut depth = 0;
                let mut current = pair;
                loop {
                    write!(f, "Pair({:?}, ", current.head)?;
                    depth += 1;
                    match &current.tail {
                        Value::Pair(next) => current = next,
                        tail => break write!(f, "{tail:?}{}", ")".repeat(depth)),
                    }
                }
            }
            Value::String(s) => write!(f, "String(\"{s}\")"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::NativeFunction { id, .. } => write!(f, "NativeFunction({id})"),
            Value::Combiner(combiner) => write!(f, "Combiner({combiner})"),
            Value::Environment(env) => write!(f, "{env:?}"),
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Combiner> for Value {
    fn from(combiner: Combiner) -> Self {
        Value::Combiner(combiner)
    }
}

impl From<Environment> for Value {
    fn from(env: Environment) -> Self {
        Value::Environment(env)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(n as NumberType)
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into))
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list(arr.into_iter().map(Into::into))
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(slice: &[T]) -> Self {
        Value::list(slice.iter().cloned().map(Into::into))
    }
}

/// Helper function for creating symbols - works great in mixed lists!
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating Values - works great in mixed lists!
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for the empty list
pub fn nil() -> Value {
    Value::Nil
}

impl Value {
    pub fn cons(head: Value, tail: Value) -> Value {
        Value::Pair(Rc::new(Pair { head, tail }))
    }

    /// Build a proper list. The fold runs right to left so the first element
    /// becomes the outermost pair.
    pub fn list<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        Value::list_with_tail(items, Value::Nil)
    }

    /// Build a list whose last pair ends in `tail` instead of `Nil`
    pub fn list_with_tail<I>(items: I, tail: Value) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(tail, |rest, item| Value::cons(item, rest))
    }

    /// Collect the elements of a proper pair list into a host vector
    pub fn list_to_vec(&self) -> Result<Vec<Value>, Error> {
        let mut items = Vec::new();
        let mut current = self;
        loop {
            match current {
                Value::Nil => return Ok(items),
                Value::Pair(pair) => {
                    items.push(pair.head.clone());
                    current = &pair.tail;
                }
                _ => return Err(Error::type_error("proper list", self)),
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Pair(_) => "pair",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Number(_) => "number",
            Value::NativeFunction { .. } => "native function",
            Value::Combiner(combiner) if combiner.is_applicative() => "applicative",
            Value::Combiner(_) => "operative",
            Value::Environment(_) => "environment",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Value::Symbol(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    /// Pair-chains (including the empty list) and strings
    pub fn is_list(&self) -> bool {
        matches!(self, Value::Nil | Value::Pair(_) | Value::String(_))
    }

    /// A cons cell or the `Nil` sentinel that terminates chains of them
    pub fn is_pair(&self) -> bool {
        matches!(self, Value::Nil | Value::Pair(_))
    }

    /// A list with at least one element, i.e. something `eval` treats as a combination
    pub fn is_applicable_list(&self) -> bool {
        matches!(self, Value::Pair(_))
    }

    pub fn is_combiner(&self) -> bool {
        matches!(self, Value::Combiner(_))
    }

    pub fn is_applicative(&self) -> bool {
        matches!(self, Value::Combiner(combiner) if combiner.is_applicative())
    }

    pub fn is_operative(&self) -> bool {
        matches!(self, Value::Combiner(combiner) if combiner.is_operative())
    }

    /// First element of any list-shaped value; for strings, the code of the first character
    pub fn head(&self) -> Result<Value, Error> {
        match self {
            Value::Pair(pair) => Ok(pair.head.clone()),
            Value::String(s) => s
                .chars()
                .next()
                .map(|c| Value::Number(NumberType::from(u32::from(c))))
                .ok_or_else(|| Error::type_error("non-empty list", self)),
            _ => Err(Error::type_error("non-empty list", self)),
        }
    }

    /// Everything after the first element; for strings, the remaining substring
    pub fn tail(&self) -> Result<Value, Error> {
        match self {
            Value::Pair(pair) => Ok(pair.tail.clone()),
            Value::String(s) => {
                let mut chars = s.chars();
                match chars.next() {
                    Some(_) => Ok(Value::String(chars.as_str().to_owned())),
                    None => Err(Error::type_error("non-empty list", self)),
                }
            }
            _ => Err(Error::type_error("non-empty list", self)),
        }
    }

    /// Identity test used by the `=` primitive.
    ///
    /// Numbers, strings and symbols are compared by value; everything built
    /// at runtime (pairs, combiners, native functions, environments) is
    /// compared by reference.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFunction { func: f1, .. }, Value::NativeFunction { func: f2, .. }) => {
                Rc::ptr_eq(f1, f2)
            }
            (Value::Combiner(a), Value::Combiner(b)) => a.is_identical(b),
            (Value::Environment(a), Value::Environment(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "()"),
            Value::Pair(pair) => {
                write!(f, "({}", pair.head)?;
                let mut rest = &pair.tail;
                loop {
                    match rest {
                        Value::Nil => break,
                        Value::Pair(next) => {
                            write!(f, " {}", next.head)?;
                            rest = &next.tail;
                        }
                        other => {
                            write!(f, " . {other}")?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Value::String(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::NativeFunction { id, .. } => write!(f, "#<native:{id}>"),
            Value::Combiner(combiner) => write!(f, "{combiner}"),
            Value::Environment(_) => write!(f, "#<environment>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        // Walk tails in a loop; only heads recurse
        let (mut a, mut b) = (self, other);
        loop {
            match (a, b) {
                (Value::Pair(x), Value::Pair(y)) => {
                    if Rc::ptr_eq(x, y) {
                        return true;
                    }
                    if x.head != y.head {
                        return false;
                    }
                    a = &x.tail;
                    b = &y.tail;
                }
                (Value::Nil, Value::Nil) => return true,
                (Value::String(x), Value::String(y)) => return x == y,
                (Value::Symbol(x), Value::Symbol(y)) => return x == y,
                (Value::Number(x), Value::Number(y)) => return x == y,
                // Host functions and environments have no structure worth comparing
                _ => return a.is_identical(b),
            }
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod helper_function_tests {
    use super::*;

    #[test]
    fn test_helper_functions_data_driven() {
        // Test cases as (Value, Value) tuples: (helper_result, expected_value)
        let test_cases = vec![
            (val(42), Value::Number(42)),
            (val(-17), Value::Number(-17)),
            (val(4294967295u32), Value::Number(4294967295)),
            (val(255u8), Value::Number(255)),
            (val(-128i8), Value::Number(-128)),
            (val(NumberType::MAX), Value::Number(NumberType::MAX)),
            (val("hello"), Value::String("hello".to_owned())),
            (val(""), Value::String(String::new())),
            (sym("$define!"), Value::Symbol("$define!".to_owned())),
            (sym(String::from("test")), Value::Symbol("test".to_owned())),
            (nil(), Value::Nil),
            (
                val([1, 2]),
                Value::cons(
                    Value::Number(1),
                    Value::cons(Value::Number(2), Value::Nil),
                ),
            ),
            (
                val(vec![sym("operation"), val(42), val("result")]),
                Value::cons(
                    sym("operation"),
                    Value::cons(
                        Value::Number(42),
                        Value::cons(Value::String("result".to_owned()), Value::Nil),
                    ),
                ),
            ),
            (val(Vec::<Value>::new()), Value::Nil),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(actual, expected, "Test case {} failed", i + 1);
        }
    }

    #[test]
    fn test_list_construction_preserves_order() {
        let list = Value::list((1..=4).map(Value::Number));
        assert_eq!(
            list.list_to_vec().unwrap(),
            vec![val(1), val(2), val(3), val(4)]
        );
        assert_eq!(list.head().unwrap(), val(1));
        assert_eq!(list.tail().unwrap().head().unwrap(), val(2));

        let dotted = Value::list_with_tail([val(1), val(2)], sym("rest"));
        assert_eq!(format!("{dotted}"), "(1 2 . rest)");
        assert!(dotted.list_to_vec().is_err());
    }

    #[test]
    fn test_head_and_tail_over_strings() {
        let text = val("ab");
        assert_eq!(text.head().unwrap(), Value::Number('a' as NumberType));
        assert_eq!(text.tail().unwrap(), val("b"));

        // Repeated tail walks down to the empty string and then stops
        let mut current = val("héllo");
        let mut codes = Vec::new();
        while current != val("") {
            codes.push(current.head().unwrap());
            current = current.tail().unwrap();
        }
        assert_eq!(codes.len(), 5);
        assert_eq!(codes[1], Value::Number('é' as NumberType));
        assert!(current.head().is_err());
        assert!(current.tail().is_err());
    }

    #[test]
    fn test_head_and_tail_reject_non_lists() {
        for value in [nil(), val(42), sym("x")] {
            match value.head() {
                Err(Error::TypeError(msg)) => assert!(msg.contains("non-empty list"), "{msg}"),
                other => panic!("expected TypeError for head of {value}, got {other:?}"),
            }
            assert!(matches!(value.tail(), Err(Error::TypeError(_))));
        }
    }

    #[test]
    fn test_classification_predicates() {
        let pair = val([1]);
        assert!(pair.is_list() && pair.is_pair() && pair.is_applicable_list());
        assert!(nil().is_list() && nil().is_pair() && !nil().is_applicable_list());
        assert!(val("s").is_list() && val("s").is_string() && !val("s").is_pair());
        assert!(val(1).is_number() && !val(1).is_list());
        assert!(sym("x").is_symbol() && !sym("x").is_combiner());
    }

    #[test]
    fn test_identity_versus_structural_equality() {
        let a = val([1, 2]);
        let b = val([1, 2]);
        assert_eq!(a, b);
        assert!(!a.is_identical(&b));
        assert!(a.is_identical(&a.clone()));
        assert!(val("x").is_identical(&val("x")));
        assert!(sym("x").is_identical(&sym("x")));
        assert!(!val(1).is_identical(&val("1")));
        assert!(nil().is_identical(&nil()));
    }

    #[test]
    fn test_long_lists_compare_and_drop_without_recursing() {
        const LEN: NumberType = 1_000_000;
        let a = Value::list((0..LEN).map(val));
        let b = Value::list((0..LEN).map(val));
        assert!(a == b);
        assert_eq!(a.list_to_vec().unwrap().len(), 1_000_000);

        let c = Value::list((0..LEN).map(|n| if n == LEN - 1 { val(-1) } else { val(n) }));
        assert!(a != c);
        drop(a);
        drop(b);
        drop(c);
    }

    #[test]
    fn test_dropping_a_list_keeps_shared_tails() {
        let shared = val([2, 3]);
        let first = Value::cons(val(1), shared.clone());
        let second = Value::cons(val(0), shared.clone());
        drop(first);
        assert_eq!(second, val([0, 2, 3]));
        drop(shared);
        assert_eq!(format!("{second}"), "(0 2 3)");
    }

    #[test]
    fn test_debug_forms() {
        assert_eq!(
            format!("{:?}", Value::cons(val(1), Value::cons(sym("a"), sym("r")))),
            "Pair(Number(1), Pair(Symbol(a), Symbol(r)))"
        );
        assert_eq!(format!("{:?}", val([7])), "Pair(Number(7), Nil)");
    }

    #[test]
    fn test_display_forms() {
        let cases = vec![
            (nil(), "()"),
            (val(-5), "-5"),
            (sym("$vau"), "$vau"),
            (val("say \"hi\"\n"), r#""say \"hi\"\n""#),
            (val(vec![sym("a"), val([1, 2]), val("s")]), r#"(a (1 2) "s")"#),
        ];
        for (value, expected) in cases {
            assert_eq!(format!("{value}"), expected);
        }
    }
}
