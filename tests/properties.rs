#![expect(clippy::unwrap_used)] // test code OK

use std::rc::Rc;
use vauxp::Error;
use vauxp::ast::{NumberType, Value, nil, sym, val};
use vauxp::builtinops::{boolean, create_global_env};
use vauxp::evaluator::combiner::{self, Combiner, CompoundOperative};
use vauxp::evaluator::{Environment, apply, eval, lookup};

/// An operative returning its first operand exactly as written
fn first_operand_operative(env: &Environment) -> Value {
    let op = CompoundOperative::from_formals(
        &Value::cons(sym("a"), sym("rest")),
        vec![sym("a")],
        Environment::with_parent(env),
    )
    .unwrap();
    Value::Combiner(Combiner::CompoundOperative(Rc::new(op)))
}

#[test]
fn numbers_self_evaluate() {
    let root = create_global_env();
    let child = Environment::with_parent(&root);
    let numbers: [NumberType; 6] = [0, 1, -1, 42, NumberType::MAX, NumberType::MIN];
    for n in numbers {
        for env in [&root, &child] {
            assert_eq!(eval(&val(n), env).unwrap(), val(n), "number {n}");
        }
    }
}

#[test]
fn symbols_resolve_or_fail_with_reference_error() {
    let env = Environment::new();
    env.define("x", val("v"));
    assert_eq!(eval(&sym("x"), &env).unwrap(), val("v"));

    let child = Environment::with_parent(&env);
    assert_eq!(eval(&sym("x"), &child).unwrap(), val("v"));

    match eval(&sym("unbound"), &child) {
        Err(Error::ReferenceError(name)) => assert_eq!(name, "unbound"),
        other => panic!("expected ReferenceError, got {other:?}"),
    }
    assert_eq!(lookup("x", None).unwrap_err(), Error::NoEnvironment);
}

#[test]
fn child_bindings_shadow_without_touching_parent() {
    let parent = Environment::new();
    parent.define("x", val(1));
    let child = Environment::with_parent(&parent);
    child.define("x", val(2));

    assert_eq!(lookup("x", Some(&child)).unwrap(), val(2));
    assert_eq!(lookup("x", Some(&parent)).unwrap(), val(1));
}

#[test]
fn applicative_evaluates_operands_operative_does_not() {
    let env = create_global_env();
    env.define("x", val(5));
    let op = first_operand_operative(&env);
    let operands = val(vec![sym("x")]);

    assert_eq!(apply(&op, &operands, &env).unwrap(), sym("x"));

    let applicative = combiner::wrap(op.clone()).unwrap();
    assert_eq!(apply(&applicative, &operands, &env).unwrap(), val(5));
    assert!(combiner::unwrap(applicative).unwrap().is_identical(&op));
}

#[test]
fn define_then_lookup_round_trip() {
    let env = create_global_env();
    let define = val(vec![sym("$define!"), sym("y"), val(42)]);
    assert_eq!(eval(&define, &env).unwrap(), val(42));
    assert_eq!(eval(&sym("y"), &env).unwrap(), val(42));
}

#[test]
fn vau_operative_binds_fixed_and_rest_formals() {
    let env = create_global_env();
    // ($vau (a . rest) a)
    let vau = val(vec![sym("$vau"), Value::cons(sym("a"), sym("rest")), sym("a")]);
    let op = eval(&vau, &env).unwrap();
    assert!(op.is_operative());
    assert_eq!(apply(&op, &val([1, 2, 3]), &env).unwrap(), val(1));

    // Same formals, returning the call frame to inspect its bindings
    let frame_vau = val(vec![
        sym("$vau"),
        Value::cons(sym("a"), sym("rest")),
        val(vec![sym("current-world")]),
    ]);
    let frame_op = eval(&frame_vau, &env).unwrap();
    let Value::Environment(frame) = apply(&frame_op, &val([1, 2, 3]), &env).unwrap() else {
        panic!("expected the call frame");
    };
    assert_eq!(frame.lookup("a").unwrap(), val(1));
    assert_eq!(frame.lookup("rest").unwrap(), val([2, 3]));
    assert!(env.get("a").is_none(), "formals must not leak into the caller");
}

#[test]
fn head_and_tail_walk_strings() {
    let env = create_global_env();
    let text = val("ab");
    assert_eq!(
        eval(&val(vec![sym("head"), text.clone()]), &env).unwrap(),
        val('a' as NumberType)
    );
    assert_eq!(eval(&val(vec![sym("tail"), text]), &env).unwrap(), val("b"));

    let mut current = val("a longer string");
    let mut steps = 0;
    while current != val("") {
        current = eval(&val(vec![sym("tail"), current]), &env).unwrap();
        steps += 1;
        assert!(steps <= 15, "tail must terminate");
    }
    assert_eq!(steps, 15);
    assert!(matches!(
        eval(&val(vec![sym("tail"), current]), &env),
        Err(Error::TypeError(_))
    ));
}

#[test]
fn invoking_a_non_combiner_fails() {
    let env = create_global_env();
    match apply(&val(42), &nil(), &env) {
        Err(Error::InvocationError(rendered)) => assert_eq!(rendered, "42"),
        other => panic!("expected InvocationError, got {other:?}"),
    }
}

#[test]
fn booleans_select_between_two_operands() {
    let env = create_global_env();
    let pairs = [
        (val(1), val(2)),
        (sym("x"), sym("y")),
        (val("s"), nil()),
        (val([1, 2]), val(vec![sym("f"), val(0)])),
    ];
    for (x, y) in pairs {
        let operands = val(vec![x.clone(), y.clone()]);
        assert_eq!(apply(&boolean(true), &operands, &env).unwrap(), x);
        assert_eq!(apply(&boolean(false), &operands, &env).unwrap(), y);

        let via_binding = Value::cons(sym("#t"), operands.clone());
        assert_eq!(eval(&via_binding, &env).unwrap(), x);
        let via_binding = Value::cons(sym("#f"), operands);
        assert_eq!(eval(&via_binding, &env).unwrap(), y);
    }
}

#[test]
fn later_parent_definitions_are_visible_to_existing_closures() {
    let env = create_global_env();
    let program = [
        val(vec![
            sym("$define!"),
            sym("get"),
            val(vec![sym("wrap"), val(vec![sym("$vau"), nil(), sym("late")])]),
        ]),
        val(vec![sym("$define!"), sym("late"), val(1)]),
    ];
    for expr in &program {
        eval(expr, &env).unwrap();
    }
    assert_eq!(eval(&val(vec![sym("get")]), &env).unwrap(), val(1));

    eval(&val(vec![sym("$define!"), sym("late"), val(2)]), &env).unwrap();
    assert_eq!(eval(&val(vec![sym("get")]), &env).unwrap(), val(2));
}

#[cfg(feature = "reader")]
#[test]
fn derived_forms_built_from_vau() {
    use vauxp::reader::parse_program;

    let env = create_global_env();
    let source = r#"
        ; quote and list are not primitives: they are built from $vau
        ($define! quote ($vau (x) x))
        ($define! list (wrap ($vau args args)))
        (list ((< 3 7) "lt" "ge")
              (head "ab")
              (quote (a . b))
              (eval (quote (head "z"))))
    "#;

    let mut result = Value::Nil;
    for expr in parse_program(source).unwrap() {
        result = eval(&expr, &env).unwrap();
    }
    assert_eq!(
        result,
        val(vec![
            val("lt"),
            val(97),
            Value::cons(sym("a"), sym("b")),
            val(122)
        ])
    );
}

#[test]
fn rest_formal_binds_a_long_operand_list() {
    let env = create_global_env();
    // ($vau args args) applied to 200k operands
    let collect = eval(&val(vec![sym("$vau"), sym("args"), sym("args")]), &env).unwrap();
    let operands = Value::list((0..200_000).map(val));
    let bound = apply(&collect, &operands, &env).unwrap();
    assert_eq!(bound, operands);
    drop(operands);
    assert_eq!(bound.list_to_vec().unwrap().len(), 200_000);
}
