mod common;

use common::{function, generate, generate_err, ops};
use hang10::codegen::ir::{Condition, Op, Register};
use hang10::typeck::{Family, Kind};

#[test]
fn literal_bound_and_returned() {
    let program = generate("func main(): Integer { let x = 1 return x }");
    let main = function(&program, "main");
    assert_eq!(
        ops(main),
        vec![
            (Condition::ENTRY, Op::LoadInteger { target: Register(0), value: 1 }),
            (Condition::ENTRY, Op::Return { values: vec![Register(0)], garbage: vec![] }),
        ]
    );
    assert_eq!(main.register_kinds, vec![Kind::owned(Family::Integer)]);
    assert_eq!(main.condition_count, 1);
    assert_eq!(program.entry, "main");
}

#[test]
fn multiple_results_and_tuple_binding() {
    let program = generate(
        "sync func pair(): (Integer, Integer) { return (1, 2) }\n\
         func main(): Integer { let a, b = pair() return b }",
    );
    let main = function(&program, "main");
    assert!(matches!(
        &main.ops[0].op,
        Op::CallSync { callee, results, done: None, .. } if callee == "pair" && results.len() == 2
    ));
    assert_eq!(main.ops[1].op, Op::Return { values: vec![Register(1)], garbage: vec![] });
}

#[test]
fn sync_calls_are_inline_and_async_calls_scheduled() {
    let program = generate(
        "sync func one(): Integer { return 1 }\n\
         func two(): Integer { return 2 }\n\
         func main(): Integer { let a = one() let b = two() return b }",
    );
    let main = function(&program, "main");
    assert!(matches!(main.ops[0].op, Op::CallSync { .. }));
    assert!(matches!(main.ops[1].op, Op::CallAsync { .. }));
    assert_eq!(main.child_calls, vec!["two".to_string()]);
}

#[test]
fn call_without_results_gets_completion_flag() {
    let program = generate(
        "sync func tick(n: Integer): () { return }\n\
         func main(): Integer { tick(1) return 0 }",
    );
    let main = function(&program, "main");
    let Op::CallSync { done, results, .. } = &main.ops[1].op else { panic!("expected call") };
    assert!(results.is_empty());
    assert_eq!(*done, Some(Condition(1)));
    assert_eq!(main.condition_count, 2);
}

#[test]
fn unknown_variable() {
    let err = generate_err("func main(): Integer { return y }");
    assert_eq!(err.to_string(), "in function `main`: Lookup error: unknown variable `y`");
}

#[test]
fn unknown_function() {
    let err = generate_err("func main(): Integer { return nope() }");
    assert_eq!(err.root().to_string(), "Lookup error: unknown function `nope`");
}

#[test]
fn argument_kind_mismatch() {
    let err = generate_err(
        "sync func f(s: &String): Integer { return 0 }\n\
         func main(): Integer { return f(1) }",
    );
    assert_eq!(err.root().to_string(), "Type error: argument `s` of `f`: expecting &String, got Integer");
}

#[test]
fn argument_count_mismatch() {
    let err = generate_err(
        "sync func f(a: Integer): Integer { return a }\n\
         func main(): Integer { return f(1, 2) }",
    );
    assert_eq!(
        err.root().to_string(),
        "Type error: argument count mismatch calling `f`, expecting 1, got 2"
    );
}

#[test]
fn return_count_mismatch() {
    let err = generate_err("func main(): Integer { return (1, 2) }");
    assert_eq!(
        err.root().to_string(),
        "Type error: return value count mismatch in `main`, expecting 1, got 2"
    );
}

#[test]
fn expression_statement_must_not_produce_values() {
    let err = generate_err(
        "sync func one(): Integer { return 1 }\n\
         func main(): Integer { one() return 0 }",
    );
    assert_eq!(err.root().to_string(), "Shape error: expected no values from an expression statement, got 1");
}

#[test]
fn missing_main() {
    let err = generate_err("func helper(): Integer { return 0 }");
    assert_eq!(err.to_string(), "Module error: no main function defined in `main` or its imports");
}

#[test]
fn error_spans_point_at_the_statement() {
    let source = "func main(): Integer {\n  let a, b = 1\n  return a\n}";
    let err = generate_err(source);
    let span = err.span().unwrap();
    assert_eq!(&source[span.start..span.end], "let a, b = 1");
}
