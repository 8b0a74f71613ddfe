mod common;

use common::{count_ops, function, generate, generate_err, last_return, names, ops};
use hang10::codegen::ir::{ChildCall, Condition, Op, Register};
use hang10::parser::ast::CompareOp;
use hang10::typeck::{Family, Kind};

const COUNTER: &str = "import std
func main(): Integer {
    let i = 0
    while i < 3 { let i = add(i, 1) }
    return i
}";

#[test]
fn loop_becomes_one_closure_with_start_and_skip() {
    let program = generate(COUNTER);
    let closures: Vec<_> = names(&program).into_iter().filter(|n| n.starts_with("main_")).collect();
    assert_eq!(closures, vec!["main_1"]);

    let main = function(&program, "main");
    assert_eq!(
        ops(main),
        vec![
            (Condition::ENTRY, Op::LoadInteger { target: Register(0), value: 0 }),
            (Condition::ENTRY, Op::LoadInteger { target: Register(2), value: 3 }),
            (
                Condition::ENTRY,
                Op::Compare { op: CompareOp::Lt, lhs: Register(0), rhs: Register(2), result: Register(3) }
            ),
            (Condition::ENTRY, Op::Branch { test: Register(3), if_true: Condition(1), if_false: Condition(2) }),
            (
                Condition(1),
                Op::CallAsync {
                    callee: "main_1".into(),
                    args: vec![Register(0)],
                    results: vec![Register(1)],
                    slot: ChildCall(0),
                    done: None,
                }
            ),
            (Condition(2), Op::Rename { source: Register(0), dest: Register(1) }),
            (Condition::ENTRY, Op::Return { values: vec![Register(1)], garbage: vec![] }),
        ]
    );
    assert_eq!(main.child_calls, vec!["main_1".to_string()]);
}

#[test]
fn closure_restarts_or_returns_its_captures() {
    let program = generate(COUNTER);
    let body = function(&program, "main_1");
    assert!(!body.is_sync);
    assert_eq!(body.param_count, 1);
    assert_eq!(body.return_kinds, vec![Kind::owned(Family::Integer)]);
    assert!(body.child_calls.is_empty());

    let tail: Vec<_> = ops(body).into_iter().rev().take(3).collect();
    assert_eq!(
        tail,
        vec![
            (Condition(2), Op::Return { values: vec![Register(2)], garbage: vec![] }),
            (Condition(1), Op::RestartLoop { args: vec![Register(2)], garbage: vec![] }),
            (Condition::ENTRY, Op::Branch { test: Register(4), if_true: Condition(1), if_false: Condition(2) }),
        ]
    );
}

#[test]
fn overwritten_string_is_freed_each_iteration() {
    let program = generate(
        "import std
        func main(s: String, n: Integer): String {
            while n < 3 { let s = concat(s, s) }
            return s
        }",
    );
    let body = function(&program, "main_1");
    assert_eq!(body.return_kinds, vec![Kind::owned(Family::Integer), Kind::owned(Family::String)]);
    assert!(body
        .ops
        .iter()
        .any(|g| g.condition == Condition::ENTRY && matches!(g.op, Op::Free { register: Register(1), .. })));
    assert_eq!(last_return(body).1, vec![Register(0), Register(2)]);

    let main = function(&program, "main");
    let renames: Vec<_> = main
        .ops
        .iter()
        .filter(|g| matches!(g.op, Op::Rename { .. }))
        .map(|g| (g.condition, g.op.clone()))
        .collect();
    assert_eq!(
        renames,
        vec![
            (Condition(2), Op::Rename { source: Register(1), dest: Register(2) }),
            (Condition(2), Op::Rename { source: Register(0), dest: Register(3) }),
        ]
    );
    assert_eq!(last_return(main), (Condition::ENTRY, vec![Register(3)], vec![]));
}

#[test]
fn loop_without_captures_completes_once() {
    let program = generate("func main(): Integer { while false { let t = 1 } return 0 }");
    let main = function(&program, "main");
    let call = main.ops.iter().find(|g| matches!(g.op, Op::CallAsync { .. })).unwrap();
    let Op::CallAsync { args, results, done, .. } = &call.op else { unreachable!() };
    assert!(args.is_empty() && results.is_empty());
    assert!(done.is_some());
    assert!(function(&program, "main_1").return_kinds.is_empty());
}

#[test]
fn nested_loops_flatten_after_their_parent() {
    let program = generate(
        "func main(a: Boolean, b: Boolean): Integer {
            while a { while b { let t = 1 } }
            while b { let t = 2 }
            return 0
        }",
    );
    assert_eq!(names(&program), vec!["main", "main_1", "main_1_1", "main_2"]);
    assert_eq!(count_ops(function(&program, "main_1"), "call_async"), 1);
}

#[test]
fn closure_names_skip_declared_functions() {
    let program = generate(
        "func main_1(): Integer { return 1 }
        func main(c: Boolean): Integer { while c { let t = 1 } return 0 }",
    );
    assert_eq!(names(&program), vec!["main_1", "main", "main_2"]);
}

#[test]
fn return_inside_loop_is_rejected() {
    let err = generate_err("func main(c: Boolean): Integer { while c { return 1 } return 0 }");
    assert_eq!(err.to_string(), "in function `main`: Shape error: `return` is not allowed inside a `while` loop");
}

#[test]
fn captured_resource_must_be_rebound() {
    let err = generate_err(
        "sync func consume(s: String): () { return }
        func main(s: String, c: Boolean): Integer { while c { consume(s) } return 0 }",
    );
    assert_eq!(
        err.root().to_string(),
        "Type error: captured variable `s` is moved inside the loop and never re-bound"
    );
}

#[test]
fn captured_kind_must_not_change() {
    let err = generate_err(
        r#"func main(c: Boolean): Integer { let x = 1 while c { let x = "a" } return x }"#,
    );
    assert_eq!(
        err.root().to_string(),
        "Type error: variable `x` changes type inside the loop: expecting Integer, got &String"
    );
}

#[test]
fn loop_condition_must_be_boolean() {
    let err = generate_err("func main(n: Integer): Integer { while n { let t = 1 } return 0 }");
    assert_eq!(err.root().to_string(), "Type error: `while` condition: expecting &Boolean, got Integer");
}

#[test]
fn restart_waits_for_async_results_from_the_body() {
    let program = generate(
        "import std
        func main(clock: Clock, i: Integer): Clock {
            while i < 3 { let clock = sleep(clock) let i = add(i, 1) }
            return clock
        }",
    );
    let body = function(&program, "main_1");
    let sleep_result = body
        .ops
        .iter()
        .find_map(|g| match &g.op {
            Op::CallAsync { callee, results, .. } if callee == "sleep" => Some(results[0]),
            _ => None,
        })
        .unwrap();
    let index = body.ops.iter().position(|g| matches!(g.op, Op::RestartLoop { .. })).unwrap();
    let guard = body.guard(index);
    assert!(guard.needs.contains(&body.slot(sleep_result)));
    assert_eq!(body.child_calls, vec!["sleep".to_string()]);
}

#[test]
fn rebinding_in_the_body_is_carried_out_of_the_loop() {
    let program = generate("func main(c: Boolean): Integer { let x = 1 while c { let x = 2 } return x }");
    let body = function(&program, "main_1");
    assert_eq!(body.param_count, 2);
    assert_eq!(body.return_kinds, vec![Kind::owned(Family::Boolean), Kind::owned(Family::Integer)]);
    assert_eq!(last_return(function(&program, "main")).1, vec![Register(3)]);
}

#[test]
fn condition_threading_a_capture_passes_the_new_value() {
    let program = generate(
        "sync native func more(c: Stream): (Stream, Boolean)
        func main(console: Stream): Stream {
            while more(&console) { let t = 1 }
            return console
        }",
    );
    let main = function(&program, "main");
    let entry_ops: Vec<_> = ops(main)
        .into_iter()
        .filter(|(_, op)| matches!(op, Op::CallSync { .. } | Op::CallAsync { .. } | Op::Rename { .. }))
        .collect();
    assert_eq!(
        entry_ops,
        vec![
            (
                Condition::ENTRY,
                Op::CallSync {
                    callee: "more".into(),
                    args: vec![Register(0)],
                    results: vec![Register(2), Register(3)],
                    done: None,
                }
            ),
            (
                Condition(1),
                Op::CallAsync {
                    callee: "main_1".into(),
                    args: vec![Register(2)],
                    results: vec![Register(1)],
                    slot: ChildCall(0),
                    done: None,
                }
            ),
            (Condition(2), Op::Rename { source: Register(2), dest: Register(1) }),
        ]
    );
    assert_eq!(last_return(main).1, vec![Register(1)]);
}

#[test]
fn condition_moving_a_capture_is_rejected() {
    let err = generate_err(
        "sync native func check(s: String): Boolean
        func main(s: String): Integer { while check(s) { let t = 1 } return 0 }",
    );
    assert_eq!(
        err.root().to_string(),
        "Type error: captured variable `s` is moved inside the loop and never re-bound"
    );
}
